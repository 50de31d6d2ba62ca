//! Proptest generators for property-based testing.

use proptest::prelude::*;

use chainlog_core::{SerializedRecord, StreamDescriptor};

/// A non-empty descriptor field without NUL characters.
pub fn field() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_/]{1,24}"
}

/// Generate a valid stream descriptor.
pub fn descriptor() -> impl Strategy<Value = StreamDescriptor> {
    (field(), field(), prop_oneof![Just("cdr"), Just("raw"), Just("json")]).prop_map(
        |(name, type_name, format)| StreamDescriptor::new(name, type_name, format),
    )
}

/// Generate `count` descriptors with distinct names.
pub fn distinct_descriptors(count: usize) -> impl Strategy<Value = Vec<StreamDescriptor>> {
    prop::collection::btree_map(field(), field(), count).prop_map(|fields| {
        fields
            .into_iter()
            .map(|(name, type_name)| StreamDescriptor::new(name, type_name, "cdr"))
            .collect()
    })
}

/// Generate a timestamp in nanoseconds, negative values included.
pub fn timestamp() -> impl Strategy<Value = i64> {
    prop_oneof![
        8 => 0i64..=4_000_000_000_000_000_000,
        1 => any::<i64>(),
    ]
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters for one record on one of a fixed set of streams.
#[derive(Debug, Clone)]
pub struct RecordParams {
    /// Index into the stream list the record is written to.
    pub stream: usize,
    pub timestamp: i64,
    pub payload: Vec<u8>,
}

impl RecordParams {
    pub fn to_record(&self, streams: &[StreamDescriptor]) -> SerializedRecord {
        SerializedRecord::new(
            streams[self.stream % streams.len()].name.clone(),
            self.timestamp,
            self.payload.clone(),
        )
    }
}

/// Generate record parameters targeting one of `stream_count` streams.
pub fn record_params(stream_count: usize) -> impl Strategy<Value = RecordParams> {
    (0..stream_count.max(1), timestamp(), payload(64)).prop_map(|(stream, timestamp, payload)| {
        RecordParams {
            stream,
            timestamp,
            payload,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlog_core::validate_descriptor;

    proptest! {
        #[test]
        fn generated_descriptors_are_valid(d in descriptor()) {
            prop_assert!(validate_descriptor(&d).is_ok());
        }

        #[test]
        fn distinct_descriptors_have_distinct_names(ds in distinct_descriptors(4)) {
            let mut names: Vec<&str> = ds.iter().map(|d| d.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), ds.len());
        }
    }
}
