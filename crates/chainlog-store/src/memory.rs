//! In-memory implementation of the RecordStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;

use bytes::Bytes;

use chainlog_core::{Digest, Nonce, Record, StreamDescriptor, StreamId};

use crate::error::{Result, StoreError};
use crate::traits::{
    ReadPosition, RecordStore, StoredMessage, StreamAnchor, StreamStatistics,
};

/// Approximate per-row overhead used for size accounting.
const ROW_OVERHEAD: u64 = 64;

/// In-memory record store.
///
/// All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryRecordStore {
    /// Stream rows in creation order.
    streams: Vec<StreamAnchor>,

    /// Record rows keyed by insertion id.
    records: BTreeMap<i64, Record>,

    schema_created: bool,
    last_insert_id: i64,
}

impl MemoryRecordStore {
    /// Create a new empty in-memory store. The schema still has to be created.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_schema(&self) -> Result<()> {
        if !self.schema_created {
            return Err(StoreError::InvalidData("schema has not been created".into()));
        }
        Ok(())
    }

    fn stream_name(&self, id: StreamId) -> Option<&str> {
        self.streams
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.descriptor.name.as_str())
    }

    /// Overwrite the digest of a persisted record. Test hook for tamper detection.
    pub fn tamper_record_digest(&mut self, record_id: i64, digest: Digest) -> bool {
        match self.records.get_mut(&record_id) {
            Some(record) => {
                record.digest = digest;
                true
            }
            None => false,
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn create_schema(&mut self) -> Result<()> {
        self.schema_created = true;
        Ok(())
    }

    fn insert_stream(
        &mut self,
        descriptor: &StreamDescriptor,
        nonce: &Nonce,
        digest: &Digest,
    ) -> Result<StreamId> {
        self.ensure_schema()?;

        if self.streams.iter().any(|s| s.descriptor.name == descriptor.name) {
            return Err(StoreError::DuplicateStream(descriptor.name.clone()));
        }

        let id = StreamId::new(self.streams.len() as i64 + 1);
        self.streams.push(StreamAnchor {
            id,
            descriptor: descriptor.clone(),
            nonce: *nonce,
            digest: *digest,
        });
        self.last_insert_id = id.get();
        Ok(id)
    }

    fn insert_record(
        &mut self,
        stream_id: StreamId,
        timestamp: i64,
        payload: &[u8],
        digest: &Digest,
    ) -> Result<()> {
        self.ensure_schema()?;

        if self.stream_name(stream_id).is_none() {
            return Err(StoreError::MissingStream(stream_id.get()));
        }

        let id = self.records.keys().next_back().copied().unwrap_or(0) + 1;
        self.records.insert(
            id,
            Record {
                timestamp,
                stream_id,
                payload: Bytes::copy_from_slice(payload),
                digest: *digest,
            },
        );
        self.last_insert_id = id;
        Ok(())
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    fn query_records_ordered_by_timestamp(
        &self,
        after: ReadPosition,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.ensure_schema()?;

        let mut page: Vec<StoredMessage> = self
            .records
            .iter()
            .filter(|(id, record)| {
                ReadPosition {
                    timestamp: record.timestamp,
                    id: **id,
                } > after
            })
            .filter_map(|(id, record)| {
                self.stream_name(record.stream_id).map(|name| StoredMessage {
                    id: *id,
                    timestamp: record.timestamp,
                    stream_name: name.to_string(),
                    payload: record.payload.clone(),
                })
            })
            .collect();

        page.sort_by_key(StoredMessage::position);
        page.truncate(limit);
        Ok(page)
    }

    fn query_streams_ordered_by_id(&self) -> Result<Vec<StreamDescriptor>> {
        self.ensure_schema()?;
        Ok(self.streams.iter().map(|s| s.descriptor.clone()).collect())
    }

    fn aggregate_per_stream_stats(&self) -> Result<Vec<StreamStatistics>> {
        self.ensure_schema()?;

        let mut stats = Vec::new();
        for stream in &self.streams {
            let timestamps: Vec<i64> = self
                .records
                .values()
                .filter(|r| r.stream_id == stream.id)
                .map(|r| r.timestamp)
                .collect();

            if let (Some(min), Some(max)) = (timestamps.iter().min(), timestamps.iter().max()) {
                stats.push(StreamStatistics {
                    descriptor: stream.descriptor.clone(),
                    count: timestamps.len() as u64,
                    min_timestamp: *min,
                    max_timestamp: *max,
                });
            }
        }
        Ok(stats)
    }

    fn storage_size_bytes(&self) -> Result<u64> {
        let records: u64 = self
            .records
            .values()
            .map(|r| r.payload.len() as u64 + ROW_OVERHEAD)
            .sum();
        Ok(records + self.streams.len() as u64 * ROW_OVERHEAD)
    }

    fn query_stream_anchors(&self) -> Result<Vec<StreamAnchor>> {
        self.ensure_schema()?;
        Ok(self.streams.clone())
    }

    fn query_stream_chain(&self, stream_id: StreamId) -> Result<Vec<Record>> {
        self.ensure_schema()?;
        Ok(self
            .records
            .values()
            .filter(|r| r.stream_id == stream_id)
            .cloned()
            .collect())
    }
}
