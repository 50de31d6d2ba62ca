//! Records: timestamped, opaque-payload entries appended to a stream.
//!
//! Payloads are never interpreted. A record exists in two shapes: the
//! caller-facing [`SerializedRecord`] addressed by stream name, and the
//! persisted [`Record`] addressed by stream id and carrying its chain digest.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::Digest;
use crate::types::StreamId;

/// A record as written and read by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRecord {
    /// Name of the stream this record belongs to.
    pub stream_name: String,
    /// Receive time in nanoseconds.
    pub timestamp: i64,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl SerializedRecord {
    pub fn new(stream_name: impl Into<String>, timestamp: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_name: stream_name.into(),
            timestamp,
            payload: payload.into(),
        }
    }

    /// View this record as a chain link on the given stream.
    pub fn link(&self, stream_id: StreamId) -> RecordLink<'_> {
        RecordLink {
            timestamp: self.timestamp,
            stream_id,
            payload: &self.payload,
        }
    }
}

/// The fields of a record that are bound into its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLink<'a> {
    pub timestamp: i64,
    pub stream_id: StreamId,
    pub payload: &'a [u8],
}

/// A persisted chain link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: i64,
    pub stream_id: StreamId,
    pub payload: Bytes,
    pub digest: Digest,
}

impl Record {
    pub fn link(&self) -> RecordLink<'_> {
        RecordLink {
            timestamp: self.timestamp,
            stream_id: self.stream_id,
            payload: &self.payload,
        }
    }
}
