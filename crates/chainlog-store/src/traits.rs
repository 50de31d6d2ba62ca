//! RecordStore trait: the abstract interface for durable, ordered storage.
//!
//! The session layer is storage-agnostic; it only ever talks to this trait.
//! Implementations include SQLite (primary) and in-memory (for tests).

use std::path::Path;

use bytes::Bytes;
use chainlog_core::{Digest, Nonce, Record, StreamDescriptor, StreamId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a backing store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_read_only(self) -> bool {
        matches!(self, AccessMode::ReadOnly)
    }
}

/// Position of a record in global read order.
///
/// Records are ordered by timestamp; insertion id breaks ties so the order
/// is total and pagination never skips or repeats a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadPosition {
    pub timestamp: i64,
    pub id: i64,
}

impl ReadPosition {
    /// A position before every record.
    pub const START: Self = Self {
        timestamp: i64::MIN,
        id: 0,
    };
}

/// A record joined against its stream, as returned by the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Insertion id of the record row.
    pub id: i64,
    pub timestamp: i64,
    pub stream_name: String,
    pub payload: Bytes,
}

impl StoredMessage {
    pub fn position(&self) -> ReadPosition {
        ReadPosition {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// Per-stream aggregate over persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatistics {
    pub descriptor: StreamDescriptor,
    pub count: u64,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

/// A persisted stream row with the chain values it was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAnchor {
    pub id: StreamId,
    pub descriptor: StreamDescriptor,
    /// Session nonce at the moment the stream was created.
    pub nonce: Nonce,
    /// The stream digest, first link of the stream's chain.
    pub digest: Digest,
}

/// The RecordStore trait: durable, ordered storage of streams and records.
///
/// All methods are synchronous. A store instance has exactly one writer;
/// two stores over the same backing file are not supported.
pub trait RecordStore: Send {
    // ─────────────────────────────────────────────────────────────────────────
    // Schema
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the stream and record tables.
    fn create_schema(&mut self) -> Result<()>;

    /// Prepare the record insert path ahead of the first write.
    fn prepare_for_writing(&mut self) -> Result<()> {
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a new stream row and return its id.
    fn insert_stream(
        &mut self,
        descriptor: &StreamDescriptor,
        nonce: &Nonce,
        digest: &Digest,
    ) -> Result<StreamId>;

    /// Persist one chain link.
    fn insert_record(
        &mut self,
        stream_id: StreamId,
        timestamp: i64,
        payload: &[u8],
        digest: &Digest,
    ) -> Result<()>;

    /// Row id of the most recent insert.
    fn last_insert_id(&self) -> i64;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// One page of records strictly after `after`, in global read order.
    fn query_records_ordered_by_timestamp(
        &self,
        after: ReadPosition,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// All stream descriptors in creation order.
    fn query_streams_ordered_by_id(&self) -> Result<Vec<StreamDescriptor>>;

    /// Count and time range per stream, in creation order.
    ///
    /// Streams without records are omitted.
    fn aggregate_per_stream_stats(&self) -> Result<Vec<StreamStatistics>>;

    /// Size of the backing storage in bytes.
    fn storage_size_bytes(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────

    /// All stream rows with their creation nonce and digest, in creation order.
    fn query_stream_anchors(&self) -> Result<Vec<StreamAnchor>>;

    /// Every record of one stream in insertion order.
    fn query_stream_chain(&self, stream_id: StreamId) -> Result<Vec<Record>>;
}

/// A store that lives in a file.
pub trait OpenStore: RecordStore + Sized {
    /// Open (creating in ReadWrite mode) the backing file at `path`.
    fn open_file(path: &Path, mode: AccessMode) -> Result<Self>;
}
