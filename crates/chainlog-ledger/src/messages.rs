//! Events handed to the external ledger.
//!
//! The store never persists these. They exist so a ledger outside this
//! process can hold an independent copy of every chain tip.

use serde::{Deserialize, Serialize};

use chainlog_core::{Digest, Nonce, SerializedRecord, StreamDescriptor};

/// Notification emitted after a record has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The record's chain digest.
    pub digest: Digest,
    /// The stream's anchor at the time of the write.
    pub nonce: Nonce,
    /// The record as the caller wrote it.
    pub record: SerializedRecord,
}

/// Notification emitted after a stream has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAnnouncement {
    /// The stream digest the chain starts from.
    pub digest: Digest,
    pub descriptor: StreamDescriptor,
}

/// Everything a [`LedgerSink`](crate::LedgerSink) receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A new stream chain was started.
    StreamCreated(StreamAnnouncement),
    /// A stream chain advanced by one record.
    Checkpoint(Checkpoint),
}

impl LedgerEvent {
    /// The digest this event pins.
    pub fn digest(&self) -> Digest {
        match self {
            LedgerEvent::StreamCreated(a) => a.digest,
            LedgerEvent::Checkpoint(c) => c.digest,
        }
    }

    /// Name of the stream the event belongs to.
    pub fn stream_name(&self) -> &str {
        match self {
            LedgerEvent::StreamCreated(a) => &a.descriptor.name,
            LedgerEvent::Checkpoint(c) => &c.record.stream_name,
        }
    }
}

impl From<Checkpoint> for LedgerEvent {
    fn from(checkpoint: Checkpoint) -> Self {
        LedgerEvent::Checkpoint(checkpoint)
    }
}

impl From<StreamAnnouncement> for LedgerEvent {
    fn from(announcement: StreamAnnouncement) -> Self {
        LedgerEvent::StreamCreated(announcement)
    }
}
