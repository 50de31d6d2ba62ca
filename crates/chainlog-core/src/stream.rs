//! Stream: a named, typed sequence of records with its own hash chain.

use serde::{Deserialize, Serialize};

use crate::crypto::{Digest, Nonce};
use crate::types::StreamId;

/// The semantic identity of a stream. Unique by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream name, e.g. `/sensors/temperature`.
    pub name: String,
    /// Type of the payloads carried on the stream.
    pub type_name: String,
    /// How payloads are serialized, e.g. `cdr`.
    pub serialization_format: String,
}

impl StreamDescriptor {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        serialization_format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            serialization_format: serialization_format.into(),
        }
    }
}

/// The tip of one stream's chain.
///
/// `current_nonce` is fixed at creation; `current_digest` advances with every
/// persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// The store-assigned stream id.
    pub id: StreamId,

    /// Digest of the most recent link on this stream.
    pub current_digest: Digest,

    /// Anchor reported alongside every checkpoint of this stream.
    pub current_nonce: Nonce,
}

impl StreamState {
    /// State of a freshly created stream: both values start at the stream digest.
    pub fn new(id: StreamId, stream_digest: Digest) -> Self {
        Self {
            id,
            current_digest: stream_digest,
            current_nonce: Nonce::from(stream_digest),
        }
    }

    /// Move the tip forward after a record was persisted.
    pub fn advance(&mut self, digest: Digest) {
        self.current_digest = digest;
    }
}
