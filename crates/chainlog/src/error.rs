//! Error types for storage sessions.

use chainlog_core::CoreError;
use chainlog_store::StoreError;
use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The URI has no usable manifest or backing file.
    #[error("no storage at '{uri}': {reason}")]
    NotFound { uri: String, reason: String },

    /// A record names a stream that was never created in this session.
    #[error("unknown stream '{0}'")]
    UnknownStream(String),

    /// The record store failed.
    #[error("storage backend error while trying to {context}: {source}")]
    StorageBackend {
        context: String,
        #[source]
        source: StoreError,
    },

    /// Malformed descriptor or record.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CoreError),

    /// The read cursor is exhausted.
    #[error("end of stream")]
    EndOfStream,

    /// The session has not been opened, or has been closed.
    #[error("session is not open")]
    NotOpen,

    /// `open` was called on an open session.
    #[error("session is already open")]
    AlreadyOpen,

    /// A mutating operation on a session opened read-only.
    #[error("session is read-only")]
    ReadOnly,

    /// The manifest could not be written.
    #[error("manifest error at '{uri}': {reason}")]
    Manifest { uri: String, reason: String },

    /// No backend is registered under this storage identifier.
    #[error("unknown storage identifier '{0}'")]
    UnknownBackend(String),
}

impl SessionError {
    pub(crate) fn backend(context: impl Into<String>, source: StoreError) -> Self {
        SessionError::StorageBackend {
            context: context.into(),
            source,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
