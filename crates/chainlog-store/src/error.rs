//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stream with this name is already persisted.
    #[error("stream '{0}' already exists")]
    DuplicateStream(String),

    /// A record references a stream that was never persisted.
    #[error("stream id {0} does not exist")]
    MissingStream(i64),

    /// The store was opened read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
