//! Error types for the ledger bridge.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while handing events to the ledger.
///
/// None of these ever reach a storage write; the publisher logs and counts
/// them instead.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bounded channel to the background task is full.
    #[error("publish channel is full")]
    ChannelFull,

    /// The background task has stopped.
    #[error("publish channel is closed")]
    ChannelClosed,

    /// The sink rejected the event.
    #[error("ledger sink error: {0}")]
    Sink(String),

    /// The sink did not answer in time.
    #[error("ledger sink timed out after {0:?}")]
    Timeout(Duration),

    /// `ChannelPublisher::spawn` was called outside a tokio runtime.
    #[error("no tokio runtime available to run the publisher")]
    NoRuntime,
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, PublishError>;
