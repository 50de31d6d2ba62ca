//! Error types for chainlog core.

use thiserror::Error;

/// Errors raised by the pure chain primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A descriptor or record could not be digested.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
