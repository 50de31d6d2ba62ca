//! Storage metadata reported by an open session.

use chainlog_store::StreamStatistics;
use serde::{Deserialize, Serialize};

/// Identifier every chainlog store reports.
pub const STORAGE_IDENTIFIER: &str = "chainlog";

/// Summary of everything persisted in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub storage_identifier: String,
    /// Backing files, relative to the session URI.
    pub relative_file_paths: Vec<String>,
    /// Total records across all streams.
    pub record_count: u64,
    /// Earliest record timestamp in nanoseconds, 0 when empty.
    pub starting_time: i64,
    /// Nanoseconds between the earliest and latest record, 0 when empty.
    ///
    /// Saturates at `i64::MAX` when the span does not fit in an `i64`.
    pub duration: i64,
    /// One entry per stream that has at least one record.
    pub streams: Vec<StreamStatistics>,
    /// Size of the backing store.
    pub size_bytes: u64,
}

impl StorageMetadata {
    /// Aggregate per-stream statistics into global metadata.
    pub fn from_statistics(
        relative_file_paths: Vec<String>,
        streams: Vec<StreamStatistics>,
        size_bytes: u64,
    ) -> Self {
        let record_count = streams.iter().map(|s| s.count).sum();
        let first = streams.iter().map(|s| s.min_timestamp).min();
        let last = streams.iter().map(|s| s.max_timestamp).max();

        let (starting_time, duration) = match (first, last) {
            (Some(first), Some(last)) => (first, last.saturating_sub(first)),
            _ => (0, 0),
        };

        Self {
            storage_identifier: STORAGE_IDENTIFIER.to_string(),
            relative_file_paths,
            record_count,
            starting_time,
            duration,
            streams,
            size_bytes,
        }
    }
}
