//! The `metadata.json` manifest that sits next to a backing store.
//!
//! A read-only open finds its backing file through the manifest. A
//! read-write session writes one when it opens and refreshes it on close.

use std::fs;
use std::path::Path;

use chainlog_store::StreamStatistics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::StorageMetadata;

/// Default manifest file name inside a session directory.
pub const MANIFEST_FILE_NAME: &str = "metadata.json";

/// Errors reading or writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported manifest version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub storage_identifier: String,
    pub relative_file_paths: Vec<String>,
    pub record_count: u64,
    pub starting_time_ns: i64,
    pub duration_ns: i64,
    pub streams: Vec<StreamStatistics>,
}

impl Manifest {
    pub const VERSION: u32 = 1;

    pub fn from_metadata(metadata: &StorageMetadata) -> Self {
        Self {
            version: Self::VERSION,
            storage_identifier: metadata.storage_identifier.clone(),
            relative_file_paths: metadata.relative_file_paths.clone(),
            record_count: metadata.record_count,
            starting_time_ns: metadata.starting_time,
            duration_ns: metadata.duration,
            streams: metadata.streams.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = fs::read(path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        if manifest.version > Self::VERSION {
            return Err(ManifestError::UnsupportedVersion(manifest.version));
        }
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
