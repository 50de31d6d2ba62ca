//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chainlog::{SessionConfig, StorageSession};
use chainlog_core::{Nonce, StreamDescriptor};
use chainlog_ledger::{Checkpoint, CheckpointPublisher, LedgerEvent, StreamAnnouncement};
use tempfile::TempDir;

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// `temperature` / `Float32` / `raw`.
pub fn temperature() -> StreamDescriptor {
    StreamDescriptor::new("temperature", "Float32", "raw")
}

/// `humidity` / `Float32` / `raw`.
pub fn humidity() -> StreamDescriptor {
    StreamDescriptor::new("humidity", "Float32", "raw")
}

/// Publisher that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LedgerEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.lock().clone()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::Checkpoint(c) => Some(c.clone()),
                LedgerEvent::StreamCreated(_) => None,
            })
            .collect()
    }

    pub fn announcements(&self) -> Vec<StreamAnnouncement> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::StreamCreated(a) => Some(a.clone()),
                LedgerEvent::Checkpoint(_) => None,
            })
            .collect()
    }
}

impl CheckpointPublisher for RecordingPublisher {
    fn publish(&self, checkpoint: Checkpoint) {
        self.lock().push(LedgerEvent::Checkpoint(checkpoint));
    }

    fn announce_stream(&self, announcement: StreamAnnouncement) {
        self.lock().push(LedgerEvent::StreamCreated(announcement));
    }
}

/// A temporary directory to open sessions in, plus a recording publisher.
pub struct TestFixture {
    pub dir: TempDir,
    pub publisher: Arc<RecordingPublisher>,
    pub config: SessionConfig,
}

impl TestFixture {
    /// # Panics
    ///
    /// If no temporary directory can be created.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// # Panics
    ///
    /// If no temporary directory can be created.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temporary directory"),
            publisher: RecordingPublisher::new(),
            config,
        }
    }

    /// A session URI inside the fixture directory.
    pub fn uri(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A closed session with a random nonce, publishing to the fixture's publisher.
    pub fn session(&self) -> StorageSession {
        StorageSession::new(self.publisher.clone(), self.config.clone())
    }

    /// A closed session anchored at a fixed nonce.
    pub fn session_with_nonce(&self, nonce: Nonce) -> StorageSession {
        StorageSession::with_nonce(nonce, self.publisher.clone(), self.config.clone())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
