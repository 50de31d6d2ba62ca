//! Backend registration.
//!
//! Hosts that pick a storage backend by name hold a [`BackendRegistry`]
//! and ask it for a [`ReadWriteStorage`] object.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chainlog_core::{Digest, SerializedRecord, StreamDescriptor, StreamId};
use chainlog_ledger::CheckpointPublisher;
use chainlog_store::{AccessMode, OpenStore, SqliteRecordStore};

use crate::error::{Result, SessionError};
use crate::metadata::{StorageMetadata, STORAGE_IDENTIFIER};
use crate::registry::RemovalDecision;
use crate::session::{SessionConfig, StorageSession};

/// Object-safe view of a storage session.
pub trait ReadWriteStorage: Send {
    fn open(&mut self, uri: &Path, mode: AccessMode) -> Result<()>;
    fn write(&mut self, record: SerializedRecord) -> Result<Digest>;
    fn has_next(&mut self) -> Result<bool>;
    fn read_next(&mut self) -> Result<SerializedRecord>;
    fn create_stream(&mut self, descriptor: &StreamDescriptor) -> Result<StreamId>;
    fn remove_stream(&mut self, descriptor: &StreamDescriptor) -> Result<RemovalDecision>;
    fn get_all_streams(&mut self) -> Result<Vec<StreamDescriptor>>;
    fn get_metadata(&self) -> Result<StorageMetadata>;
    fn close(&mut self) -> Result<()>;

    fn storage_identifier(&self) -> &str {
        STORAGE_IDENTIFIER
    }
}

impl<S: OpenStore> ReadWriteStorage for StorageSession<S> {
    fn open(&mut self, uri: &Path, mode: AccessMode) -> Result<()> {
        StorageSession::open(self, uri, mode)
    }

    fn write(&mut self, record: SerializedRecord) -> Result<Digest> {
        StorageSession::write(self, record)
    }

    fn has_next(&mut self) -> Result<bool> {
        StorageSession::has_next(self)
    }

    fn read_next(&mut self) -> Result<SerializedRecord> {
        StorageSession::read_next(self)
    }

    fn create_stream(&mut self, descriptor: &StreamDescriptor) -> Result<StreamId> {
        StorageSession::create_stream(self, descriptor)
    }

    fn remove_stream(&mut self, descriptor: &StreamDescriptor) -> Result<RemovalDecision> {
        StorageSession::remove_stream(self, descriptor)
    }

    fn get_all_streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        StorageSession::get_all_streams(self)
    }

    fn get_metadata(&self) -> Result<StorageMetadata> {
        StorageSession::get_metadata(self)
    }

    fn close(&mut self) -> Result<()> {
        StorageSession::close(self)
    }
}

/// Builds a closed storage object for a publisher and configuration.
pub type BackendConstructor = Box<
    dyn Fn(Arc<dyn CheckpointPublisher>, SessionConfig) -> Box<dyn ReadWriteStorage> + Send + Sync,
>;

/// Table from storage identifier to backend constructor.
#[derive(Default)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the SQLite backend registered as `"chainlog"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(STORAGE_IDENTIFIER, |publisher, config| {
            Box::new(StorageSession::<SqliteRecordStore>::new(publisher, config))
        });
        registry
    }

    /// Register a constructor, returning the one it replaces.
    pub fn register<F>(&mut self, identifier: impl Into<String>, constructor: F) -> Option<BackendConstructor>
    where
        F: Fn(Arc<dyn CheckpointPublisher>, SessionConfig) -> Box<dyn ReadWriteStorage>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(identifier.into(), Box::new(constructor))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.constructors.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build a closed storage object for `identifier`.
    pub fn create(
        &self,
        identifier: &str,
        publisher: Arc<dyn CheckpointPublisher>,
        config: SessionConfig,
    ) -> Result<Box<dyn ReadWriteStorage>> {
        let constructor = self
            .constructors
            .get(identifier)
            .ok_or_else(|| SessionError::UnknownBackend(identifier.to_string()))?;
        Ok(constructor(publisher, config))
    }
}
