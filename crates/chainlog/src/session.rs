//! The storage session: one open backing store plus the chain state that
//! goes with it.
//!
//! A session moves `Closed -> Open(ReadOnly | ReadWrite) -> Closed`. While
//! open, the write path and the read cursor are prepared lazily on first use
//! and live until close. Writes follow a fixed order:
//!
//! ```text
//! digest(previous tip, record) -> persist -> advance tip -> publish checkpoint
//! ```
//!
//! Persisting and advancing the tip form one unit: if the store rejects the
//! record, the tip stays where it was and no checkpoint is published.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chainlog_core::{
    compute_record_digest, Digest, Nonce, SerializedRecord, StreamDescriptor, StreamId,
};
use chainlog_ledger::{Checkpoint, CheckpointPublisher, StreamAnnouncement};
use chainlog_store::{
    AccessMode, OpenStore, ReadPosition, RecordStore, SqliteRecordStore, StoreError,
    StoredMessage,
};

use crate::error::{Result, SessionError};
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::metadata::StorageMetadata;
use crate::registry::{Registration, RemovalDecision, StreamRegistry};

/// Extension of the backing file created in a session directory.
pub const BACKING_FILE_EXTENSION: &str = "db3";

/// Configuration for a storage session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Records fetched per page by the read cursor.
    pub read_batch_size: usize,
    /// Manifest file name inside the session directory.
    pub manifest_file_name: String,
    /// Whether a read-write session writes the manifest on open and close.
    pub write_manifest: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_batch_size: 256,
            manifest_file_name: MANIFEST_FILE_NAME.to_string(),
            write_manifest: true,
        }
    }
}

/// Forward-only cursor over all records in `(timestamp, id)` order.
struct ReadCursor {
    buffer: VecDeque<StoredMessage>,
    position: ReadPosition,
    exhausted: bool,
}

impl ReadCursor {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            position: ReadPosition::START,
            exhausted: false,
        }
    }

    fn refill<S: RecordStore + ?Sized>(&mut self, store: &S, batch_size: usize) -> Result<()> {
        let page = store
            .query_records_ordered_by_timestamp(self.position, batch_size)
            .map_err(|e| SessionError::backend("read records", e))?;

        if page.len() < batch_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.position = last.position();
        }

        tracing::debug!(fetched = page.len(), exhausted = self.exhausted, "read cursor refilled");
        self.buffer.extend(page);
        Ok(())
    }
}

/// Marker for a prepared insert path.
struct WritePath {
    written: u64,
}

/// State that only exists while the session is open.
///
/// Field order is drop order: the cursor and the write path are released
/// before the store handle.
struct OpenSession<S> {
    reader: Option<ReadCursor>,
    writer: Option<WritePath>,
    stream_cache: Option<Vec<StreamDescriptor>>,
    store: S,
    mode: AccessMode,
    /// Session directory; `None` for attached stores.
    uri: Option<PathBuf>,
    relative_file_paths: Vec<String>,
}

impl<S: RecordStore> OpenSession<S> {
    fn metadata(&self) -> Result<StorageMetadata> {
        let streams = self
            .store
            .aggregate_per_stream_stats()
            .map_err(|e| SessionError::backend("aggregate stream statistics", e))?;
        let size_bytes = self
            .store
            .storage_size_bytes()
            .map_err(|e| SessionError::backend("measure storage size", e))?;
        Ok(StorageMetadata::from_statistics(
            self.relative_file_paths.clone(),
            streams,
            size_bytes,
        ))
    }

    fn uri_display(&self) -> String {
        self.uri
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<attached>".to_string())
    }
}

/// A tamper-evident storage session over a record store.
///
/// Dropping an open session releases it like [`close`](Self::close) does,
/// except that the manifest is not refreshed.
pub struct StorageSession<S: RecordStore = SqliteRecordStore> {
    registry: StreamRegistry,
    publisher: Arc<dyn CheckpointPublisher>,
    config: SessionConfig,
    state: Option<OpenSession<S>>,
}

impl<S: RecordStore> StorageSession<S> {
    /// Create a closed session with a fresh random nonce.
    pub fn new(publisher: Arc<dyn CheckpointPublisher>, config: SessionConfig) -> Self {
        Self::with_nonce(Nonce::generate(), publisher, config)
    }

    /// Create a closed session anchored at a caller-supplied nonce.
    pub fn with_nonce(
        nonce: Nonce,
        publisher: Arc<dyn CheckpointPublisher>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry: StreamRegistry::new(nonce),
            publisher,
            config,
            state: None,
        }
    }

    /// Replace the stream registry, e.g. to install a different removal policy.
    pub fn with_registry(mut self, registry: StreamRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Access mode of the open session.
    pub fn mode(&self) -> Option<AccessMode> {
        self.state.as_ref().map(|s| s.mode)
    }

    /// Open the session over an already constructed store.
    ///
    /// No manifest is read or written. In read-write mode the schema is
    /// created.
    pub fn attach(&mut self, mut store: S, mode: AccessMode) -> Result<()> {
        if self.state.is_some() {
            return Err(SessionError::AlreadyOpen);
        }
        if !mode.is_read_only() {
            store
                .create_schema()
                .map_err(|e| SessionError::backend("create schema", e))?;
        }
        self.state = Some(OpenSession {
            reader: None,
            writer: None,
            stream_cache: None,
            store,
            mode,
            uri: None,
            relative_file_paths: Vec::new(),
        });
        tracing::info!(?mode, "session attached to store");
        Ok(())
    }

    /// Append a record to its stream's chain and return the new digest.
    pub fn write(&mut self, record: SerializedRecord) -> Result<Digest> {
        let open = self.state.as_mut().ok_or(SessionError::NotOpen)?;
        if open.mode.is_read_only() {
            return Err(SessionError::ReadOnly);
        }

        let state = self
            .registry
            .lookup(&record.stream_name)
            .ok_or_else(|| SessionError::UnknownStream(record.stream_name.clone()))?;
        let (stream_id, previous, nonce) = (state.id, state.current_digest, state.current_nonce);

        if open.writer.is_none() {
            open.store
                .prepare_for_writing()
                .map_err(|e| SessionError::backend("prepare record insert", e))?;
            open.writer = Some(WritePath { written: 0 });
        }

        let digest = compute_record_digest(&previous, &record.link(stream_id))?;

        open.store
            .insert_record(stream_id, record.timestamp, &record.payload, &digest)
            .map_err(|e| {
                SessionError::backend(format!("write to stream '{}'", record.stream_name), e)
            })?;

        self.registry.record_written(&record.stream_name, digest);
        if let Some(writer) = open.writer.as_mut() {
            writer.written += 1;
        }

        tracing::debug!(
            stream = %record.stream_name,
            timestamp = record.timestamp,
            digest = ?digest,
            "record written"
        );

        self.publisher.publish(Checkpoint {
            digest,
            nonce,
            record,
        });
        Ok(digest)
    }

    /// Whether another record is available to [`read_next`](Self::read_next).
    pub fn has_next(&mut self) -> Result<bool> {
        let batch_size = self.config.read_batch_size.max(1);
        let open = self.state.as_mut().ok_or(SessionError::NotOpen)?;
        let cursor = open.reader.get_or_insert_with(ReadCursor::new);

        if cursor.buffer.is_empty() && !cursor.exhausted {
            cursor.refill(&open.store, batch_size)?;
        }
        Ok(!cursor.buffer.is_empty())
    }

    /// The next record in global timestamp order.
    pub fn read_next(&mut self) -> Result<SerializedRecord> {
        if !self.has_next()? {
            return Err(SessionError::EndOfStream);
        }

        let message = self
            .state
            .as_mut()
            .and_then(|open| open.reader.as_mut())
            .and_then(|cursor| cursor.buffer.pop_front())
            .ok_or(SessionError::EndOfStream)?;

        Ok(SerializedRecord {
            stream_name: message.stream_name,
            timestamp: message.timestamp,
            payload: message.payload,
        })
    }

    /// Register a stream. Idempotent by name.
    pub fn create_stream(&mut self, descriptor: &StreamDescriptor) -> Result<StreamId> {
        let open = self.state.as_mut().ok_or(SessionError::NotOpen)?;
        if open.mode.is_read_only() {
            return Err(SessionError::ReadOnly);
        }

        let registration = self.registry.create_stream(&mut open.store, descriptor)?;
        if let Registration::Created { digest, .. } = registration {
            self.publisher.announce_stream(StreamAnnouncement {
                digest,
                descriptor: descriptor.clone(),
            });
        }
        Ok(registration.id())
    }

    /// Request removal of a stream. Streams are never removed; the returned
    /// decision says why.
    pub fn remove_stream(&mut self, descriptor: &StreamDescriptor) -> Result<RemovalDecision> {
        if self.state.is_none() {
            return Err(SessionError::NotOpen);
        }
        let decision = self.registry.remove_stream(descriptor);
        tracing::debug!(stream = %descriptor.name, ?decision, "stream removal requested");
        Ok(decision)
    }

    /// All streams in creation order.
    ///
    /// Loaded from the store on first call and cached until close.
    pub fn get_all_streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        let open = self.state.as_mut().ok_or(SessionError::NotOpen)?;
        if open.stream_cache.is_none() {
            let streams = open
                .store
                .query_streams_ordered_by_id()
                .map_err(|e| SessionError::backend("list streams", e))?;
            open.stream_cache = Some(streams);
        }
        Ok(open.stream_cache.clone().unwrap_or_default())
    }

    /// Current metadata of the backing store.
    pub fn get_metadata(&self) -> Result<StorageMetadata> {
        self.state.as_ref().ok_or(SessionError::NotOpen)?.metadata()
    }

    /// Release the backing store. Does nothing on a closed session.
    ///
    /// A read-write session refreshes its manifest with the final metadata.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut open) = self.state.take() else {
            return Ok(());
        };
        self.registry.clear_streams();

        open.reader = None;
        let written = open.writer.take().map(|w| w.written).unwrap_or(0);

        let refresh = match (&open.uri, open.mode) {
            (Some(uri), AccessMode::ReadWrite) if self.config.write_manifest => {
                Some((uri.join(&self.config.manifest_file_name), open.metadata()))
            }
            _ => None,
        };

        let uri = open.uri_display();
        drop(open);

        if let Some((path, metadata)) = refresh {
            write_manifest(&path, &uri, &metadata?)?;
        }

        tracing::info!(uri = %uri, written, "session closed");
        Ok(())
    }
}

impl<S: OpenStore> StorageSession<S> {
    /// Open the session directory at `uri`.
    ///
    /// Read-only sessions locate their backing file through the manifest.
    /// Read-write sessions create `<uri>/<last component of uri>.db3`, which
    /// must not exist yet.
    pub fn open(&mut self, uri: impl AsRef<Path>, mode: AccessMode) -> Result<()> {
        if self.state.is_some() {
            return Err(SessionError::AlreadyOpen);
        }

        let uri = uri.as_ref();
        let uri_string = uri.display().to_string();
        let context = || format!("open '{}'", uri_string);

        let (store, relative_file_paths, created) = match mode {
            AccessMode::ReadOnly => {
                let manifest_path = uri.join(&self.config.manifest_file_name);
                let manifest = Manifest::load(&manifest_path).map_err(|e| SessionError::NotFound {
                    uri: uri_string.clone(),
                    reason: format!("cannot read {}: {}", manifest_path.display(), e),
                })?;

                let Some(relative) = manifest.relative_file_paths.first() else {
                    return Err(SessionError::NotFound {
                        uri: uri_string.clone(),
                        reason: "manifest lists no backing files".into(),
                    });
                };
                let backing = uri.join(relative);
                if !backing.is_file() {
                    return Err(SessionError::NotFound {
                        uri: uri_string.clone(),
                        reason: format!("backing file {} does not exist", backing.display()),
                    });
                }

                let store = S::open_file(&backing, mode)
                    .map_err(|e| SessionError::backend(context(), e))?;
                (store, manifest.relative_file_paths, None)
            }
            AccessMode::ReadWrite => {
                let relative = backing_file_name(uri).ok_or_else(|| SessionError::NotFound {
                    uri: uri_string.clone(),
                    reason: "uri has no final path component to name the backing file".into(),
                })?;

                fs::create_dir_all(uri)
                    .map_err(|e| SessionError::backend(context(), StoreError::Io(e)))?;

                let backing = uri.join(&relative);
                if backing.exists() {
                    return Err(SessionError::backend(
                        context(),
                        StoreError::InvalidData(format!(
                            "{} already exists; a chain cannot be resumed by a new session",
                            backing.display()
                        )),
                    ));
                }

                let mut store = match S::open_file(&backing, mode) {
                    Ok(store) => store,
                    Err(e) => {
                        discard_backing_file(&backing);
                        return Err(SessionError::backend(context(), e));
                    }
                };
                if let Err(e) = store.create_schema() {
                    drop(store);
                    discard_backing_file(&backing);
                    return Err(SessionError::backend(context(), e));
                }
                (store, vec![relative], Some(backing))
            }
        };

        let open = OpenSession {
            reader: None,
            writer: None,
            stream_cache: None,
            store,
            mode,
            uri: Some(uri.to_path_buf()),
            relative_file_paths,
        };

        if !mode.is_read_only() && self.config.write_manifest {
            let manifest_path = uri.join(&self.config.manifest_file_name);
            let written = open
                .metadata()
                .and_then(|metadata| write_manifest(&manifest_path, &uri_string, &metadata));
            if let Err(e) = written {
                // The store must be closed before its file can go.
                drop(open);
                if let Some(backing) = &created {
                    discard_backing_file(backing);
                }
                return Err(e);
            }
        }

        self.state = Some(open);
        tracing::info!(uri = %uri_string, ?mode, "session opened");
        Ok(())
    }
}

/// `<last component>.db3` for a session directory.
fn backing_file_name(uri: &Path) -> Option<String> {
    let stem = uri.file_name()?.to_str()?;
    Some(format!("{}.{}", stem, BACKING_FILE_EXTENSION))
}

/// Remove a backing file left behind by a failed read-write open, so the
/// same uri can be opened again.
fn discard_backing_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "discarded backing file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to discard backing file")
        }
    }
}

fn write_manifest(path: &Path, uri: &str, metadata: &StorageMetadata) -> Result<()> {
    Manifest::from_metadata(metadata)
        .save(path)
        .map_err(|e| SessionError::Manifest {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}
