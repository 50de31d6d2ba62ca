//! # chainlog
//!
//! A tamper-evident, append-only record log. Records are grouped into named
//! streams; every stream carries its own rolling BLAKE3 hash chain, and
//! every new link is handed to an external ledger for out-of-band
//! verification.
//!
//! ## Overview
//!
//! - **Streams**: created once per name, anchored to a session nonce that
//!   advances with every creation, so creation order is part of the chain
//! - **Records**: opaque payloads with a nanosecond timestamp, each linked
//!   to its stream's previous digest
//! - **Checkpoints**: each persisted link is published fire-and-forget
//! - **Audit**: stored chains can be replayed offline
//!
//! ## Key Concepts
//!
//! - **Immutable chain**: streams are never removed and records are never
//!   rewritten. `remove_stream` reports why it did nothing.
//! - **Global read order**: reads walk all streams by timestamp, with
//!   insertion order breaking ties.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chainlog::{SessionConfig, StorageSession};
//! use chainlog::core::{SerializedRecord, StreamDescriptor};
//! use chainlog::ledger::NoopPublisher;
//! use chainlog::store::AccessMode;
//!
//! let mut session: StorageSession =
//!     StorageSession::new(Arc::new(NoopPublisher), SessionConfig::default());
//! session.open("/tmp/run_01", AccessMode::ReadWrite).unwrap();
//!
//! session
//!     .create_stream(&StreamDescriptor::new("temperature", "Float32", "raw"))
//!     .unwrap();
//! let digest = session
//!     .write(SerializedRecord::new("temperature", 100, &b"22.5"[..]))
//!     .unwrap();
//! println!("chain tip {digest}");
//!
//! session.close().unwrap();
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `chainlog::core` - Digests, descriptors, records, digest engine
//! - `chainlog::store` - Record store trait, SQLite and in-memory stores
//! - `chainlog::ledger` - Checkpoint publishers and ledger sinks

pub mod audit;
pub mod error;
pub mod factory;
pub mod manifest;
pub mod metadata;
pub mod registry;
pub mod session;

// Re-export component crates
pub use chainlog_core as core;
pub use chainlog_ledger as ledger;
pub use chainlog_store as store;

// Re-export main types for convenience
pub use audit::{AuditReport, ChainAuditor, Violation, ViolationKind};
pub use error::{Result, SessionError};
pub use factory::{BackendConstructor, BackendRegistry, ReadWriteStorage};
pub use manifest::{Manifest, ManifestError, MANIFEST_FILE_NAME};
pub use metadata::{StorageMetadata, STORAGE_IDENTIFIER};
pub use registry::{
    ImmutableChainPolicy, Registration, RemovalDecision, RemovalPolicy, StreamRegistry,
};
pub use session::{SessionConfig, StorageSession, BACKING_FILE_EXTENSION};

// Re-export commonly used core types
pub use chainlog_core::{Digest, Nonce, SerializedRecord, StreamDescriptor, StreamId};
pub use chainlog_store::AccessMode;
