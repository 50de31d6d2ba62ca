//! # chainlog store
//!
//! Storage abstraction for chainlog. Provides a trait-based interface for
//! durable, ordered persistence of streams and chain-linked records, with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The session layer never touches SQL. It drives a [`RecordStore`], which
//! persists stream rows (with the nonce and digest each stream was created
//! with) and record rows (with their chain digest). The primary
//! implementation is [`SqliteRecordStore`], with [`MemoryRecordStore`] for
//! testing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainlog_store::{AccessMode, RecordStore, SqliteRecordStore};
//!
//! let mut store = SqliteRecordStore::open("recording.db3", AccessMode::ReadWrite).unwrap();
//! store.create_schema().unwrap();
//! ```
//!
//! ## Design Notes
//!
//! - **Append-only**: there is no update or delete path for streams or records
//! - **Global read order**: records are paged by `(timestamp, id)`
//! - **Single writer**: two stores over one backing file are unsupported

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use traits::{
    AccessMode, OpenStore, ReadPosition, RecordStore, StoredMessage, StreamAnchor,
    StreamStatistics,
};
