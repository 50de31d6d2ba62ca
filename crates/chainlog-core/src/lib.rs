//! # chainlog core
//!
//! Pure primitives for chainlog: digests, nonces, stream descriptors, records
//! and the digest engine that links them into per-stream hash chains.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Digest`] - One link of a stream's chain (Blake3)
//! - [`Nonce`] - Session chain anchor, advanced on every stream creation
//! - [`StreamDescriptor`] - Name, type and serialization format of a stream
//! - [`StreamState`] - The tip of one stream's chain
//! - [`SerializedRecord`] / [`Record`] - Caller-facing and persisted records
//!
//! ## Canonicalization
//!
//! Everything that is digested is first encoded as deterministic CBOR. See
//! the [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod record;
pub mod stream;
pub mod types;
pub mod validation;

pub use canonical::{canonical_descriptor_bytes, canonical_record_bytes};
pub use crypto::{Digest, Nonce, HASH_LENGTH};
pub use digest::{compute_next_anchor_nonce, compute_record_digest, compute_stream_digest};
pub use error::{CoreError, Result};
pub use record::{Record, RecordLink, SerializedRecord};
pub use stream::{StreamDescriptor, StreamState};
pub use types::StreamId;
pub use validation::{validate_descriptor, validate_link};
