//! The digest engine: pure chain-step functions.
//!
//! ```text
//! stream digest  D_s = H("chainlog-stream-v0:" || N   || canon(descriptor))
//! next anchor    N'  = H("chainlog-anchor-v0:" || D_s || canon(descriptor))
//! record digest  D_i = H("chainlog-record-v0:" || D_{i-1} || canon(ts, stream_id, payload))
//! ```
//!
//! `D_0` of a stream is its stream digest. Each prefix separates a domain so
//! a value from one step can never be replayed as the output of another.
//!
//! # Example
//!
//! ```
//! use chainlog_core::{digest, Nonce, StreamDescriptor, StreamId, SerializedRecord};
//!
//! let nonce = Nonce::from_bytes([7; 32]);
//! let descriptor = StreamDescriptor::new("temperature", "Float32", "raw");
//!
//! let d1 = digest::compute_stream_digest(&nonce, &descriptor).unwrap();
//! let record = SerializedRecord::new("temperature", 100, &b"22.5"[..]);
//! let d2 = digest::compute_record_digest(&d1, &record.link(StreamId::new(1))).unwrap();
//! assert_ne!(d1, d2);
//! ```

use crate::canonical::{canonical_descriptor_bytes, canonical_record_bytes};
use crate::crypto::{Digest, Nonce};
use crate::error::Result;
use crate::record::RecordLink;
use crate::stream::StreamDescriptor;
use crate::validation::{validate_descriptor, validate_link};

pub const STREAM_DOMAIN: &[u8] = b"chainlog-stream-v0:";
pub const ANCHOR_DOMAIN: &[u8] = b"chainlog-anchor-v0:";
pub const RECORD_DOMAIN: &[u8] = b"chainlog-record-v0:";

/// Digest anchoring a new stream to the session's current nonce.
pub fn compute_stream_digest(nonce: &Nonce, descriptor: &StreamDescriptor) -> Result<Digest> {
    validate_descriptor(descriptor)?;
    let encoded = canonical_descriptor_bytes(descriptor)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(STREAM_DOMAIN);
    hasher.update(nonce.as_bytes());
    hasher.update(&encoded);
    Ok(Digest(*hasher.finalize().as_bytes()))
}

/// The session nonce that follows the creation of `descriptor`.
pub fn compute_next_anchor_nonce(digest: &Digest, descriptor: &StreamDescriptor) -> Result<Nonce> {
    validate_descriptor(descriptor)?;
    let encoded = canonical_descriptor_bytes(descriptor)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(ANCHOR_DOMAIN);
    hasher.update(digest.as_bytes());
    hasher.update(&encoded);
    Ok(Nonce(*hasher.finalize().as_bytes()))
}

/// Digest of the record following `previous` on its stream.
pub fn compute_record_digest(previous: &Digest, link: &RecordLink<'_>) -> Result<Digest> {
    validate_link(link)?;
    let encoded = canonical_record_bytes(link)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(RECORD_DOMAIN);
    hasher.update(previous.as_bytes());
    hasher.update(&encoded);
    Ok(Digest(*hasher.finalize().as_bytes()))
}

/// Fold a sequence of records onto a starting digest, returning every link.
///
/// Used to replay a persisted chain from its stream digest.
pub fn replay_chain<'a, I>(start: Digest, links: I) -> Result<Vec<Digest>>
where
    I: IntoIterator<Item = RecordLink<'a>>,
{
    let mut current = start;
    let mut digests = Vec::new();
    for link in links {
        current = compute_record_digest(&current, &link)?;
        digests.push(current);
    }
    Ok(digests)
}
