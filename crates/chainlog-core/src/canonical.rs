//! Canonical CBOR encoding for deterministic digests.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 nanoseconds)
//!
//! The same descriptor or record must produce identical bytes, and thus an
//! identical chain, on every platform.

use ciborium::value::Value;

use crate::error::{CoreError, Result};
use crate::record::RecordLink;
use crate::stream::StreamDescriptor;

/// Descriptor field keys.
mod descriptor_keys {
    pub const NAME: u64 = 0;
    pub const TYPE: u64 = 1;
    pub const SERIALIZATION_FORMAT: u64 = 2;
}

/// Record field keys.
mod record_keys {
    pub const TIMESTAMP: u64 = 0;
    pub const STREAM_ID: u64 = 1;
    pub const PAYLOAD: u64 = 2;
}

/// Encode a stream descriptor to canonical CBOR bytes.
pub fn canonical_descriptor_bytes(descriptor: &StreamDescriptor) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (
            Value::Integer(descriptor_keys::NAME.into()),
            Value::Text(descriptor.name.clone()),
        ),
        (
            Value::Integer(descriptor_keys::TYPE.into()),
            Value::Text(descriptor.type_name.clone()),
        ),
        (
            Value::Integer(descriptor_keys::SERIALIZATION_FORMAT.into()),
            Value::Text(descriptor.serialization_format.clone()),
        ),
    ]);
    encode_cbor_value_canonical(&value)
}

/// Encode the digested fields of a record to canonical CBOR bytes.
pub fn canonical_record_bytes(link: &RecordLink<'_>) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (
            Value::Integer(record_keys::TIMESTAMP.into()),
            Value::Integer(link.timestamp.into()),
        ),
        (
            Value::Integer(record_keys::STREAM_ID.into()),
            Value::Integer(link.stream_id.get().into()),
        ),
        (
            Value::Integer(record_keys::PAYLOAD.into()),
            Value::Bytes(link.payload.to_vec()),
        ),
    ]);
    encode_cbor_value_canonical(&value)
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut key_value_pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        key_value_pairs.push((key_buf, v));
    }

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
