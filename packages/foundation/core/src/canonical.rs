//! Deterministic encoding for anything that gets hashed or signed.
//!
//! `serde_json::Value`'s map type is a `BTreeMap` (the `preserve_order`
//! cargo feature is never enabled in this workspace), so object keys come
//! out lexicographically sorted on every serialization regardless of
//! field-declaration order. That property, plus fixed float formatting, is
//! all "canonical" means here: the same logical value always produces the
//! same bytes, on any machine, in any process.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Serialize `value` to its canonical byte representation.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let as_value = serde_json::to_value(value).map_err(CoreError::Encode)?;
    serde_json::to_vec(&as_value).map_err(CoreError::Encode)
}

/// SHA-256 of a value's canonical encoding, hex-encoded.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let bytes = encode(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
