//! Hashing - SHA-256 over canonical JSON
//!
//! Gives every rendered label a reproducible fingerprint of the content it
//! was drawn from, independent of render time or output resolution.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::content::LabelContent;

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compact JSON with object keys in sorted order. Going through
/// `serde_json::Value` sorts them: its maps are ordered by key.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::to_value(value)?)
}

/// Fingerprint of the merged label content. Same content, same hash.
pub fn content_hash(content: &LabelContent) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(content)?.as_bytes()))
}
