//! # Content Digests
//!
//! The digest is the only change gate in the pipeline: if the digest of a
//! freshly fetched document equals the endpoint's `last_digest`, nothing
//! changed and the scan stops there.
//!
//! ## Serialization
//!
//! Documents are serialized compactly in their natural key order, exactly as
//! received (the workspace enables serde_json's `preserve_order`). Keys are
//! NOT sorted: a server that reorders keys produces a new digest and a new
//! snapshot, but the diff that follows will be empty of changes.
//!
//! ## Example
//!
//! ```rust
//! use specwatch_registry::digest::digest;
//! use serde_json::json;
//!
//! let a = digest(&json!({"openapi": "3.0.0", "paths": {}}));
//! let b = digest(&json!({"openapi": "3.0.0", "paths": {}}));
//! assert_eq!(a, b);
//! assert_eq!(a.as_str().len(), 64);
//! ```

use crate::models::ContentDigest;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of a document's compact serialization.
///
/// Pure and deterministic: identical serialized content always yields an
/// identical digest.
pub fn digest(document: &serde_json::Value) -> ContentDigest {
    // Display for Value is the compact serializer and cannot fail.
    digest_bytes(document.to_string().as_bytes())
}

/// Computes the SHA-256 digest of raw bytes, hex-encoded.
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ContentDigest::from_hex(hex::encode(hasher.finalize()))
}
