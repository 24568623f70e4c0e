//! # specwatch Registry
//!
//! Persistence for the specwatch pipeline: which API specification URLs are
//! monitored, who subscribes to them, and the history of documents fetched
//! from each.
//!
//! ## Purpose
//!
//! This crate provides three capabilities:
//!
//! 1. **Content digests** - SHA-256 over the compact serialization of a
//!    document, the cheap gate that decides whether anything changed.
//!
//! 2. **Endpoint registry** - endpoints, their subscriber channels, the
//!    enabled flag and the last-seen digest.
//!
//! 3. **Version store** - an ordered, bounded snapshot history per endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Database (sled)               │
//! │  ┌──────────────────┐  ┌────────────────────┐ │
//! │  │ EndpointRegistry │  │    VersionStore    │ │
//! │  │ endpoints + urls │  │     snapshots      │ │
//! │  └──────────────────┘  └────────────────────┘ │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! The [`Database`] is opened once and both stores are handed out from it,
//! so they can be injected wherever they are needed.
//!
//! ## Usage
//!
//! ```rust
//! use specwatch_registry::{digest::digest, Database, DEFAULT_RETENTION_LIMIT};
//! use serde_json::json;
//!
//! let db = Database::temporary().unwrap();
//! let registry = db.endpoint_registry();
//! let versions = db.version_store();
//!
//! let endpoint = registry
//!     .subscribe("https://petstore.example.com/openapi.json", "C-alerts")
//!     .unwrap();
//!
//! let document = json!({"openapi": "3.0.3", "paths": {}});
//! let d = digest(&document);
//! versions.store(endpoint.id, d.clone(), document).unwrap();
//! registry.update_digest(endpoint.id, &d).unwrap();
//! versions.enforce_retention(endpoint.id, DEFAULT_RETENTION_LIMIT).unwrap();
//!
//! let reloaded = registry.get(endpoint.id).unwrap().unwrap();
//! assert_eq!(reloaded.last_digest, Some(d));
//! ```

pub mod digest;
pub mod endpoints;
pub mod models;
pub mod storage;
pub mod versions;

pub use endpoints::EndpointRegistry;
pub use models::{
    ContentDigest, Endpoint, EndpointId, RegistryError, Result, Snapshot, Unsubscribed,
    DEFAULT_RETENTION_LIMIT,
};
pub use storage::Database;
pub use versions::VersionStore;

#[cfg(test)]
mod tests;
