//! # Core Data Models for the Registry
//!
//! This module defines the records the registry persists: monitored
//! [`Endpoint`]s and the [`Snapshot`]s of the specification documents fetched
//! from them, plus the [`ContentDigest`] that gates change detection.
//!
//! ## Lifecycle
//!
//! | Record | Created | Mutated | Deleted |
//! |--------|---------|---------|---------|
//! | `Endpoint` | first subscription to a URL | channel add/remove, digest update | last subscriber leaves |
//! | `Snapshot` | first fetch or detected change | never | retention or endpoint cascade |
//!
//! An `Endpoint` never holds its snapshots in memory; a `Snapshot` refers to
//! its owner through `endpoint_id` only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a monitored endpoint.
pub type EndpointId = Uuid;

/// Number of snapshots kept per endpoint unless the caller asks otherwise.
pub const DEFAULT_RETENTION_LIMIT: usize = 50;

/// Lowercase hex SHA-256 digest of a serialized specification document.
///
/// Two documents with byte-identical serialized content always produce
/// the same digest. See [`crate::digest`] for how it is computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Wraps an already hex-encoded digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 characters, enough for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monitored URL and the channels subscribed to it.
///
/// # Invariants
///
/// - `channels` is never empty for a persisted endpoint. Removing the last
///   channel deletes the endpoint instead.
/// - `url` is unique across the registry.
/// - `last_digest` is `None` until the first successful fetch.
///
/// # Example
///
/// ```rust
/// use specwatch_registry::Endpoint;
///
/// let endpoint = Endpoint::new("https://api.example.com/openapi.json", "C042");
/// assert!(endpoint.is_first_fetch());
/// assert!(endpoint.enabled);
/// assert_eq!(endpoint.channels, vec!["C042".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Opaque identity.
    pub id: EndpointId,

    /// URL serving the specification document.
    pub url: String,

    /// Subscriber channel identifiers, in subscription order, no duplicates.
    pub channels: Vec<String>,

    /// Digest of the most recently stored snapshot.
    pub last_digest: Option<ContentDigest>,

    /// Disabled endpoints are skipped by the scanner.
    pub enabled: bool,

    /// When the first subscription created this endpoint.
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    /// Creates a fresh, enabled endpoint with a single subscriber.
    pub fn new(url: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            channels: vec![channel.into()],
            last_digest: None,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// True until the endpoint has been fetched successfully once.
    pub fn is_first_fetch(&self) -> bool {
        self.last_digest.is_none()
    }

    /// Whether `channel` is subscribed.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

/// A stored copy of a fetched specification document.
///
/// Snapshots are immutable once written. `fetched_at` is strictly
/// increasing per endpoint, which is what orders the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identity.
    pub id: Uuid,

    /// Owning endpoint.
    pub endpoint_id: EndpointId,

    /// Digest of `document`.
    pub digest: ContentDigest,

    /// Fetch time, unique within the endpoint's history.
    pub fetched_at: DateTime<Utc>,

    /// The raw document as received.
    pub document: serde_json::Value,
}

/// Outcome of removing a channel from an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscribed {
    /// The URL is unknown or the channel was not subscribed to it.
    NotSubscribed,

    /// The channel was removed; other subscribers remain.
    ChannelRemoved,

    /// The channel was the last subscriber, so the endpoint was deleted.
    ///
    /// The caller owns cascading the deletion to the snapshot history.
    EndpointDeleted(EndpointId),
}

/// Errors raised by the registry and version store.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The embedded database failed.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A record could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The URL is not an absolute http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The channel identifier is empty.
    #[error("Invalid channel: channel id must not be empty")]
    InvalidChannel,

    /// No endpoint with this id exists.
    #[error("Endpoint not found: {0}")]
    NotFound(EndpointId),

    /// A stored key did not have the expected layout.
    #[error("Corrupt storage key in tree '{0}'")]
    CorruptKey(&'static str),
}

impl From<sled::transaction::TransactionError<RegistryError>> for RegistryError {
    fn from(err: sled::transaction::TransactionError<RegistryError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(inner) => RegistryError::Database(inner),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
