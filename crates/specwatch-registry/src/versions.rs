//! # Version Store
//!
//! Snapshot history per endpoint, with a bounded retention window.
//!
//! ## Ordering
//!
//! Keys are `endpoint_id (16 bytes) ‖ fetched_at micros (8 bytes, big endian,
//! sign bit flipped)`, so Sled's lexicographic order is fetch order within an
//! endpoint. `fetched_at` is strictly increasing per endpoint: when the clock
//! has not advanced past the newest stored snapshot, the new one is stamped
//! one microsecond later.
//!
//! ## Retention
//!
//! [`VersionStore::enforce_retention`] is meant to run after every
//! [`VersionStore::store`]. It is a no-op under the limit and otherwise drops
//! exactly `count - limit` of the oldest snapshots in one batch.
//!
//! Each endpoint's history is written only by the scan that owns it, so
//! the read of the newest key and the insert need no extra locking.

use crate::models::{ContentDigest, EndpointId, RegistryError, Result, Snapshot};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Length of an endpoint id prefix.
const ID_LEN: usize = 16;

/// Length of a full snapshot key.
const KEY_LEN: usize = ID_LEN + 8;

/// Sled-backed snapshot history.
///
/// Obtained from [`crate::Database::version_store`]. Cheap to clone.
///
/// # Example
///
/// ```rust
/// use specwatch_registry::{digest::digest, Database};
/// use serde_json::json;
///
/// let db = Database::temporary().unwrap();
/// let endpoint = db
///     .endpoint_registry()
///     .subscribe("https://api.example.com/openapi.json", "C1")
///     .unwrap();
/// let versions = db.version_store();
///
/// let doc = json!({"openapi": "3.0.0", "paths": {}});
/// let stored = versions.store(endpoint.id, digest(&doc), doc).unwrap();
///
/// let latest = versions.latest(endpoint.id).unwrap().unwrap();
/// assert_eq!(latest.id, stored.id);
/// ```
#[derive(Clone)]
pub struct VersionStore {
    snapshots: sled::Tree,
}

impl VersionStore {
    pub(crate) fn new(snapshots: sled::Tree) -> Self {
        Self { snapshots }
    }

    /// Stores a new snapshot for `endpoint_id` and returns it.
    ///
    /// Does not enforce retention; call [`Self::enforce_retention`] after.
    pub fn store(
        &self,
        endpoint_id: EndpointId,
        digest: ContentDigest,
        document: serde_json::Value,
    ) -> Result<Snapshot> {
        let now = Utc::now().timestamp_micros();
        let micros = match self.latest_micros(endpoint_id)? {
            Some(last) if now <= last => last + 1,
            _ => now,
        };

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            endpoint_id,
            digest,
            fetched_at: micros_to_datetime(micros),
            document,
        };

        let value = serde_json::to_vec(&snapshot)?;
        self.snapshots.insert(snapshot_key(endpoint_id, micros), value)?;

        debug!(
            endpoint_id = %endpoint_id,
            digest = snapshot.digest.short(),
            "Stored snapshot"
        );
        Ok(snapshot)
    }

    /// Returns the most recently fetched snapshot, if any.
    pub fn latest(&self, endpoint_id: EndpointId) -> Result<Option<Snapshot>> {
        match self.snapshots.scan_prefix(endpoint_id.as_bytes()).next_back() {
            Some(item) => {
                let (_, bytes) = item?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Returns the full history, oldest first.
    pub fn history(&self, endpoint_id: EndpointId) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for item in self.snapshots.scan_prefix(endpoint_id.as_bytes()) {
            let (_, bytes) = item?;
            snapshots.push(serde_json::from_slice(&bytes)?);
        }
        Ok(snapshots)
    }

    /// Returns the number of stored snapshots for an endpoint.
    pub fn count(&self, endpoint_id: EndpointId) -> Result<usize> {
        let mut count = 0;
        for key in self.snapshots.scan_prefix(endpoint_id.as_bytes()).keys() {
            key?;
            count += 1;
        }
        Ok(count)
    }

    /// Deletes the oldest snapshots beyond `limit`, returning how many.
    ///
    /// Idempotent: returns `0` and writes nothing when the endpoint has
    /// `limit` snapshots or fewer.
    ///
    /// # Example
    ///
    /// ```rust
    /// use specwatch_registry::{digest::digest, Database};
    /// use serde_json::json;
    ///
    /// let db = Database::temporary().unwrap();
    /// let versions = db.version_store();
    /// let id = uuid::Uuid::new_v4();
    ///
    /// for n in 0..5 {
    ///     let doc = json!({ "n": n });
    ///     versions.store(id, digest(&doc), doc).unwrap();
    /// }
    ///
    /// assert_eq!(versions.enforce_retention(id, 3).unwrap(), 2);
    /// assert_eq!(versions.enforce_retention(id, 3).unwrap(), 0);
    /// assert_eq!(versions.count(id).unwrap(), 3);
    /// ```
    pub fn enforce_retention(&self, endpoint_id: EndpointId, limit: usize) -> Result<usize> {
        let keys = self
            .snapshots
            .scan_prefix(endpoint_id.as_bytes())
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if keys.len() <= limit {
            return Ok(0);
        }

        let excess = keys.len() - limit;
        let mut batch = sled::Batch::default();
        for key in keys.into_iter().take(excess) {
            batch.remove(key);
        }
        self.snapshots.apply_batch(batch)?;

        debug!(endpoint_id = %endpoint_id, removed = excess, limit, "Enforced retention");
        Ok(excess)
    }

    /// Deletes every snapshot of an endpoint, returning how many.
    ///
    /// Used to cascade the deletion of an endpoint.
    pub fn delete_all(&self, endpoint_id: EndpointId) -> Result<usize> {
        let keys = self
            .snapshots
            .scan_prefix(endpoint_id.as_bytes())
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let removed = keys.len();
        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key);
        }
        self.snapshots.apply_batch(batch)?;
        Ok(removed)
    }

    fn latest_micros(&self, endpoint_id: EndpointId) -> Result<Option<i64>> {
        match self.snapshots.scan_prefix(endpoint_id.as_bytes()).keys().next_back() {
            Some(key) => Ok(Some(key_micros(&key?)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}

fn snapshot_key(endpoint_id: EndpointId, micros: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(KEY_LEN);
    key.extend_from_slice(endpoint_id.as_bytes());
    // Flip the sign bit so negative timestamps still sort before positive ones.
    key.extend_from_slice(&((micros as u64) ^ (1 << 63)).to_be_bytes());
    key
}

fn key_micros(key: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = key
        .get(ID_LEN..KEY_LEN)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(RegistryError::CorruptKey("snapshots"))?;
    Ok((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}
