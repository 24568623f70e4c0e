//! # Persistent Storage Layer
//!
//! This module opens the embedded Sled database once and hands out the two
//! stores built on it. Nothing is constructed lazily: the caller opens the
//! [`Database`] first and passes the resulting [`EndpointRegistry`] and
//! [`VersionStore`] down explicitly, so no store can ever be used before
//! its backing database exists.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value | Purpose |
//! |------|-----|-------|---------|
//! | `endpoints` | endpoint id (16 bytes) | JSON `Endpoint` | Endpoint records |
//! | `endpoint_urls` | url (utf-8) | endpoint id | URL uniqueness index |
//! | `snapshots` | endpoint id ‖ fetch time (8 bytes BE) | JSON `Snapshot` | Version history |
//!
//! The snapshot key layout makes a prefix scan on the endpoint id return the
//! history in fetch order, which is what retention and `latest` rely on.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use crate::endpoints::EndpointRegistry;
use crate::models::Result;
use crate::versions::VersionStore;
use std::path::Path;

/// Tree name for endpoint records.
const ENDPOINT_TREE: &str = "endpoints";

/// Tree name for the url -> id index.
const URL_INDEX_TREE: &str = "endpoint_urls";

/// Tree name for snapshot history.
const SNAPSHOT_TREE: &str = "snapshots";

/// Handle to the embedded database and its trees.
///
/// Cloning is cheap; all clones share the same underlying database.
///
/// # Example
///
/// ```rust
/// use specwatch_registry::Database;
///
/// let db = Database::temporary().unwrap();
/// let registry = db.endpoint_registry();
/// let versions = db.version_store();
///
/// let endpoint = registry
///     .subscribe("https://api.example.com/openapi.json", "C01")
///     .unwrap();
/// assert!(versions.latest(endpoint.id).unwrap().is_none());
/// ```
#[derive(Clone)]
pub struct Database {
    /// The underlying Sled database.
    db: sled::Db,

    /// Endpoint records.
    endpoints: sled::Tree,

    /// URL uniqueness index.
    urls: sled::Tree,

    /// Snapshot history.
    snapshots: sled::Tree,
}

impl Database {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if the path is unusable, another
    /// process holds the lock, or the files are corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates an in-memory database that is discarded on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let endpoints = db.open_tree(ENDPOINT_TREE)?;
        let urls = db.open_tree(URL_INDEX_TREE)?;
        let snapshots = db.open_tree(SNAPSHOT_TREE)?;

        Ok(Database {
            db,
            endpoints,
            urls,
            snapshots,
        })
    }

    /// Returns the endpoint registry backed by this database.
    pub fn endpoint_registry(&self) -> EndpointRegistry {
        EndpointRegistry::new(self.endpoints.clone(), self.urls.clone())
    }

    /// Returns the version store backed by this database.
    pub fn version_store(&self) -> VersionStore {
        VersionStore::new(self.snapshots.clone())
    }

    /// Flushes all pending writes to disk, returning the bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("endpoints", &self.endpoints.len())
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}
