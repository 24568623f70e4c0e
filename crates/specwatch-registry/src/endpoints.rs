//! # Endpoint Registry
//!
//! Persists monitored endpoints, their subscriber channels, and the digest of
//! the last stored snapshot.
//!
//! Two audiences use this registry:
//!
//! - The subscription front-end creates endpoints, adds and removes
//!   channels ([`EndpointRegistry::subscribe`], [`EndpointRegistry::unsubscribe`],
//!   [`EndpointRegistry::list_by_channel`]).
//! - The scanner only reads enabled endpoints and records digests
//!   ([`EndpointRegistry::list_enabled`], [`EndpointRegistry::update_digest`]).
//!   It never touches channel membership.
//!
//! Every read-modify-write runs in a Sled transaction; subscription changes
//! update the endpoint record and the url index together.

use crate::models::{ContentDigest, Endpoint, EndpointId, RegistryError, Result, Unsubscribed};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use tracing::debug;

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<RegistryError>>;

/// Sled-backed registry of monitored endpoints.
///
/// Obtained from [`crate::Database::endpoint_registry`]. Cheap to clone.
#[derive(Clone)]
pub struct EndpointRegistry {
    endpoints: sled::Tree,
    urls: sled::Tree,
}

impl EndpointRegistry {
    pub(crate) fn new(endpoints: sled::Tree, urls: sled::Tree) -> Self {
        Self { endpoints, urls }
    }

    /// Subscribes `channel` to `url`.
    ///
    /// Creates the endpoint on first subscription. Subscribing a channel
    /// that is already present is a no-op that returns the existing record.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidUrl` if `url` is not an absolute http(s) URL
    /// - `RegistryError::InvalidChannel` if `channel` is blank
    /// - `RegistryError::Database` / `Serialization` on storage failure
    ///
    /// # Example
    ///
    /// ```rust
    /// use specwatch_registry::Database;
    ///
    /// let registry = Database::temporary().unwrap().endpoint_registry();
    /// let first = registry.subscribe("https://api.example.com/spec.json", "C1").unwrap();
    /// let second = registry.subscribe("https://api.example.com/spec.json", "C2").unwrap();
    ///
    /// assert_eq!(first.id, second.id);
    /// assert_eq!(second.channels, vec!["C1", "C2"]);
    /// ```
    pub fn subscribe(&self, url: &str, channel: &str) -> Result<Endpoint> {
        validate_url(url)?;
        if channel.trim().is_empty() {
            return Err(RegistryError::InvalidChannel);
        }

        let result: std::result::Result<Endpoint, TransactionError<RegistryError>> =
            (&self.endpoints, &self.urls).transaction(|(endpoints, urls)| {
                if let Some(id_bytes) = urls.get(url.as_bytes())? {
                    if let Some(bytes) = endpoints.get(id_bytes.clone())? {
                        let mut endpoint = decode(&bytes)?;
                        if !endpoint.has_channel(channel) {
                            endpoint.channels.push(channel.to_string());
                            endpoints.insert(id_bytes, encode(&endpoint)?)?;
                        }
                        return Ok(endpoint);
                    }
                    // Dangling index entry; fall through and recreate.
                }

                let endpoint = Endpoint::new(url, channel);
                let key = endpoint.id.as_bytes().to_vec();
                endpoints.insert(key.clone(), encode(&endpoint)?)?;
                urls.insert(url.as_bytes(), key)?;
                Ok(endpoint)
            });

        let endpoint = result?;
        debug!(url = %endpoint.url, channel, "Subscribed channel");
        Ok(endpoint)
    }

    /// Removes `channel` from the endpoint at `url`.
    ///
    /// When the channel is the last subscriber the endpoint itself is
    /// deleted, and [`Unsubscribed::EndpointDeleted`] tells the caller to
    /// cascade the deletion to the snapshot history.
    pub fn unsubscribe(&self, url: &str, channel: &str) -> Result<Unsubscribed> {
        let result: std::result::Result<Unsubscribed, TransactionError<RegistryError>> =
            (&self.endpoints, &self.urls).transaction(|(endpoints, urls)| {
                let Some(id_bytes) = urls.get(url.as_bytes())? else {
                    return Ok(Unsubscribed::NotSubscribed);
                };
                let Some(bytes) = endpoints.get(id_bytes.clone())? else {
                    urls.remove(url.as_bytes())?;
                    return Ok(Unsubscribed::NotSubscribed);
                };

                let mut endpoint = decode(&bytes)?;
                if !endpoint.has_channel(channel) {
                    return Ok(Unsubscribed::NotSubscribed);
                }

                if endpoint.channels.len() == 1 {
                    endpoints.remove(id_bytes)?;
                    urls.remove(url.as_bytes())?;
                    return Ok(Unsubscribed::EndpointDeleted(endpoint.id));
                }

                endpoint.channels.retain(|c| c != channel);
                endpoints.insert(id_bytes, encode(&endpoint)?)?;
                Ok(Unsubscribed::ChannelRemoved)
            });

        let outcome = result?;
        debug!(url, channel, ?outcome, "Unsubscribed channel");
        Ok(outcome)
    }

    /// Lists endpoints `channel` is subscribed to, oldest first.
    pub fn list_by_channel(&self, channel: &str) -> Result<Vec<Endpoint>> {
        self.collect(|endpoint| endpoint.has_channel(channel))
    }

    /// Lists all enabled endpoints, oldest first.
    pub fn list_enabled(&self) -> Result<Vec<Endpoint>> {
        self.collect(|endpoint| endpoint.enabled)
    }

    /// Lists every endpoint, oldest first.
    pub fn list_all(&self) -> Result<Vec<Endpoint>> {
        self.collect(|_| true)
    }

    /// Loads an endpoint by id.
    pub fn get(&self, id: EndpointId) -> Result<Option<Endpoint>> {
        match self.endpoints.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Loads an endpoint by its URL.
    pub fn find_by_url(&self, url: &str) -> Result<Option<Endpoint>> {
        let Some(id_bytes) = self.urls.get(url.as_bytes())? else {
            return Ok(None);
        };
        match self.endpoints.get(id_bytes)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Records the digest of the snapshot just stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if the endpoint was deleted in the
    /// meantime.
    pub fn update_digest(&self, id: EndpointId, digest: &ContentDigest) -> Result<()> {
        self.modify(id, |endpoint| endpoint.last_digest = Some(digest.clone()))
    }

    /// Enables or disables scanning of an endpoint.
    pub fn set_enabled(&self, id: EndpointId, enabled: bool) -> Result<()> {
        self.modify(id, |endpoint| endpoint.enabled = enabled)
    }

    /// Returns the number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if no endpoints are registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn modify<F>(&self, id: EndpointId, change: F) -> Result<()>
    where
        F: Fn(&mut Endpoint),
    {
        let key = id.as_bytes().to_vec();
        let result: std::result::Result<(), TransactionError<RegistryError>> =
            self.endpoints.transaction(|tx| {
                let Some(bytes) = tx.get(&key)? else {
                    return Err(ConflictableTransactionError::Abort(RegistryError::NotFound(id)));
                };
                let mut endpoint = decode(&bytes)?;
                change(&mut endpoint);
                tx.insert(key.clone(), encode(&endpoint)?)?;
                Ok(())
            });
        Ok(result?)
    }

    fn collect<F>(&self, keep: F) -> Result<Vec<Endpoint>>
    where
        F: Fn(&Endpoint) -> bool,
    {
        let mut endpoints = Vec::new();
        for item in self.endpoints.iter() {
            let (_, bytes) = item?;
            let endpoint: Endpoint = serde_json::from_slice(&bytes)?;
            if keep(&endpoint) {
                endpoints.push(endpoint);
            }
        }
        endpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.url.cmp(&b.url)));
        Ok(endpoints)
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.len())
            .finish()
    }
}

/// Checks that `url` is an absolute http or https URL with a host.
///
/// # Example
///
/// ```rust
/// use specwatch_registry::endpoints::validate_url;
///
/// assert!(validate_url("https://api.example.com/openapi.json").is_ok());
/// assert!(validate_url("ftp://example.com/spec.json").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url: &str) -> Result<()> {
    let invalid = || RegistryError::InvalidUrl(url.to_string());

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(invalid)?;

    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    if host.is_empty() || host.starts_with(':') || url.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(())
}

fn encode(endpoint: &Endpoint) -> TxResult<Vec<u8>> {
    serde_json::to_vec(endpoint).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

fn decode(bytes: &[u8]) -> TxResult<Endpoint> {
    serde_json::from_slice(bytes).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}
