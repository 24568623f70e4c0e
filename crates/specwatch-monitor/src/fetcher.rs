//! # Specification Fetcher
//!
//! Retrieves a specification document over HTTP(S) and hands back the parsed
//! JSON object. No retries: a failed fetch is retried by the next scan.
//!
//! ## Acceptance
//!
//! | Check | Failure |
//! |-------|---------|
//! | status is 2xx | [`FetchError::Status`] |
//! | `Content-Type` is `application/json` or `*/*+json` | [`FetchError::UnsupportedContent`] |
//! | body parses as JSON | [`FetchError::Parse`] |
//! | root is an object | [`FetchError::NotAnObject`] |
//!
//! Key order is preserved as received, since the content digest depends on it.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("specwatch/", env!("CARGO_PKG_VERSION"));

/// Request timeout applied when none is configured.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce a specification document for a URL.
///
/// [`SpecFetcher`] is the HTTP implementation; tests substitute their own.
#[async_trait]
pub trait SpecSource: Send + Sync {
    /// Fetches and parses the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the document cannot be retrieved or is
    /// not a JSON object.
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

/// Configuration for [`SpecFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl FetcherConfig {
    /// Creates a config with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP [`SpecSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct SpecFetcher {
    client: reqwest::Client,
}

impl SpecFetcher {
    /// Builds a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SpecSource for SpecFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_json_media_type(&content_type) {
            return Err(FetchError::UnsupportedContent { content_type });
        }

        let body = response.bytes().await?;
        let document: Value = serde_json::from_slice(&body).map_err(FetchError::Parse)?;
        if !document.is_object() {
            return Err(FetchError::NotAnObject);
        }

        debug!(url, bytes = body.len(), "Fetched specification");
        Ok(document)
    }
}

/// `application/json` or any structured-syntax `+json` type, parameters ignored.
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.contains('/') && essence.ends_with("+json"))
}
