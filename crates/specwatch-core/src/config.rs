//! Configuration types for specwatch.
//!
//! Loaded from TOML. Every field has a default, so an empty or missing file
//! yields a working configuration:
//!
//! ```toml
//! [storage]
//! db_path = "./specwatch.db"
//! retention_limit = 50
//!
//! [fetch]
//! user_agent = "specwatch/0.1.0"
//! timeout_secs = 30
//!
//! [notify]
//! on_diff_failure = "notify"   # or "skip"
//! sink = "log"                 # "log" | "ndjson" | "webhook"
//! # ndjson_path = "./notifications.ndjson"
//! # webhook_url = "https://hooks.example.com/specwatch"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use crate::error::SpecwatchError;
use crate::Result;
use serde::{Deserialize, Serialize};
use specwatch_monitor::{
    DiffFailurePolicy, FetcherConfig, ScanConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT,
};
use specwatch_registry::{endpoints::validate_url, DEFAULT_RETENTION_LIMIT};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the specwatch service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecwatchConfig {
    /// Database and history retention.
    pub storage: StorageConfig,

    /// HTTP fetching.
    pub fetch: FetchConfig,

    /// Notification delivery.
    pub notify: NotifyConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

/// Database and history retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the Sled database directory.
    pub db_path: PathBuf,

    /// Snapshots kept per endpoint.
    pub retention_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./specwatch.db"),
            retention_limit: DEFAULT_RETENTION_LIMIT,
        }
    }
}

/// HTTP fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// `User-Agent` header value.
    pub user_agent: String,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

/// Where notifications go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log lines.
    #[default]
    Log,
    /// Newline-delimited JSON, to `ndjson_path` or stdout.
    Ndjson,
    /// HTTP POST to `webhook_url`.
    Webhook,
}

/// Notification delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// What to do when a changed document cannot be diffed.
    pub on_diff_failure: DiffFailurePolicy,

    /// Delivery backend.
    pub sink: SinkKind,

    /// Output file for the NDJSON sink; stdout when unset.
    pub ndjson_path: Option<PathBuf>,

    /// Target of the webhook sink.
    pub webhook_url: Option<String>,
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SpecwatchConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::Config`] if the file cannot be read, is not
    /// valid TOML for this schema, or fails [`Self::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            SpecwatchError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| SpecwatchError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::Config`] on parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SpecwatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::Config`] when the retention limit or the
    /// timeout is zero, or when the webhook sink has no valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.storage.retention_limit == 0 {
            return Err(SpecwatchError::Config(
                "storage.retention_limit must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(SpecwatchError::Config(
                "fetch.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.notify.sink == SinkKind::Webhook {
            let url = self.notify.webhook_url.as_deref().ok_or_else(|| {
                SpecwatchError::Config("notify.webhook_url is required for the webhook sink".to_string())
            })?;
            validate_url(url)
                .map_err(|e| SpecwatchError::Config(format!("notify.webhook_url: {e}")))?;
        }
        Ok(())
    }

    /// Scan pipeline settings derived from this configuration.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new()
            .with_retention_limit(self.storage.retention_limit)
            .with_diff_failure_policy(self.notify.on_diff_failure)
    }

    /// Fetcher settings derived from this configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::new()
            .with_user_agent(self.fetch.user_agent.clone())
            .with_timeout(Duration::from_secs(self.fetch.timeout_secs))
    }
}
