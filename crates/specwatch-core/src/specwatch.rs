//! The specwatch service facade.
//!
//! [`Specwatch`] opens the database once, builds the fetcher and sink from
//! configuration, and wires them into the scan scheduler. Front-ends (the
//! CLI, tests) talk to this type only.

use crate::config::{NotifyConfig, SinkKind, SpecwatchConfig};
use crate::error::SpecwatchError;
use crate::Result;
use specwatch_monitor::{
    BatchOutcome, EndpointChecker, ScanScheduler, ScanState, SpecFetcher, SpecSource,
};
use specwatch_notify::{LogSink, NdjsonSink, NotificationSink, WebhookSink};
use specwatch_registry::{Database, Endpoint, EndpointRegistry, Snapshot, Unsubscribed, VersionStore};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// The specwatch service.
///
/// # Example
///
/// ```rust,no_run
/// use specwatch_core::{Specwatch, SpecwatchConfig};
///
/// # async fn demo() -> specwatch_core::Result<()> {
/// let specwatch = Specwatch::new(SpecwatchConfig::default())?;
/// specwatch.subscribe("https://petstore3.swagger.io/api/v3/openapi.json", "C-alerts")?;
///
/// let outcome = specwatch.scan_once().await;
/// if let Some(report) = outcome.report() {
///     println!("checked {} endpoint(s)", report.checked());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Specwatch {
    config: SpecwatchConfig,
    db: Database,
    registry: EndpointRegistry,
    versions: VersionStore,
    scheduler: Arc<ScanScheduler>,
}

impl Specwatch {
    /// Creates the service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The database cannot be opened
    /// - The HTTP client or the configured sink cannot be built
    pub fn new(config: SpecwatchConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.storage.db_path)?;
        let source: Arc<dyn SpecSource> = Arc::new(SpecFetcher::new(&config.fetcher_config())?);
        let sink = build_sink(&config.notify)?;

        info!(
            db_path = %config.storage.db_path.display(),
            sink = sink.name(),
            retention = config.storage.retention_limit,
            "specwatch initialized"
        );
        Self::with_components(config, db, source, sink)
    }

    /// Creates the service from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::Config`] if the configuration is invalid.
    pub fn with_components(
        config: SpecwatchConfig,
        db: Database,
        source: Arc<dyn SpecSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = db.endpoint_registry();
        let versions = db.version_store();
        let checker = EndpointChecker::new(
            source,
            sink,
            registry.clone(),
            versions.clone(),
            config.scan_config(),
        );

        Ok(Self {
            config,
            db,
            registry,
            versions,
            scheduler: Arc::new(ScanScheduler::new(checker)),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &SpecwatchConfig {
        &self.config
    }

    /// Subscribes `channel` to `url`, creating the endpoint if needed.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid URL or channel, or a database failure.
    pub fn subscribe(&self, url: &str, channel: &str) -> Result<Endpoint> {
        let endpoint = self.registry.subscribe(url, channel)?;
        info!(url, channel, channels = endpoint.channels.len(), "Subscribed");
        Ok(endpoint)
    }

    /// Unsubscribes `channel` from `url`.
    ///
    /// Removing the last channel deletes the endpoint and its whole history.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn unsubscribe(&self, url: &str, channel: &str) -> Result<Unsubscribed> {
        let outcome = self.registry.unsubscribe(url, channel)?;
        match outcome {
            Unsubscribed::NotSubscribed => {
                warn!(url, channel, "Unsubscribe requested for a channel that is not subscribed");
            }
            Unsubscribed::ChannelRemoved => info!(url, channel, "Unsubscribed"),
            Unsubscribed::EndpointDeleted(id) => {
                let removed = self.versions.delete_all(id)?;
                info!(url, channel, snapshots = removed, "Last subscriber left, endpoint deleted");
            }
        }
        Ok(outcome)
    }

    /// Endpoints a channel subscribes to, or all endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn list(&self, channel: Option<&str>) -> Result<Vec<Endpoint>> {
        let endpoints = match channel {
            Some(channel) => self.registry.list_by_channel(channel)?,
            None => self.registry.list_all()?,
        };
        Ok(endpoints)
    }

    /// Stored snapshots for `url`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::UnknownEndpoint`] if `url` is not monitored.
    pub fn history(&self, url: &str) -> Result<Vec<Snapshot>> {
        let endpoint = self.endpoint(url)?;
        Ok(self.versions.history(endpoint.id)?)
    }

    /// Pauses or resumes scanning of `url` without dropping subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`SpecwatchError::UnknownEndpoint`] if `url` is not monitored.
    pub fn set_enabled(&self, url: &str, enabled: bool) -> Result<()> {
        let endpoint = self.endpoint(url)?;
        self.registry.set_enabled(endpoint.id, enabled)?;
        info!(url, enabled, "Endpoint scanning toggled");
        Ok(())
    }

    /// Runs a single scan batch now.
    pub async fn scan_once(&self) -> BatchOutcome {
        self.scheduler.run_batch().await
    }

    /// Runs the periodic scanner until `shutdown` resolves, then flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        Arc::clone(&self.scheduler).run(shutdown).await;
        self.flush()
    }

    /// Current scan gate state.
    pub fn scan_state(&self) -> ScanState {
        self.scheduler.state()
    }

    /// Flushes the database to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if Sled cannot flush.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn endpoint(&self, url: &str) -> Result<Endpoint> {
        self.registry
            .find_by_url(url)?
            .ok_or_else(|| SpecwatchError::UnknownEndpoint(url.to_string()))
    }
}

impl std::fmt::Debug for Specwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Specwatch")
            .field("db", &self.db)
            .field("endpoints", &self.registry.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Builds the configured notification sink.
///
/// # Errors
///
/// Returns an error if the NDJSON file cannot be opened, the webhook client
/// cannot be built, or the webhook sink has no URL.
pub fn build_sink(config: &NotifyConfig) -> Result<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = match config.sink {
        SinkKind::Log => Arc::new(LogSink::new()),
        SinkKind::Ndjson => match &config.ndjson_path {
            Some(path) => Arc::new(NdjsonSink::append_to(path)?),
            None => Arc::new(NdjsonSink::stdout()),
        },
        SinkKind::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                SpecwatchError::Config("notify.webhook_url is required for the webhook sink".to_string())
            })?;
            Arc::new(WebhookSink::new(url)?)
        }
    };
    Ok(sink)
}
