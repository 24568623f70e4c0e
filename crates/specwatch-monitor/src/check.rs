//! # Endpoint Check
//!
//! One pass over one endpoint: fetch, gate on the content digest, compare
//! against the latest snapshot, persist, notify.
//!
//! ## Flow
//!
//! ```text
//! fetch ──✗──► FetchFailed (nothing stored, nothing sent)
//!   │
//! digest == last? ──► Unchanged
//!   │
//! first fetch? ──yes──► store ──► Baseline ──► notify all channels
//!   │ no
//! latest snapshot? ──none──► store ──► Rebaselined (silent)
//!   │
//! compare ──► store ──► Changed ──► notify (policy permitting)
//! ```
//!
//! "Store" is always snapshot, then digest, then retention. Any registry
//! error there ends the check as `PersistFailed` before anything is sent.
//!
//! Channels are notified one after another. A channel whose post fails is
//! recorded and skipped; the remaining channels are still notified. The
//! overflow attachment is uploaded only after a successful post, never for a
//! baseline.

use crate::error::Result;
use crate::fetcher::SpecSource;
use crate::report::{CheckOutcome, DeliveryReport, EndpointReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specwatch_diff::{classify, compare, DiffResult};
use specwatch_notify::{render, Attachment, NotificationPayload, NotificationSink, RenderInput};
use specwatch_registry::{
    digest::digest, ContentDigest, Endpoint, EndpointRegistry, RegistryError, VersionStore,
    DEFAULT_RETENTION_LIMIT,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Period between scan batches.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// What to do when a changed document cannot be diffed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffFailurePolicy {
    /// Send a "diff unavailable" notification.
    #[default]
    Notify,
    /// Store the snapshot silently.
    Skip,
}

/// Configuration for the scan pipeline.
///
/// # Example
///
/// ```rust
/// use specwatch_monitor::{DiffFailurePolicy, ScanConfig};
/// use std::time::Duration;
///
/// let config = ScanConfig::new()
///     .with_interval(Duration::from_secs(300))
///     .with_retention_limit(20)
///     .with_diff_failure_policy(DiffFailurePolicy::Skip);
/// assert_eq!(config.retention_limit, 20);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Period between batches.
    pub interval: Duration,
    /// Snapshots kept per endpoint.
    pub retention_limit: usize,
    /// Behaviour on diff failure.
    pub on_diff_failure: DiffFailurePolicy,
}

impl ScanConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Interval: 60 seconds
    /// - Retention: 50 snapshots
    /// - Diff failure: notify
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval: SCAN_INTERVAL,
            retention_limit: DEFAULT_RETENTION_LIMIT,
            on_diff_failure: DiffFailurePolicy::Notify,
        }
    }

    /// Sets the batch interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the retention limit.
    #[must_use]
    pub const fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = limit;
        self
    }

    /// Sets the diff failure policy.
    #[must_use]
    pub const fn with_diff_failure_policy(mut self, policy: DiffFailurePolicy) -> Self {
        self.on_diff_failure = policy;
        self
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the comparison step produced.
enum Comparison {
    /// First fetch: nothing to compare with.
    Baseline,
    /// A digest was known but the history is empty.
    Rebaseline,
    /// Compared; `None` when the diff could not be computed.
    Attempted(Option<DiffResult>),
}

/// Runs the per-endpoint check against injected collaborators.
pub struct EndpointChecker {
    source: Arc<dyn SpecSource>,
    sink: Arc<dyn NotificationSink>,
    registry: EndpointRegistry,
    versions: VersionStore,
    config: ScanConfig,
}

impl EndpointChecker {
    /// Creates a checker.
    pub fn new(
        source: Arc<dyn SpecSource>,
        sink: Arc<dyn NotificationSink>,
        registry: EndpointRegistry,
        versions: VersionStore,
        config: ScanConfig,
    ) -> Self {
        Self {
            source,
            sink,
            registry,
            versions,
            config,
        }
    }

    /// The endpoint registry this checker updates.
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Checks one endpoint. Never fails: every error becomes an outcome.
    pub async fn check(&self, endpoint: &Endpoint) -> EndpointReport {
        let url = endpoint.url.as_str();

        let document = match self.source.fetch(url).await {
            Ok(document) => document,
            Err(err) => {
                error!(url, error = %err, "Failed to fetch specification, skipping notification");
                return EndpointReport::new(
                    endpoint.id,
                    url,
                    CheckOutcome::FetchFailed {
                        error: err.to_string(),
                    },
                );
            }
        };

        let current = digest(&document);
        if endpoint.last_digest.as_ref() == Some(&current) {
            debug!(url, digest = current.short(), "Specification unchanged");
            return EndpointReport::new(endpoint.id, url, CheckOutcome::Unchanged);
        }

        let comparison = match self.compare_with_latest(endpoint, &document) {
            Ok(comparison) => comparison,
            Err(err) => return persist_failed(endpoint, err),
        };

        if let Err(err) = self.persist(endpoint, current.clone(), document) {
            return persist_failed(endpoint, err);
        }

        let (outcome, input) = match &comparison {
            Comparison::Baseline => {
                info!(url, digest = current.short(), "First fetch, baseline established");
                (CheckOutcome::Baseline, Some(RenderInput::Baseline))
            }
            Comparison::Rebaseline => {
                warn!(url, "No stored snapshot to compare against, re-baselined silently");
                (CheckOutcome::Rebaselined, None)
            }
            Comparison::Attempted(Some(diff)) => {
                let summary = classify(diff);
                info!(
                    url,
                    breaking = summary.breaking,
                    added = summary.added,
                    removed = summary.removed,
                    deprecated = summary.deprecated,
                    "Specification changed"
                );
                let outcome = CheckOutcome::Changed {
                    diff_available: true,
                    summary: Some(summary),
                    notified: true,
                };
                (outcome, Some(RenderInput::Diff(diff)))
            }
            Comparison::Attempted(None) => {
                let notify = self.config.on_diff_failure == DiffFailurePolicy::Notify;
                info!(url, notify, "Specification changed, diff unavailable");
                let outcome = CheckOutcome::Changed {
                    diff_available: false,
                    summary: None,
                    notified: notify,
                };
                (outcome, notify.then_some(RenderInput::DiffUnavailable))
            }
        };

        let mut report = EndpointReport::new(endpoint.id, url, outcome);
        if let Some(input) = input {
            let payload = render(input, url);
            let is_first_fetch = matches!(comparison, Comparison::Baseline);
            report.deliveries = self.dispatch(&endpoint.channels, &payload, is_first_fetch).await;
        }
        report
    }

    fn compare_with_latest(&self, endpoint: &Endpoint, document: &Value) -> Result<Comparison> {
        if endpoint.is_first_fetch() {
            return Ok(Comparison::Baseline);
        }
        let comparison = match self.versions.latest(endpoint.id)? {
            Some(previous) => Comparison::Attempted(compare(&previous.document, document)),
            None => Comparison::Rebaseline,
        };
        Ok(comparison)
    }

    /// Snapshot, then digest, then retention.
    ///
    /// If the endpoint was deleted while this check was in flight, the
    /// snapshot just written is dropped again so no history outlives it.
    fn persist(&self, endpoint: &Endpoint, current: ContentDigest, document: Value) -> Result<()> {
        self.versions.store(endpoint.id, current.clone(), document)?;
        if let Err(err) = self.registry.update_digest(endpoint.id, &current) {
            if matches!(err, RegistryError::NotFound(_)) {
                let purged = self.versions.delete_all(endpoint.id)?;
                warn!(url = %endpoint.url, purged, "Endpoint deleted during check, discarding its snapshots");
            }
            return Err(err.into());
        }
        let removed = self
            .versions
            .enforce_retention(endpoint.id, self.config.retention_limit)?;
        if removed > 0 {
            debug!(url = %endpoint.url, removed, "Pruned old snapshots");
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        channels: &[String],
        payload: &NotificationPayload,
        is_first_fetch: bool,
    ) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(channels.len());
        for channel in channels {
            reports.push(self.deliver(channel, payload, is_first_fetch).await);
        }
        reports
    }

    async fn deliver(
        &self,
        channel: &str,
        payload: &NotificationPayload,
        is_first_fetch: bool,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::new(channel);

        let message = match self.sink.post(channel, payload).await {
            Ok(message) => message,
            Err(err) => {
                error!(
                    channel,
                    url = %payload.url,
                    sink = self.sink.name(),
                    error = %err,
                    "Failed to post notification"
                );
                report.error = Some(err.to_string());
                return report;
            }
        };
        report.posted = true;

        if is_first_fetch {
            return report;
        }
        let Some(attachment) = Attachment::from_payload(payload, Utc::now()) else {
            return report;
        };

        match self.sink.upload_attachment(channel, &attachment, &message).await {
            Ok(()) => report.attachment_uploaded = true,
            Err(err) => {
                error!(
                    channel,
                    url = %payload.url,
                    sink = self.sink.name(),
                    error = %err,
                    "Failed to upload full diff"
                );
                report.error = Some(err.to_string());
            }
        }
        report
    }
}

impl std::fmt::Debug for EndpointChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointChecker")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn persist_failed(endpoint: &Endpoint, err: crate::error::MonitorError) -> EndpointReport {
    error!(url = %endpoint.url, error = %err, "Failed to record specification, skipping notification");
    EndpointReport::new(
        endpoint.id,
        &endpoint.url,
        CheckOutcome::PersistFailed {
            error: err.to_string(),
        },
    )
}
