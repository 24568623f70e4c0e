//! Scan reports.
//!
//! Every batch produces a [`BatchReport`] with one [`EndpointReport`] per
//! checked endpoint, so callers (the CLI `scan` command, tests) can see what
//! happened without scraping logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use specwatch_diff::ChangeSummary;
use specwatch_registry::EndpointId;

/// What a single endpoint check concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Digest matched the last one seen; nothing stored or sent.
    Unchanged,

    /// First successful fetch; baseline stored and announced.
    Baseline,

    /// Content changed and a new snapshot was stored.
    Changed {
        /// False when the diff could not be computed.
        diff_available: bool,
        /// Counts, when the diff was available.
        summary: Option<ChangeSummary>,
        /// False when the diff-failure policy suppressed the notification.
        notified: bool,
    },

    /// Digest known but no snapshot to compare with; stored silently.
    Rebaselined,

    /// The document could not be fetched.
    FetchFailed {
        /// Rendered error.
        error: String,
    },

    /// The document was fetched but history could not be read or written.
    PersistFailed {
        /// Rendered error.
        error: String,
    },

    /// The check task panicked.
    Panicked {
        /// Rendered join error.
        error: String,
    },
}

impl CheckOutcome {
    /// True for the three failure outcomes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CheckOutcome::FetchFailed { .. }
                | CheckOutcome::PersistFailed { .. }
                | CheckOutcome::Panicked { .. }
        )
    }
}

/// Delivery result for one subscriber channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Target channel.
    pub channel: String,
    /// The message was posted.
    pub posted: bool,
    /// The overflow attachment was uploaded.
    pub attachment_uploaded: bool,
    /// First delivery error, if any.
    pub error: Option<String>,
}

impl DeliveryReport {
    pub(crate) fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            posted: false,
            attachment_uploaded: false,
            error: None,
        }
    }
}

/// Result of checking one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointReport {
    /// Endpoint id.
    pub endpoint_id: EndpointId,
    /// Endpoint URL.
    pub url: String,
    /// What the check concluded.
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    /// One entry per notified channel, empty when nothing was sent.
    pub deliveries: Vec<DeliveryReport>,
}

impl EndpointReport {
    pub(crate) fn new(endpoint_id: EndpointId, url: &str, outcome: CheckOutcome) -> Self {
        Self {
            endpoint_id,
            url: url.to_string(),
            outcome,
            deliveries: Vec::new(),
        }
    }
}

/// Result of one scan batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// When the batch acquired the scan gate.
    pub started_at: DateTime<Utc>,
    /// When the last check settled.
    pub finished_at: DateTime<Utc>,
    /// Set when the enabled endpoints could not be listed.
    pub listing_error: Option<String>,
    /// One report per enabled endpoint.
    pub endpoints: Vec<EndpointReport>,
}

impl BatchReport {
    /// Number of endpoints checked.
    pub fn checked(&self) -> usize {
        self.endpoints.len()
    }

    /// Number of endpoints whose stored content changed (baselines included).
    pub fn changed(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    CheckOutcome::Baseline | CheckOutcome::Changed { .. } | CheckOutcome::Rebaselined
                )
            })
            .count()
    }

    /// Number of endpoints whose check failed.
    pub fn failed(&self) -> usize {
        self.endpoints.iter().filter(|r| r.outcome.is_failure()).count()
    }

    /// Number of messages posted across all channels.
    pub fn notifications_sent(&self) -> usize {
        self.endpoints
            .iter()
            .flat_map(|r| r.deliveries.iter())
            .filter(|d| d.posted)
            .count()
    }

    /// Looks up the report for a URL.
    pub fn for_url(&self, url: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|r| r.url == url)
    }
}

/// What happened when a batch was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch ran to completion.
    Completed(BatchReport),
    /// Another batch was in flight; nothing was done.
    Skipped,
}

impl BatchOutcome {
    /// The report, when the batch ran.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Completed(report) => Some(report),
            BatchOutcome::Skipped => None,
        }
    }
}
