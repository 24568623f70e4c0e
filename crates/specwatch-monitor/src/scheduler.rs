//! # Scan Scheduler
//!
//! Drives [`EndpointChecker`] over every enabled endpoint on a fixed
//! interval, with at most one batch in flight.
//!
//! ## States
//!
//! ```text
//!          run_batch()             batch settles
//!   Idle ─────────────► Scanning ─────────────────► Idle
//!                         │  ▲
//!            tick/run_batch() → Skipped (logged, no-op)
//! ```
//!
//! The state lives in an `AtomicBool` owned by the scheduler. It is released
//! by a guard, so an early return or a panic inside the batch still brings
//! the scheduler back to `Idle`.
//!
//! Within a batch every endpoint check runs as its own task; the batch waits
//! for all of them. A check that panics is reported as
//! [`CheckOutcome::Panicked`] and never affects its siblings.

use crate::check::EndpointChecker;
use crate::report::{BatchOutcome, BatchReport, CheckOutcome, EndpointReport};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Whether a batch is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No batch running.
    Idle,
    /// A batch is running; new requests are skipped.
    Scanning,
}

/// Holds the scan gate for the lifetime of a batch.
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Periodic, non-reentrant scanner.
///
/// # Example
///
/// ```rust,no_run
/// use specwatch_monitor::ScanScheduler;
/// use std::sync::Arc;
///
/// # async fn demo(scheduler: ScanScheduler) {
/// let scheduler = Arc::new(scheduler);
/// scheduler
///     .run(async {
///         let _ = tokio::signal::ctrl_c().await;
///     })
///     .await;
/// # }
/// ```
pub struct ScanScheduler {
    checker: Arc<EndpointChecker>,
    scanning: AtomicBool,
}

impl ScanScheduler {
    /// Creates an idle scheduler.
    pub fn new(checker: EndpointChecker) -> Self {
        Self {
            checker: Arc::new(checker),
            scanning: AtomicBool::new(false),
        }
    }

    /// Current state of the scan gate.
    pub fn state(&self) -> ScanState {
        if self.scanning.load(Ordering::Acquire) {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    /// The checker driven by this scheduler.
    pub fn checker(&self) -> &EndpointChecker {
        &self.checker
    }

    /// Runs one batch over all enabled endpoints.
    ///
    /// Returns [`BatchOutcome::Skipped`] without doing anything when another
    /// batch is already in flight.
    pub async fn run_batch(&self) -> BatchOutcome {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            info!("Previous scan still in progress, skipping");
            return BatchOutcome::Skipped;
        };

        let started_at = Utc::now();
        let endpoints = match self.checker.registry().list_enabled() {
            Ok(endpoints) => endpoints,
            Err(err) => {
                error!(error = %err, "Failed to list enabled endpoints");
                return BatchOutcome::Completed(BatchReport {
                    started_at,
                    finished_at: Utc::now(),
                    listing_error: Some(err.to_string()),
                    endpoints: Vec::new(),
                });
            }
        };

        info!(endpoints = endpoints.len(), "Starting scan");

        let tasks: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                let checker = Arc::clone(&self.checker);
                let id = endpoint.id;
                let url = endpoint.url.clone();
                let handle = tokio::spawn(async move { checker.check(&endpoint).await });
                (id, url, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (id, url, handle) in tasks {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(url = %url, error = %err, "Endpoint check aborted");
                    reports.push(EndpointReport::new(
                        id,
                        &url,
                        CheckOutcome::Panicked {
                            error: err.to_string(),
                        },
                    ));
                }
            }
        }

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            listing_error: None,
            endpoints: reports,
        };
        info!(
            checked = report.checked(),
            changed = report.changed(),
            failed = report.failed(),
            notifications = report.notifications_sent(),
            "Scan complete"
        );
        BatchOutcome::Completed(report)
    }

    /// Runs batches on the configured interval until `shutdown` resolves.
    ///
    /// The first batch starts immediately. Missed ticks are skipped. Each
    /// tick spawns its batch, so a slow batch makes later ticks hit the scan
    /// gate instead of queueing. On shutdown, batches already in flight are
    /// awaited before returning.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = self.checker.config().interval;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "Scheduler started");

        let mut in_flight: Vec<JoinHandle<BatchOutcome>> = Vec::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    in_flight.retain(|handle| !handle.is_finished());
                    let scheduler = Arc::clone(&self);
                    in_flight.push(tokio::spawn(async move { scheduler.run_batch().await }));
                }
            }
        }

        for handle in in_flight {
            if let Err(err) = handle.await {
                warn!(error = %err, "Scan batch ended abnormally during shutdown");
            }
        }
        info!("Scheduler stopped");
    }
}

impl std::fmt::Debug for ScanScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanScheduler")
            .field("state", &self.state())
            .field("checker", &self.checker)
            .finish()
    }
}
