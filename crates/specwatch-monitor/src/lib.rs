//! # specwatch Monitor
//!
//! The periodic scan: fetch every enabled specification, detect change by
//! content digest, diff against the previous snapshot, persist, and notify
//! subscribers.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`SpecFetcher`] | HTTP retrieval behind the [`SpecSource`] trait |
//! | [`EndpointChecker`] | One endpoint: fetch → digest → compare → store → notify |
//! | [`ScanScheduler`] | Interval loop with an `Idle`/`Scanning` gate |
//! | [`BatchReport`] | What a batch did, per endpoint and per channel |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ScanScheduler                     │
//! │   interval tick ──► gate ──► spawn check per endpoint│
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │               EndpointChecker                  │  │
//! │  │ SpecSource │ digest │ compare │ VersionStore   │  │
//! │  │            │        │         │ NotificationSink│ │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! Errors never cross the endpoint boundary. A fetch failure, a persistence
//! failure, a delivery failure on one channel, or a panicking check is
//! logged and recorded; every other endpoint and channel proceeds.

mod check;
mod error;
mod fetcher;
mod report;
mod scheduler;

pub use check::{DiffFailurePolicy, EndpointChecker, ScanConfig, SCAN_INTERVAL};
pub use error::{FetchError, MonitorError, Result};
pub use fetcher::{FetcherConfig, SpecFetcher, SpecSource, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
pub use report::{BatchOutcome, BatchReport, CheckOutcome, DeliveryReport, EndpointReport};
pub use scheduler::{ScanScheduler, ScanState};
