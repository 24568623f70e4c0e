//! # Specwatch Core
//!
//! Configuration and service facade for the API specification watcher.
//! Wires the registry, diff engine, notifier and scanner into one
//! [`Specwatch`] value that front-ends drive.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SPECWATCH CORE                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   specwatch.toml ──► SpecwatchConfig ──► Specwatch (facade)     │
//! │                                              │                  │
//! │         ┌────────────────────┬───────────────┼──────────┐       │
//! │         ▼                    ▼               ▼          ▼       │
//! │  ┌─────────────┐     ┌─────────────┐  ┌──────────┐ ┌────────┐   │
//! │  │  Registry   │     │   Scanner   │  │ Fetcher  │ │  Sink  │   │
//! │  │ (sled: eps, │ ◄── │ Idle/Scan   │  │ (HTTP)   │ │ log /  │   │
//! │  │  snapshots) │     │ gate + diff │  │          │ │ ndjson/│   │
//! │  └─────────────┘     └─────────────┘  └──────────┘ │ webhook│   │
//! │                                                    └────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use specwatch_core::{Specwatch, SpecwatchConfig};
//!
//! # async fn demo() -> specwatch_core::Result<()> {
//! let config = SpecwatchConfig::load("specwatch.toml")?;
//! let specwatch = Specwatch::new(config)?;
//!
//! specwatch.subscribe("https://api.example.com/openapi.json", "C-platform")?;
//! specwatch.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle Notes
//!
//! - Removing the last subscriber of an endpoint also deletes its snapshots
//! - `run` flushes the database after the scanner drains
//! - A missing configuration file means defaults, not an error

pub mod config;
pub mod error;
pub mod format;
mod specwatch;

pub use config::{FetchConfig, LoggingConfig, NotifyConfig, SinkKind, SpecwatchConfig, StorageConfig};
pub use error::SpecwatchError;
pub use specwatch::{build_sink, Specwatch};

// Re-export component types for convenience
pub use specwatch_diff::{ChangeSummary, DiffResult};
pub use specwatch_monitor::{
    BatchOutcome, BatchReport, CheckOutcome, DiffFailurePolicy, EndpointReport, ScanState,
    SpecSource,
};
pub use specwatch_notify::NotificationSink;
pub use specwatch_registry::{Database, Endpoint, Snapshot, Unsubscribed};

/// Result type for specwatch core operations.
pub type Result<T> = std::result::Result<T, SpecwatchError>;
