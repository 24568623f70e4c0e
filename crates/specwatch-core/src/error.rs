//! Error types for specwatch core.

use thiserror::Error;

/// Core error type for specwatch operations.
#[derive(Debug, Error)]
pub enum SpecwatchError {
    /// The configuration file could not be read or parsed, or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No monitored endpoint has this URL.
    #[error("Endpoint not monitored: {0}")]
    UnknownEndpoint(String),

    /// Registry error passthrough.
    #[error("Registry error: {0}")]
    Registry(#[from] specwatch_registry::RegistryError),

    /// Fetcher construction error passthrough.
    #[error("Fetch error: {0}")]
    Fetch(#[from] specwatch_monitor::FetchError),

    /// Sink construction error passthrough.
    #[error("Notification error: {0}")]
    Delivery(#[from] specwatch_notify::DeliveryError),
}
