//! Error types for the scan pipeline.
//!
//! None of these escape a scan batch: every error is caught at the
//! per-endpoint boundary, logged with the endpoint URL, and recorded in the
//! batch report.

use specwatch_registry::RegistryError;
use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Why a specification document could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason phrase.
        message: String,
    },

    /// The response is not a JSON media type.
    #[error("unsupported content type '{content_type}'")]
    UnsupportedContent {
        /// The `Content-Type` header as received, empty when absent.
        content_type: String,
    },

    /// The body is not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    /// The body is valid JSON but not an object.
    #[error("response body is JSON but not an object")]
    NotAnObject,

    /// Connection, TLS, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors that abort a single endpoint check.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Fetching the document failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Reading or writing history failed.
    #[error("persistence failed: {0}")]
    Registry(#[from] RegistryError),
}
