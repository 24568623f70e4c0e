//! # Notification Sink Contract
//!
//! A sink delivers rendered payloads to subscriber channels. The dispatcher
//! in `specwatch-monitor` calls [`NotificationSink::post`] once per channel
//! and, for an overflowed diff, [`NotificationSink::upload_attachment`]
//! threaded under the posted message.
//!
//! Sinks must be shareable across scan tasks (`Send + Sync`). A failed
//! delivery is returned, never panicked; the dispatcher logs it and moves on
//! to the next channel.

use crate::render::{Attachment, NotificationPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Handle to a posted message, used to thread attachments under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(String);

impl MessageRef {
    /// Wraps a sink-specific message identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier, for sinks without server-side ids.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from delivering to a single channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Writing to a local destination failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The event could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote end answered with a non-success status.
    #[error("Channel '{channel}' rejected delivery with status {status}")]
    Rejected {
        /// Target channel.
        channel: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Destination for rendered notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Posts `payload` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the message could not be delivered.
    async fn post(
        &self,
        channel: &str,
        payload: &NotificationPayload,
    ) -> Result<MessageRef, DeliveryError>;

    /// Uploads `attachment` to `channel`, threaded under `thread`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the upload could not be delivered.
    async fn upload_attachment(
        &self,
        channel: &str,
        attachment: &Attachment,
        thread: &MessageRef,
    ) -> Result<(), DeliveryError>;
}
