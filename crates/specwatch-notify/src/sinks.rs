//! # Built-in Sinks
//!
//! - [`LogSink`]: human-readable delivery through `tracing`, the default.
//! - [`NdjsonSink`]: one JSON object per event, appended to a file or any
//!   writer.
//! - [`WebhookSink`]: HTTP POST of each event to a fixed URL.

use crate::render::{Attachment, NotificationPayload};
use crate::sink::{DeliveryError, MessageRef, NotificationSink};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Request timeout of the webhook client.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Log sink
// ============================================================================

/// Writes notifications to the log at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    /// Creates a log sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn post(
        &self,
        channel: &str,
        payload: &NotificationPayload,
    ) -> Result<MessageRef, DeliveryError> {
        let message = MessageRef::generate();
        info!(
            channel,
            url = %payload.url,
            kind = ?payload.kind,
            message = %message,
            "{}",
            payload.text()
        );
        Ok(message)
    }

    async fn upload_attachment(
        &self,
        channel: &str,
        attachment: &Attachment,
        thread: &MessageRef,
    ) -> Result<(), DeliveryError> {
        info!(
            channel,
            thread = %thread,
            filename = %attachment.filename,
            bytes = attachment.content.len(),
            "{}",
            attachment.title
        );
        Ok(())
    }
}

// ============================================================================
// NDJSON sink
// ============================================================================

/// Appends one JSON object per message or attachment.
///
/// ```text
/// {"type":"message","channel":"C1","message_id":"...","timestamp":"...","payload":{...}}
/// {"type":"attachment","channel":"C1","thread":"...","timestamp":"...","filename":"...","title":"...","content":"..."}
/// ```
pub struct NdjsonSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl NdjsonSink {
    /// Wraps an arbitrary writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Io`] if the file cannot be opened.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, DeliveryError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Holds the lock only for the synchronous write; nothing is awaited.
    fn write_event(&self, event: &Value) -> Result<(), DeliveryError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for NdjsonSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationSink for NdjsonSink {
    fn name(&self) -> &str {
        "ndjson"
    }

    async fn post(
        &self,
        channel: &str,
        payload: &NotificationPayload,
    ) -> Result<MessageRef, DeliveryError> {
        let message = MessageRef::generate();
        let event = json!({
            "type": "message",
            "channel": channel,
            "message_id": message,
            "timestamp": Utc::now().to_rfc3339(),
            "payload": payload,
        });
        self.write_event(&event)?;
        Ok(message)
    }

    async fn upload_attachment(
        &self,
        channel: &str,
        attachment: &Attachment,
        thread: &MessageRef,
    ) -> Result<(), DeliveryError> {
        let event = json!({
            "type": "attachment",
            "channel": channel,
            "thread": thread,
            "timestamp": Utc::now().to_rfc3339(),
            "filename": attachment.filename,
            "title": attachment.title,
            "content": attachment.content,
        });
        self.write_event(&event)
    }
}

// ============================================================================
// Webhook sink
// ============================================================================

/// POSTs each event as JSON to a fixed URL.
///
/// A JSON response body with a string `id` (or `ts`) field becomes the
/// [`MessageRef`] used to thread attachments; otherwise one is generated.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Creates a webhook sink for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Http`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_json(&self, channel: &str, body: &Value) -> Result<reqwest::Response, DeliveryError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(channel, status = status.as_u16(), "Webhook rejected delivery");
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn post(
        &self,
        channel: &str,
        payload: &NotificationPayload,
    ) -> Result<MessageRef, DeliveryError> {
        let body = json!({
            "type": "message",
            "channel": channel,
            "payload": payload,
        });
        let response = self.post_json(channel, &body).await?;

        let reply: Option<Value> = response.json().await.ok();
        let id = reply
            .as_ref()
            .and_then(|reply| reply.get("id").or_else(|| reply.get("ts")))
            .and_then(Value::as_str);

        Ok(id.map(MessageRef::new).unwrap_or_else(MessageRef::generate))
    }

    async fn upload_attachment(
        &self,
        channel: &str,
        attachment: &Attachment,
        thread: &MessageRef,
    ) -> Result<(), DeliveryError> {
        let body = json!({
            "type": "attachment",
            "channel": channel,
            "thread": thread,
            "attachment": attachment,
        });
        self.post_json(channel, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, RenderInput};
    use std::sync::{Arc, Mutex as StdMutex};

    const URL: &str = "https://api.example.com/openapi.json";

    struct SharedWriter(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn lines(buffer: &Arc<StdMutex<Vec<u8>>>) -> Vec<Value> {
        let text = String::from_utf8_lossy(&buffer.lock().unwrap()).into_owned();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_ndjson_sink_writes_message_and_attachment() {
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let sink = NdjsonSink::new(Box::new(SharedWriter(buffer.clone())));

        let payload = render(RenderInput::Baseline, URL);
        let message = sink.post("C1", &payload).await.unwrap();

        let attachment = Attachment {
            filename: "diff.json".to_string(),
            title: "Full diff".to_string(),
            content: "{}".to_string(),
        };
        sink.upload_attachment("C1", &attachment, &message).await.unwrap();

        let events = lines(&buffer);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "message");
        assert_eq!(events[0]["channel"], "C1");
        assert_eq!(events[0]["payload"]["kind"], "baseline");
        assert_eq!(events[0]["message_id"], message.as_str());
        assert_eq!(events[1]["type"], "attachment");
        assert_eq!(events[1]["thread"], message.as_str());
        assert_eq!(events[1]["filename"], "diff.json");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ndjson_sink_concurrent_posts_keep_lines_whole() {
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(NdjsonSink::new(Box::new(SharedWriter(buffer.clone()))));

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    let payload = render(RenderInput::Baseline, URL);
                    sink.post(&format!("C{n}"), &payload).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let events = lines(&buffer);
        assert_eq!(events.len(), 16);
        assert!(events.iter().all(|e| e["type"] == "message"));
    }

    #[test]
    fn test_ndjson_sink_survives_poisoned_lock() {
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(NdjsonSink::new(Box::new(SharedWriter(buffer.clone()))));

        let poisoner = Arc::clone(&sink);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.writer.lock().unwrap();
            panic!("writer poisoned");
        })
        .join();

        sink.write_event(&json!({ "type": "message" })).unwrap();
        assert_eq!(lines(&buffer).len(), 1);
    }

    #[tokio::test]
    async fn test_ndjson_sink_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.ndjson");

        for _ in 0..2 {
            let sink = NdjsonSink::append_to(&path).unwrap();
            sink.post("C1", &render(RenderInput::Baseline, URL)).await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        let sink = LogSink::new();
        let payload = render(RenderInput::DiffUnavailable, URL);
        let message = sink.post("C1", &payload).await.unwrap();
        let attachment = Attachment {
            filename: "f.json".to_string(),
            title: "t".to_string(),
            content: String::new(),
        };
        sink.upload_attachment("C1", &attachment, &message).await.unwrap();
        assert_eq!(sink.name(), "log");
    }
}
