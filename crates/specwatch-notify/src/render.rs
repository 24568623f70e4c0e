//! # Notification Rendering
//!
//! Turns the outcome of a scan into the payload subscribers receive. Pure:
//! no I/O, no clock reads except through [`attachment_filename`]'s argument.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ API Changes Detected                (header) │
//! │ Endpoint: https://api.example.com/spec.json  │
//! │ breaking: 1 • removed: 1          (summary)  │
//! │ ```json { ...diff... } ```   or  see thread  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Size Contract
//!
//! The pretty-printed diff is embedded only when it is shorter than
//! [`INLINE_DIFF_LIMIT`] characters. Otherwise the payload carries a notice
//! and the full text in [`NotificationPayload::overflow`], which the
//! dispatcher uploads as a threaded [`Attachment`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specwatch_diff::{classify, ChangeSummary, DiffResult};

/// Inline diffs must be strictly shorter than this many characters.
pub const INLINE_DIFF_LIMIT: usize = 2900;

/// Header of every notification.
pub const HEADLINE: &str = "API Changes Detected";

const BASELINE_TEXT: &str = "First time monitoring this endpoint - baseline established";
const UNAVAILABLE_TEXT: &str = "Specification changed - detailed diff unavailable";
const NO_CHANGES_TEXT: &str = "No significant changes detected";
const OVERFLOW_TEXT: &str = "Diff is too large to display inline. Check the thread for full details.";

/// What a notification is about.
#[derive(Debug, Clone, Copy)]
pub enum RenderInput<'a> {
    /// First successful fetch of an endpoint.
    Baseline,
    /// The document changed but the diff could not be computed.
    DiffUnavailable,
    /// The document changed and was compared.
    Diff(&'a DiffResult),
}

/// Payload classification, mostly for sinks and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Baseline established.
    Baseline,
    /// Changed, no structured diff.
    DiffUnavailable,
    /// Compared, nothing counted.
    NoSignificantChanges,
    /// Compared, with counted changes.
    Changes,
}

/// One rendered section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Block {
    /// Plain-text title.
    Header(String),
    /// Markdown-ish body text.
    Section(String),
}

impl Block {
    /// The text of the block regardless of its kind.
    pub fn text(&self) -> &str {
        match self {
            Block::Header(text) | Block::Section(text) => text,
        }
    }
}

/// A rendered notification, ready for any [`crate::NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// What the notification is about.
    pub kind: PayloadKind,

    /// Monitored endpoint URL.
    pub url: String,

    /// Change counts, present only for [`PayloadKind::Changes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ChangeSummary>,

    /// Ordered sections.
    pub blocks: Vec<Block>,

    /// Full pretty-printed diff when it did not fit inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow: Option<String>,
}

impl NotificationPayload {
    /// True when the diff was too large to embed.
    pub fn overflowed(&self) -> bool {
        self.overflow.is_some()
    }

    /// All blocks joined by blank lines, for plain-text sinks.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A file uploaded in the thread of a posted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name, see [`attachment_filename`].
    pub filename: String,
    /// Display title, see [`attachment_title`].
    pub title: String,
    /// Full pretty-printed diff.
    pub content: String,
}

impl Attachment {
    /// Builds the attachment for an overflowed payload.
    ///
    /// Returns `None` when the payload fit inline.
    pub fn from_payload(payload: &NotificationPayload, at: DateTime<Utc>) -> Option<Self> {
        payload.overflow.as_ref().map(|content| Self {
            filename: attachment_filename(&payload.url, at),
            title: attachment_title(&payload.url),
            content: content.clone(),
        })
    }
}

/// Renders the notification for `url`.
///
/// # Example
///
/// ```rust
/// use specwatch_notify::{render, PayloadKind, RenderInput};
///
/// let payload = render(RenderInput::Baseline, "https://api.example.com/openapi.json");
/// assert_eq!(payload.kind, PayloadKind::Baseline);
/// assert!(payload.text().contains("baseline established"));
/// assert!(!payload.overflowed());
/// ```
pub fn render(input: RenderInput<'_>, url: &str) -> NotificationPayload {
    let mut blocks = vec![
        Block::Header(HEADLINE.to_string()),
        Block::Section(format!("Endpoint: {url}")),
    ];

    let diff = match input {
        RenderInput::Baseline => {
            blocks.push(Block::Section(BASELINE_TEXT.to_string()));
            return payload(PayloadKind::Baseline, url, None, blocks, None);
        }
        RenderInput::DiffUnavailable => {
            blocks.push(Block::Section(UNAVAILABLE_TEXT.to_string()));
            return payload(PayloadKind::DiffUnavailable, url, None, blocks, None);
        }
        RenderInput::Diff(diff) => diff,
    };

    let summary = classify(diff);
    if summary.is_empty() {
        blocks.push(Block::Section(NO_CHANGES_TEXT.to_string()));
        return payload(PayloadKind::NoSignificantChanges, url, None, blocks, None);
    }

    blocks.push(Block::Section(summary_line(&summary)));

    let diff_json = diff.to_pretty_json();
    let overflow = if diff_json.chars().count() < INLINE_DIFF_LIMIT {
        blocks.push(Block::Section(format!("```json\n{diff_json}\n```")));
        None
    } else {
        blocks.push(Block::Section(OVERFLOW_TEXT.to_string()));
        Some(diff_json)
    };

    payload(PayloadKind::Changes, url, Some(summary), blocks, overflow)
}

fn payload(
    kind: PayloadKind,
    url: &str,
    summary: Option<ChangeSummary>,
    blocks: Vec<Block>,
    overflow: Option<String>,
) -> NotificationPayload {
    NotificationPayload {
        kind,
        url: url.to_string(),
        summary,
        blocks,
        overflow,
    }
}

/// Non-zero counters in the order breaking, added, removed, deprecated.
pub fn summary_line(summary: &ChangeSummary) -> String {
    [
        ("breaking", summary.breaking),
        ("added", summary.added),
        ("removed", summary.removed),
        ("deprecated", summary.deprecated),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(label, count)| format!("{label}: {count}"))
    .collect::<Vec<_>>()
    .join(" • ")
}

/// `diff-<url with every non-alphanumeric as '-'>-<unix millis>.json`
pub fn attachment_filename(url: &str, at: DateTime<Utc>) -> String {
    let slug: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("diff-{slug}-{}.json", at.timestamp_millis())
}

/// `Full diff for <url>`
pub fn attachment_title(url: &str) -> String {
    format!("Full diff for {url}")
}
