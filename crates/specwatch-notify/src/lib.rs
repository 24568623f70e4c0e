//! # specwatch Notify
//!
//! Rendering and delivery of change notifications.
//!
//! ## Purpose
//!
//! 1. **Render** - [`render`] builds a [`NotificationPayload`] from a scan
//!    outcome: baseline, diff unavailable, or a classified diff. Diffs that
//!    do not fit under [`INLINE_DIFF_LIMIT`] characters overflow into an
//!    [`Attachment`].
//!
//! 2. **Deliver** - the [`NotificationSink`] trait abstracts the chat
//!    platform. [`LogSink`], [`NdjsonSink`] and [`WebhookSink`] ship with
//!    the crate.
//!
//! ## Architecture
//!
//! ```text
//! scan outcome ──► render() ──► NotificationPayload ──► sink.post(channel)
//!                                     │                        │
//!                                     └── overflow ──► sink.upload_attachment(thread)
//! ```

pub mod render;
pub mod sink;
pub mod sinks;

pub use render::{
    attachment_filename, attachment_title, render, summary_line, Attachment, Block,
    NotificationPayload, PayloadKind, RenderInput, HEADLINE, INLINE_DIFF_LIMIT,
};
pub use sink::{DeliveryError, MessageRef, NotificationSink};
pub use sinks::{LogSink, NdjsonSink, WebhookSink};
