//! # specwatch Diff
//!
//! Structural comparison of two API specification documents and the summary
//! counts derived from it.
//!
//! ## Purpose
//!
//! The content digest in `specwatch-registry` only says *that* a document
//! changed. This crate says *what* changed and whether it matters:
//!
//! 1. **Compare** - [`compare`] walks paths, operations, parameters, request
//!    bodies, responses, schemas, servers and `info.version`, and files each
//!    change as breaking, non-breaking or unclassified.
//!
//! 2. **Classify** - [`classify`] reduces a [`DiffResult`] to the
//!    breaking/added/removed/deprecated counts used in notifications.
//!
//! ## Supported Formats
//!
//! OpenAPI 3.x and Swagger 2.0 are both understood. The only hard
//! requirement is that each document is a JSON object; a document without
//! an `openapi` or `swagger` marker is compared on whatever sections it has.
//!
//! ## Failure Model
//!
//! [`compare`] fails closed: a malformed document yields `None` and a
//! warning log, never a panic or an error that could abort a scan. Callers
//! that need the reason use [`try_compare`].

pub mod classify;
pub mod engine;
pub mod models;

pub use classify::{classify, ChangeSummary, DEPRECATION_MARKER};
pub use engine::{compare, try_compare};
pub use models::{Action, Bucket, DiffComputationError, DiffEntry, DiffResult, Side};
