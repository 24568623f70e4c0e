//! # Diff Data Models
//!
//! A [`DiffResult`] partitions the changes between two specification
//! documents into three buckets:
//!
//! | Bucket | Meaning |
//! |--------|---------|
//! | breaking | existing consumers may fail against the new document |
//! | non-breaking | additive or cosmetic for existing consumers |
//! | unclassified | changed, but compatibility cannot be judged |
//!
//! Results are ephemeral: they are computed, rendered and dropped, never
//! persisted. The serialized shape (camelCase) is what subscribers see in the
//! inline diff block and in the attachment.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The entity exists only in the current document.
    Add,
    /// The entity exists only in the previous document.
    Remove,
    /// The entity exists in both but an attribute changed.
    Modify,
}

/// A single classified difference.
///
/// # Example
///
/// ```rust
/// use specwatch_diff::{Action, DiffEntry};
///
/// let entry = DiffEntry::new(Action::Remove, "path.remove", "path", "/pets");
/// assert_eq!(entry.code, "path.remove");
/// assert!(entry.detail.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    /// Kind of change.
    pub action: Action,

    /// Stable machine code, e.g. `path.remove` or `method.deprecated`.
    pub code: String,

    /// Entity family: `path`, `method`, `parameter`, `schema`, ...
    pub entity: String,

    /// Where in the document, e.g. `GET /pets [query:limit]`.
    pub location: String,

    /// Optional human-readable detail such as `'1.0' -> '1.1'`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DiffEntry {
    /// Creates an entry without detail.
    pub fn new(
        action: Action,
        code: impl Into<String>,
        entity: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            action,
            code: code.into(),
            entity: entity.into(),
            location: location.into(),
            detail: None,
        }
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The bucket a difference is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Incompatible with existing consumers.
    Breaking,
    /// Compatible with existing consumers.
    NonBreaking,
    /// Compatibility unknown.
    Unclassified,
}

/// Structured comparison of two specification documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// True when `breaking_differences` is non-empty.
    pub breaking_differences_found: bool,

    /// Changes that break existing consumers.
    pub breaking_differences: Vec<DiffEntry>,

    /// Changes safe for existing consumers.
    pub non_breaking_differences: Vec<DiffEntry>,

    /// Changes whose compatibility is unknown.
    pub unclassified_differences: Vec<DiffEntry>,
}

impl DiffResult {
    /// Files an entry under `bucket`.
    pub fn push(&mut self, bucket: Bucket, entry: DiffEntry) {
        match bucket {
            Bucket::Breaking => {
                self.breaking_differences.push(entry);
                self.breaking_differences_found = true;
            }
            Bucket::NonBreaking => self.non_breaking_differences.push(entry),
            Bucket::Unclassified => self.unclassified_differences.push(entry),
        }
    }

    /// Iterates every entry across the three buckets, breaking first.
    pub fn entries(&self) -> impl Iterator<Item = &DiffEntry> {
        self.breaking_differences
            .iter()
            .chain(self.non_breaking_differences.iter())
            .chain(self.unclassified_differences.iter())
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.breaking_differences.len()
            + self.non_breaking_differences.len()
            + self.unclassified_differences.len()
    }

    /// True when no difference was found in any bucket.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pretty-printed JSON, the text shown inline and attached on overflow.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Which document of a comparison an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The stored snapshot.
    Previous,
    /// The freshly fetched document.
    Current,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Previous => f.write_str("previous"),
            Side::Current => f.write_str("current"),
        }
    }
}

/// Why a comparison could not be completed.
///
/// Never surfaced past [`crate::compare`], which degrades it to "no diff".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffComputationError {
    /// The document root is not a JSON object.
    #[error("{side} specification is not a JSON object")]
    NotAnObject {
        /// Offending document.
        side: Side,
    },

    /// A section the comparison relies on has the wrong shape.
    #[error("{side} specification has a malformed '{section}' section: expected an object")]
    MalformedSection {
        /// Offending document.
        side: Side,
        /// Dotted section name.
        section: &'static str,
    },
}
