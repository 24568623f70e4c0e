//! # Change Classification
//!
//! Reduces a [`DiffResult`] to the four counters shown in a notification
//! summary line.
//!
//! The counters are not a partition. An entry is counted once per rule it
//! matches, so a removal whose code mentions deprecation counts as both
//! removed and deprecated. `breaking` counts entries, not the boolean flag.

use crate::models::{Action, DiffResult};
use serde::{Deserialize, Serialize};

/// Substring that marks a code as deprecation-related.
pub const DEPRECATION_MARKER: &str = "deprecat";

/// Counts derived from a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Entries in the breaking bucket.
    pub breaking: usize,
    /// Entries, from any bucket, whose action is `add`.
    pub added: usize,
    /// Entries, from any bucket, whose action is `remove`.
    pub removed: usize,
    /// Entries, from any bucket, whose code contains [`DEPRECATION_MARKER`].
    pub deprecated: usize,
}

impl ChangeSummary {
    /// Sum of all four counters.
    pub fn total(&self) -> usize {
        self.breaking + self.added + self.removed + self.deprecated
    }

    /// True when every counter is zero.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Derives a [`ChangeSummary`] from a diff.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use specwatch_diff::{classify, compare};
///
/// let diff = compare(
///     &json!({"paths": {"/x": {}, "/y": {}}}),
///     &json!({"paths": {"/y": {}}}),
/// )
/// .unwrap();
///
/// let summary = classify(&diff);
/// assert_eq!(summary.breaking, 1);
/// assert_eq!(summary.removed, 1);
/// assert_eq!(summary.added, 0);
/// assert_eq!(summary.deprecated, 0);
/// ```
pub fn classify(diff: &DiffResult) -> ChangeSummary {
    let mut summary = ChangeSummary {
        breaking: diff.breaking_differences.len(),
        ..ChangeSummary::default()
    };

    for entry in diff.entries() {
        match entry.action {
            Action::Add => summary.added += 1,
            Action::Remove => summary.removed += 1,
            Action::Modify => {}
        }
        if entry.code.contains(DEPRECATION_MARKER) {
            summary.deprecated += 1;
        }
    }
    summary
}
