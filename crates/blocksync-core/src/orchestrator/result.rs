//! Batch summaries

use std::fmt;

use serde::Serialize;

use crate::descriptor::ArtifactDescriptor;
use crate::identity;

/// How bad a per-item problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The item was skipped for a recoverable reason (capability absent).
    Warning,
    /// The item failed; the batch went on without it.
    Error,
}

/// A problem attached to one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemIssue {
    pub severity: Severity,
    pub logical_key: String,
    /// Root-relative file the item maps to
    pub relative_path: String,
    pub message: String,
}

impl ItemIssue {
    pub(crate) fn new(
        severity: Severity,
        descriptor: &ArtifactDescriptor,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            logical_key: descriptor.logical_key().to_string(),
            relative_path: identity::relative_file_path(descriptor),
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}: {}: {}", self.relative_path, self.message)
    }
}

/// Summary of one export or import batch.
///
/// Accumulated item by item and handed to the caller once, at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    exported: usize,
    imported: usize,
    skipped: usize,
    cancelled: usize,
    pruned: usize,
    warnings: Vec<ItemIssue>,
    errors: Vec<ItemIssue>,
    environment_mismatch: bool,
}

impl BatchResult {
    pub fn exported(&self) -> usize {
        self.exported
    }

    pub fn imported(&self) -> usize {
        self.imported
    }

    /// Items whose normalized content was unchanged since the last export.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Items never started because the batch was cancelled.
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Manifest entries dropped because their file was deleted.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    pub fn warnings(&self) -> &[ItemIssue] {
        &self.warnings
    }

    pub fn errors(&self) -> &[ItemIssue] {
        &self.errors
    }

    /// Import only: the tree was exported under a different environment
    /// version than the one attached now.
    pub fn environment_mismatch(&self) -> bool {
        self.environment_mismatch
    }

    /// True when no item produced a warning or an error.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    pub(crate) fn record_exported(&mut self) {
        self.exported += 1;
    }

    pub(crate) fn record_imported(&mut self) {
        self.imported += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_cancelled(&mut self, count: usize) {
        self.cancelled += count;
    }

    pub(crate) fn record_pruned(&mut self, count: usize) {
        self.pruned += count;
    }

    pub(crate) fn flag_environment_mismatch(&mut self) {
        self.environment_mismatch = true;
    }

    /// Store `issue` and return a reference to the stored copy.
    pub(crate) fn record_issue(&mut self, issue: ItemIssue) -> &ItemIssue {
        let list = match issue.severity {
            Severity::Warning => &mut self.warnings,
            Severity::Error => &mut self.errors,
        };
        list.push(issue);
        &list[list.len() - 1]
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} exported, {} imported, {} skipped, {} cancelled, {} warnings, {} errors",
            self.exported,
            self.imported,
            self.skipped,
            self.cancelled,
            self.warnings.len(),
            self.errors.len()
        )
    }
}
