//! Export and import batches
//!
//! A batch takes a selection of descriptors, puts it into processing order
//! (type definitions first, tag tables last) and handles one item at a
//! time through the session's affinity thread. Item failures are recorded
//! and the batch moves on; only session-level failures end it early.

mod export;
mod import;
mod progress;
mod result;

pub use progress::{ProgressEvent, ProgressObserver};
pub use result::{BatchResult, ItemIssue, Severity};

use std::path::Path;

use blocksync_content::ContentNormalizer;
use blocksync_fs::{NormalizedPath, RobustnessConfig, canonical_root};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::descriptor::{ArtifactDescriptor, sort_for_processing};
use crate::environment::EnvironmentError;
use crate::executor::ExecutorError;
use crate::session::SessionManager;
use crate::{Error, Result};

/// Settings for [`BatchOrchestrator::export_batch`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Canonicalize content before hashing and writing
    pub normalize: bool,
    /// Skip items whose normalized content hash is already recorded
    pub incremental: bool,
    pub normalizer: ContentNormalizer,
    pub cancellation: CancellationToken,
    pub robustness: RobustnessConfig,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl ExportOptions {
    pub fn new(normalize: bool, incremental: bool) -> Self {
        Self {
            normalize,
            incremental,
            normalizer: ContentNormalizer::new(),
            cancellation: CancellationToken::new(),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: ContentNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }
}

/// Settings for [`BatchOrchestrator::import_batch`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub cancellation: CancellationToken,
}

impl ImportOptions {
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Runs export and import batches against one session.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    session: SessionManager,
}

impl BatchOrchestrator {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

/// Successful handling of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Exported,
    Imported,
    Skipped,
}

/// Why one item did not succeed.
#[derive(Debug)]
enum ItemFailure {
    Warning(String),
    Error(String),
    /// Work was cancelled before the environment ran it.
    Cancelled,
    /// The session itself is gone; the batch stops.
    Fatal(Error),
}

impl From<Error> for ItemFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::Executor(ExecutorError::Cancelled) => Self::Cancelled,
            Error::Executor(ExecutorError::Panicked { message }) => {
                Self::Error(format!("environment call panicked: {message}"))
            }
            e if e.is_session_fatal() => Self::Fatal(e),
            e => Self::Error(e.to_string()),
        }
    }
}

impl From<EnvironmentError> for ItemFailure {
    fn from(e: EnvironmentError) -> Self {
        Error::from(e).into()
    }
}

enum Step {
    Continue,
    Stop,
    Abort(Error),
}

/// Bookkeeping shared by both batch directions.
struct BatchRun<'a> {
    result: BatchResult,
    total: usize,
    progress: Option<&'a dyn ProgressObserver>,
}

impl<'a> BatchRun<'a> {
    fn new(total: usize, progress: Option<&'a dyn ProgressObserver>) -> Self {
        Self {
            result: BatchResult::default(),
            total,
            progress,
        }
    }

    /// Items `index..total` will never start.
    fn cancel_remaining(&mut self, index: usize) {
        let remaining = self.total - index;
        warn!(remaining, "batch cancelled");
        self.result.record_cancelled(remaining);
    }

    /// Fold one item's outcome into the result and report progress.
    fn settle(
        &mut self,
        index: usize,
        descriptor: &ArtifactDescriptor,
        outcome: std::result::Result<ItemOutcome, ItemFailure>,
    ) -> Step {
        let issue = match outcome {
            Ok(ItemOutcome::Exported) => {
                self.result.record_exported();
                None
            }
            Ok(ItemOutcome::Imported) => {
                self.result.record_imported();
                None
            }
            Ok(ItemOutcome::Skipped) => {
                self.result.record_skipped();
                None
            }
            Err(ItemFailure::Warning(message)) => {
                warn!(artifact = %descriptor, %message, "item skipped");
                Some(ItemIssue::new(Severity::Warning, descriptor, message))
            }
            Err(ItemFailure::Error(message)) => {
                error!(artifact = %descriptor, %message, "item failed");
                Some(ItemIssue::new(Severity::Error, descriptor, message))
            }
            Err(ItemFailure::Cancelled) => {
                self.cancel_remaining(index);
                return Step::Stop;
            }
            Err(ItemFailure::Fatal(e)) => {
                error!(artifact = %descriptor, error = %e, "session lost, aborting batch");
                return Step::Abort(e);
            }
        };

        let issue = match issue {
            Some(issue) => Some(self.result.record_issue(issue)),
            None => None,
        };
        if let Some(progress) = self.progress {
            progress.on_progress(&ProgressEvent {
                processed: index + 1,
                total: self.total,
                descriptor,
                issue,
            });
        }
        Step::Continue
    }
}

/// Selection in processing order, one entry per logical key.
fn processing_order(selection: &[ArtifactDescriptor]) -> Vec<ArtifactDescriptor> {
    let mut items = selection.to_vec();
    sort_for_processing(&mut items);
    items.dedup_by(|a, b| a.logical_key() == b.logical_key());
    items
}

fn invalid_root(root: &Path, reason: impl Into<String>) -> Error {
    Error::InvalidRoot {
        path: root.to_path_buf(),
        reason: reason.into(),
    }
}

/// Export target: created if missing.
fn export_root(root: &Path) -> Result<NormalizedPath> {
    if root.as_os_str().is_empty() {
        return Err(invalid_root(root, "path is empty"));
    }
    canonical_root(root).map_err(|e| invalid_root(root, e.to_string()))
}

/// Import source: must already exist.
fn import_root(root: &Path) -> Result<NormalizedPath> {
    if root.as_os_str().is_empty() {
        return Err(invalid_root(root, "path is empty"));
    }
    if !root.is_dir() {
        return Err(invalid_root(root, "directory does not exist"));
    }
    canonical_root(root).map_err(|e| invalid_root(root, e.to_string()))
}
