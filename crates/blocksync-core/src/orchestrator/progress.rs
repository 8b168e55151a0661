//! Per-item progress notifications

use crate::descriptor::ArtifactDescriptor;

use super::result::ItemIssue;

/// Emitted after every processed item, including skipped ones.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// Items processed so far, this one included
    pub processed: usize,
    pub total: usize,
    pub descriptor: &'a ArtifactDescriptor,
    /// The warning or error this item produced, if any
    pub issue: Option<&'a ItemIssue>,
}

/// Receives [`ProgressEvent`]s synchronously from the orchestrator.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent<'_>);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}
