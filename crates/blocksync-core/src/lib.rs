//! Core synchronization layer for blocksync
//!
//! Mirrors artifacts of a single-threaded external engineering environment
//! into a plain, version-control-friendly file tree and back:
//!
//! - **AffinityExecutor**: one dedicated thread that runs every environment
//!   call in FIFO order
//! - **Path identity**: deterministic, collision-resistant file locations
//!   shared by export and import
//! - **Manifest**: content hashes that make repeated exports incremental
//! - **BatchOrchestrator**: ordered, failure-isolated export and import
//!
//! # Architecture
//!
//! ```text
//!            caller (UI / CLI)
//!                   |
//!           BatchOrchestrator
//!          /        |        \
//!   Manifest   SessionManager  identity
//!                   |
//!           AffinityExecutor --- Environment (external)
//!                   |
//!      blocksync-fs   blocksync-content
//! ```

pub mod config;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod executor;
pub mod identity;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod session;
pub mod version;

pub use config::SyncConfig;
pub use descriptor::{ArtifactDescriptor, ArtifactKind, Category, sort_for_processing};
pub use environment::{
    ArtifactReader, ArtifactWriter, Capability, ContainerId, Environment, EnvironmentError,
    EnvironmentResult, FilterProfile, GroupId, InventoryProvider, ProjectInfo,
};
pub use error::{Error, Result};
pub use executor::{AffinityExecutor, Completion, ExecutorConfig, ExecutorError, ExecutorState};
pub use manifest::{Manifest, ManifestEntry};
pub use orchestrator::{
    BatchOrchestrator, BatchResult, ExportOptions, ImportOptions, ItemIssue, ProgressEvent,
    ProgressObserver, Severity,
};
pub use session::SessionManager;
pub use version::VersionHint;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn invalid_root_error_names_the_path() {
        let error = Error::InvalidRoot {
            path: PathBuf::from("/exports/line1"),
            reason: "directory does not exist".into(),
        };

        let display = error.to_string();
        assert!(display.contains("/exports/line1"), "got: {display}");
        assert!(display.contains("does not exist"), "got: {display}");
    }

    #[test]
    fn session_preconditions_are_fatal() {
        assert!(Error::NoSession.is_session_fatal());
        assert!(Error::NoProject.is_session_fatal());
        assert!(!Error::Executor(ExecutorError::QueueFull).is_session_fatal());
    }
}
