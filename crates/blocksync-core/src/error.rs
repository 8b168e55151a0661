//! Error types for blocksync-core

use std::path::PathBuf;

use crate::environment::EnvironmentError;
use crate::executor::ExecutorError;

/// Result type for blocksync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blocksync-core operations
///
/// Only session-level problems surface here from a batch; per-item
/// failures are collected in the batch result instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No environment session is attached
    #[error("No environment session is attached")]
    NoSession,

    /// A session is attached but no project is open
    #[error("No project is open in the environment")]
    NoProject,

    /// Output root argument is empty or unusable
    #[error("Invalid output root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Filesystem error from blocksync-fs
    #[error(transparent)]
    Fs(#[from] blocksync_fs::Error),

    /// Normalization error from blocksync-content
    #[error(transparent)]
    Content(#[from] blocksync_content::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that make every remaining item of a batch fail.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::NoSession | Self::NoProject => true,
            Self::Environment(e) => e.is_session_fatal(),
            Self::Executor(e) => matches!(
                e,
                ExecutorError::ShutDown | ExecutorError::ShutdownTimedOut | ExecutorError::Spawn { .. }
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_errors_keep_their_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::from(blocksync_fs::Error::io("PLC_1/blocks/Motor.xml", source));

        assert!(matches!(error, Error::Fs(_)));
        assert!(error.to_string().contains("PLC_1/blocks/Motor.xml"));
        assert!(!error.is_session_fatal());
    }
}
