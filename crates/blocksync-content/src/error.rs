//! Error types for blocksync-content

/// Result type for blocksync-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while normalizing artifact content
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed markup at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("Markup ended with {open} unclosed element(s)")]
    Unbalanced { open: usize },

    #[error("Invalid scrub pattern `{pattern}`: {message}")]
    InvalidScrubber { pattern: String, message: String },

    #[error("Failed to render normalized markup: {0}")]
    Render(String),
}

impl Error {
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }
}
