//! A single manifest record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hash and last successful write time of one exported file.
///
/// The hash is always taken over normalized content. The timestamp is
/// informational and never consulted when deciding whether to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Canonical `sha256:<hex>` checksum; `None` once invalidated
    #[serde(default)]
    pub hash: Option<String>,
    /// When the file was last written by an export
    pub updated: DateTime<Utc>,
}

impl ManifestEntry {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            updated: Utc::now(),
        }
    }

    /// Forget the hash so the next export rewrites the file.
    pub fn invalidate(&mut self) {
        self.hash = None;
    }

    /// Whether this entry records `hash` (hex digits compared case-insensitively).
    pub fn matches(&self, hash: &str) -> bool {
        self.hash
            .as_deref()
            .is_some_and(|recorded| blocksync_fs::checksums_match(recorded, hash))
    }
}
