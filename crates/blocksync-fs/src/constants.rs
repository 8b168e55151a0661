//! Fixed locations of blocksync metadata under an output root.

use std::path::Path;

/// Well-known paths relative to an output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaPath {
    /// The `meta` directory holding all tool-owned files
    MetaDir,
    /// Persisted manifest of exported artifacts
    Manifest,
    /// Plain-text record of the environment that produced the last export
    VersionHint,
    /// Optional user configuration
    Config,
}

impl MetaPath {
    /// Get the root-relative, forward-slash path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaDir => "meta",
            Self::Manifest => "meta/manifest.json",
            Self::VersionHint => "meta/environment-version.txt",
            Self::Config => "meta/config.toml",
        }
    }
}

impl AsRef<Path> for MetaPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for MetaPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MetaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
