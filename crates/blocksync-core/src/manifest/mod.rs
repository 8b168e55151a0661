//! Manifest cache for incremental export
//!
//! The manifest maps each exported file (root-relative path) to the hash
//! of its normalized content. It is persisted as pretty JSON at
//! `meta/manifest.json` under the output root so it diffs cleanly and can
//! be deleted by hand at any time: a missing or unreadable manifest simply
//! means "nothing exported yet".

mod entry;

pub use entry::ManifestEntry;

use std::collections::BTreeMap;

use blocksync_fs::{MetaPath, NormalizedPath, RobustnessConfig, io};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;

/// Version of the running tool, recorded in every saved manifest.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Persisted record of exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Tool version that last saved this manifest
    tool_version: String,
    /// Environment version the recorded hashes were produced under
    #[serde(default)]
    environment_version: Option<String>,
    /// Relative output path -> entry
    #[serde(default)]
    entries: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Create an empty manifest stamped with the running tool version.
    pub fn new() -> Self {
        Self {
            tool_version: TOOL_VERSION.to_string(),
            environment_version: None,
            entries: BTreeMap::new(),
        }
    }

    /// Location of the manifest under `root`.
    pub fn path(root: &NormalizedPath) -> NormalizedPath {
        root.join(MetaPath::Manifest.as_str())
    }

    /// Load the manifest for `root`.
    ///
    /// Never fails: an absent, unreadable or corrupt manifest yields an
    /// empty one (and a warning for the corrupt case).
    pub fn load(root: &NormalizedPath) -> Self {
        let path = Self::path(root);
        if !path.is_file() {
            debug!(path = %path, "no manifest, starting empty");
            return Self::new();
        }

        let content = match io::read_text(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path, error = %e, "manifest unreadable, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str::<Manifest>(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path, error = %e, "manifest corrupt, starting empty");
                Self::new()
            }
        }
    }

    /// Atomically persist the manifest, creating `meta/` if needed.
    ///
    /// The tool version tag is refreshed to the running version.
    pub fn save(&mut self, root: &NormalizedPath, robustness: RobustnessConfig) -> Result<()> {
        self.tool_version = TOOL_VERSION.to_string();
        let content = serde_json::to_string_pretty(self)?;
        io::write_atomic(&Self::path(root), content.as_bytes(), robustness)?;
        debug!(entries = self.entries.len(), "manifest saved");
        Ok(())
    }

    /// Drop entries whose file no longer exists under `root`.
    ///
    /// Returns the number of entries removed.
    pub fn prune_missing(&mut self, root: &NormalizedPath) -> usize {
        let before = self.entries.len();
        self.entries.retain(|relative, _| root.join(relative).is_file());
        let removed = before - self.entries.len();
        if removed > 0 {
            info!(removed, "pruned manifest entries for deleted files");
        }
        removed
    }

    /// Keep every recorded path but forget its hash.
    ///
    /// Used when the manifest is incompatible with the current run: every
    /// file is rewritten, and entries for files outside the current
    /// selection survive until their files are deleted.
    pub fn invalidate_hashes(&mut self) {
        for entry in self.entries.values_mut() {
            entry.invalidate();
        }
    }

    /// Whether hashes in this manifest can be trusted for skip decisions
    /// under `environment_version`.
    ///
    /// A manifest is stale when a newer major tool version wrote it or when
    /// it was produced by a different environment version.
    pub fn is_compatible_with(&self, environment_version: &str) -> bool {
        let ours = semver::Version::parse(TOOL_VERSION).ok();
        let theirs = semver::Version::parse(&self.tool_version).ok();
        let tool_ok = match (ours, theirs) {
            (Some(ours), Some(theirs)) => theirs.major <= ours.major,
            _ => false,
        };

        let environment_ok = self
            .environment_version
            .as_deref()
            .is_none_or(|recorded| recorded.eq_ignore_ascii_case(environment_version));

        tool_ok && environment_ok
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn environment_version(&self) -> Option<&str> {
        self.environment_version.as_deref()
    }

    pub fn set_environment_version(&mut self, version: impl Into<String>) {
        self.environment_version = Some(version.into());
    }

    pub fn get(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(relative_path)
    }

    /// True if `relative_path` is recorded with exactly `hash`.
    pub fn is_unchanged(&self, relative_path: &str, hash: &str) -> bool {
        self.get(relative_path).is_some_and(|entry| entry.matches(hash))
    }

    /// Record a successful write.
    pub fn record(&mut self, relative_path: impl Into<String>, hash: impl Into<String>) {
        self.entries
            .insert(relative_path.into(), ManifestEntry::new(hash));
    }

    pub fn remove(&mut self, relative_path: &str) -> Option<ManifestEntry> {
        self.entries.remove(relative_path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
