//! User configuration stored under the output root
//!
//! ```toml
//! [export]
//! normalize = true
//! incremental = true
//!
//! [[export.scrub]]
//! pattern = 'CreationDate="[^"]*"'
//! replacement = 'CreationDate=""'
//!
//! [executor]
//! queue_capacity = 1024
//! shutdown_timeout_ms = 5000
//!
//! [io]
//! lock_timeout_ms = 10000
//! fsync = true
//! ```

use std::time::Duration;

use blocksync_content::{ContentNormalizer, ScrubRule};
use blocksync_fs::{ConfigStore, MetaPath, NormalizedPath, RobustnessConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::executor::{DEFAULT_THREAD_NAME, ExecutorConfig};
use crate::orchestrator::{ExportOptions, ImportOptions};

/// Contents of `meta/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub export: ExportSection,
    pub executor: ExecutorSection,
    pub io: IoSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub normalize: bool,
    pub incremental: bool,
    /// Applied in order after normalization; empty unless configured
    pub scrub: Vec<ScrubRule>,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            normalize: true,
            incremental: true,
            scrub: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub thread_name: String,
    pub queue_capacity: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            queue_capacity: 1024,
            shutdown_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSection {
    pub lock_timeout_ms: u64,
    pub fsync: bool,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 10_000,
            fsync: true,
        }
    }
}

impl SyncConfig {
    pub fn path(root: &NormalizedPath) -> NormalizedPath {
        root.join(MetaPath::Config.as_str())
    }

    /// Load the configuration for `root`.
    ///
    /// A missing file yields defaults. A file that exists but does not
    /// parse is an error.
    pub fn load(root: &NormalizedPath) -> Result<Self> {
        let path = Self::path(root);
        match ConfigStore::new().load_optional(&path)? {
            Some(config) => Ok(config),
            None => {
                debug!(path = %path, "no config, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, root: &NormalizedPath) -> Result<()> {
        ConfigStore::with_robustness(self.robustness()).save(&Self::path(root), self)?;
        Ok(())
    }

    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            lock_timeout: Duration::from_millis(self.io.lock_timeout_ms),
            enable_fsync: self.io.fsync,
        }
    }

    /// Export options with the configured scrubbers compiled.
    pub fn export_options(&self) -> Result<ExportOptions> {
        let normalizer = ContentNormalizer::from_rules(&self.export.scrub)?;
        Ok(ExportOptions::new(self.export.normalize, self.export.incremental)
            .with_normalizer(normalizer)
            .with_robustness(self.robustness()))
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions::default()
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            thread_name: self.executor.thread_name.clone(),
            queue_capacity: self.executor.queue_capacity,
            shutdown_timeout: Duration::from_millis(self.executor.shutdown_timeout_ms),
        }
    }
}
