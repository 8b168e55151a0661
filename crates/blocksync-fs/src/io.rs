//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use tracing::debug;

use crate::{Error, NormalizedPath, Result};

/// Tuning for [`write_atomic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to keep retrying the advisory lock before giving up
    pub lock_timeout: Duration,
    /// Flush the temp file to stable storage before renaming
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            enable_fsync: true,
        }
    }
}

fn sibling(native_path: &Path, suffix: &str) -> PathBuf {
    let name = native_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    native_path.with_file_name(format!(".{name}.{suffix}"))
}

/// Write content atomically to a file with locking.
///
/// Takes an exclusive advisory lock on a hidden `.lock` sibling (retrying
/// with exponential backoff up to `config.lock_timeout`), writes a uniquely
/// named temp file in the same directory and renames it over the target.
/// Readers observe either the old or the new content, never a partial
/// write.
///
/// The lock file stays behind after the write. Removing it would let a
/// waiting writer hold a lock on the unlinked file while a newcomer locks
/// a fresh one at the same path.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();
    let parent = native_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;

    let lock_path = sibling(&native_path, "lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(250))
        .with_max_elapsed_time(Some(config.lock_timeout))
        .build();
    backoff::retry(policy, || {
        lock_file
            .try_lock_exclusive()
            .map_err(backoff::Error::transient)
    })
    .map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    let result = write_and_rename(&parent, &native_path, content, config);
    drop(lock_file);
    result
}

fn write_and_rename(
    parent: &Path,
    native_path: &Path,
    content: &[u8],
    config: RobustnessConfig,
) -> Result<()> {
    let name = native_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Removed on drop unless persisted.
    let mut temp_file = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(temp_file.path(), e))?;

    if config.enable_fsync {
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| Error::io(temp_file.path(), e))?;
    }

    temp_file
        .persist(native_path)
        .map_err(|e| Error::io(native_path, e.error))?;
    debug!(path = %native_path.display(), bytes = content.len(), "wrote file atomically");
    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}
