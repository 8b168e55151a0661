//! [`TestRoot`]: a temporary export/import root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;

/// A temporary directory used as an output root, with helpers for the
/// files blocksync writes into it.
pub struct TestRoot {
    temp_dir: TempDir,
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` (forward slashes) under the root.
    pub fn join(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.path().to_path_buf(), |path, segment| path.join(segment))
    }

    pub fn read(&self, relative: &str) -> String {
        let path = self.join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Could not read {}: {e}", path.display()))
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.join(relative)).unwrap();
    }

    pub fn modified(&self, relative: &str) -> SystemTime {
        fs::metadata(self.join(relative))
            .and_then(|m| m.modified())
            .unwrap()
    }

    /// Root-relative paths of all `.xml` files, sorted, forward slashes.
    pub fn xml_files(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect_xml(self.path(), self.path(), &mut found);
        found.sort();
        found
    }

    /// # Panics
    /// Panics with a descriptive message if `relative` is not a file.
    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.join(relative);
        assert!(path.is_file(), "Expected file to exist: {}", path.display());
    }

    /// # Panics
    /// Panics with a descriptive message if `relative` exists.
    pub fn assert_file_not_exists(&self, relative: &str) {
        let path = self.join(relative);
        assert!(!path.exists(), "Expected file NOT to exist: {}", path.display());
    }
}

fn collect_xml(base: &Path, dir: &Path, found: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_xml(base, &path, found);
        } else if path.extension().is_some_and(|ext| ext == "xml") {
            let relative = path.strip_prefix(base).unwrap();
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            found.push(segments.join("/"));
        }
    }
}
