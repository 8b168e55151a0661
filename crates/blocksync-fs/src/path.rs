//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes internally.
///
/// Artifact locations are authored with forward slashes and only
/// converted to the platform-native form at I/O boundaries, so the same
/// descriptor produces byte-identical strings on every host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    ///
    /// Converts backslashes to forward slashes, collapses repeated
    /// separators and resolves `.`/`..` lexically. A leading `..` that
    /// would escape the start of the path is dropped.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: clean(&path_str.replace('\\', "/")),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        if cfg!(windows) {
            PathBuf::from(self.inner.replace('/', "\\"))
        } else {
            PathBuf::from(&self.inner)
        }
    }

    /// Join this path with a (possibly multi-segment) relative segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment_normalized = segment.replace('\\', "/");
        let joined = if self.inner.is_empty() {
            segment_normalized
        } else if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment_normalized)
        } else {
            format!("{}/{}", self.inner, segment_normalized)
        };
        Self {
            inner: clean(&joined),
        }
    }

    /// Last segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Extension of the last segment. Dot-files have none.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    /// Express this path relative to `base`, if it lies underneath it.
    pub fn strip_prefix(&self, base: &NormalizedPath) -> Option<&str> {
        let base = base.inner.trim_end_matches('/');
        let rest = self.inner.strip_prefix(base)?;
        match rest.strip_prefix('/') {
            Some(rel) if !rel.is_empty() => Some(rel),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }
}

/// Lexically clean a forward-slash path.
fn clean(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let (prefix, rest) = if let Some(rest) = path.strip_prefix("//") {
        if rest.starts_with('/') {
            ("/", rest.trim_start_matches('/'))
        } else {
            ("//", rest)
        }
    } else if let Some(rest) = path.strip_prefix('/') {
        ("/", rest)
    } else {
        ("", path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if body.is_empty() {
        if prefix.is_empty() { String::new() } else { "/".to_string() }
    } else {
        format!("{prefix}{body}")
    }
}

/// Resolve an output root to an absolute, symlink-free normalized path.
///
/// The directory is created if missing. Uses `dunce` so Windows roots
/// never carry the `\\?\` verbatim prefix into generated paths.
pub fn canonical_root(root: impl AsRef<Path>) -> Result<NormalizedPath> {
    let root = root.as_ref();
    std::fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;
    let resolved = dunce::canonicalize(root).map_err(|e| Error::io(root, e))?;
    Ok(NormalizedPath::new(resolved))
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}
