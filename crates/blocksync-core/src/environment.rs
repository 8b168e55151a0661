//! Contract with the external engineering environment
//!
//! The environment is a stateful, single-apartment automation API. These
//! traits describe the only operations the core needs from it; every
//! method is called from the affinity thread and nowhere else.
//!
//! Version drift is expressed explicitly: an operation the installed
//! environment does not expose for a kind returns
//! [`Capability::NotSupported`] instead of failing, which the orchestrator
//! reports as a warning.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::descriptor::{ArtifactDescriptor, ArtifactKind};

/// Outcome of an operation that the installed environment may not offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T> {
    Found(T),
    /// The environment version lacks this capability; carries the reason.
    NotSupported(String),
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Capability<U> {
        match self {
            Self::Found(value) => Capability::Found(f(value)),
            Self::NotSupported(reason) => Capability::NotSupported(reason),
        }
    }
}

/// Failures reported by the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    /// The environment is unreachable; no further call can succeed.
    #[error("environment unavailable: {0}")]
    Unavailable(String),

    /// A container, group or artifact does not exist.
    #[error("{what} not found: {name}")]
    Missing { what: String, name: String },

    #[error("environment call failed: {0}")]
    Failed(String),
}

impl EnvironmentError {
    pub fn missing(what: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Missing {
            what: what.into(),
            name: name.into(),
        }
    }

    /// Whether this failure invalidates the whole session rather than one item.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type EnvironmentResult<T> = std::result::Result<T, EnvironmentError>;

/// Environment-side handle of a resolved container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

/// Environment-side handle of a resolved group inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId {
    pub container: ContainerId,
    pub path: String,
}

/// Project currently open in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
}

/// Restricts which artifacts a scan returns.
///
/// Empty sets mean "everything". Container names compare
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterProfile {
    pub kinds: BTreeSet<ArtifactKind>,
    pub containers: Vec<String>,
}

impl FilterProfile {
    /// A profile that admits every artifact.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.containers.push(container.into());
        self
    }

    pub fn matches(&self, descriptor: &ArtifactDescriptor) -> bool {
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&descriptor.kind());
        let container_ok = self.containers.is_empty()
            || self
                .containers
                .iter()
                .any(|c| c.eq_ignore_ascii_case(descriptor.container()));
        kind_ok && container_ok
    }
}

/// Enumerates and resolves artifacts in the open project.
pub trait InventoryProvider {
    /// All artifacts admitted by `filter`.
    fn scan(&mut self, filter: &FilterProfile) -> EnvironmentResult<Vec<ArtifactDescriptor>>;

    /// Resolve an existing container by path. Never creates one.
    fn resolve_container(&mut self, path: &str) -> EnvironmentResult<ContainerId>;

    /// Resolve an existing group inside `container`. An empty `group`
    /// denotes the container's root group for that category.
    fn resolve_group(&mut self, container: &ContainerId, group: &str)
    -> EnvironmentResult<GroupId>;
}

/// Reads the serialized form of an artifact.
pub trait ArtifactReader {
    fn read(&mut self, descriptor: &ArtifactDescriptor) -> EnvironmentResult<Capability<String>>;
}

/// Creates or replaces an artifact inside an already resolved group.
pub trait ArtifactWriter {
    fn write(
        &mut self,
        group: &GroupId,
        descriptor: &ArtifactDescriptor,
        raw: &str,
    ) -> EnvironmentResult<Capability<()>>;
}

/// A live session with the external environment.
///
/// Implementations are created on the affinity thread and only ever used
/// there; `Send` is required so the session can be handed to that thread.
pub trait Environment: InventoryProvider + ArtifactReader + ArtifactWriter + Send {
    /// Version string of the installed environment, e.g. `"V19"`.
    fn version(&self) -> String;

    fn open_project(&mut self, path: &Path) -> EnvironmentResult<ProjectInfo>;

    fn close_project(&mut self) -> EnvironmentResult<()>;
}
