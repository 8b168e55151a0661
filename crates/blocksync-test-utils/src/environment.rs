//! In-memory stand-in for the external engineering environment.
//!
//! [`FakeEnvironment`] is a cheap handle: clone it, hand one clone to
//! [`SessionManager::attach`] and keep the other to script failures and
//! inspect what the session did.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use blocksync_core::{
    ArtifactDescriptor, ArtifactKind, ArtifactReader, ArtifactWriter, Capability, ContainerId,
    Environment, EnvironmentError, EnvironmentResult, FilterProfile, GroupId, InventoryProvider,
    ProjectInfo, SessionManager,
};

/// One call to [`ArtifactWriter::write`] that reached the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeWrite {
    pub logical_key: String,
    pub container: String,
    pub group: String,
    pub content: String,
}

#[derive(Debug, Default)]
struct FakeState {
    version: String,
    /// lowercase container -> lowercase group paths known to exist
    containers: BTreeMap<String, BTreeSet<String>>,
    /// logical key -> (descriptor, serialized content)
    artifacts: BTreeMap<String, (ArtifactDescriptor, String)>,
    unsupported_kinds: HashSet<ArtifactKind>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    duplicate_scan_entries: bool,
    unavailable: bool,
    project: Option<ProjectInfo>,
    reads: Vec<String>,
    writes: Vec<FakeWrite>,
    /// Thread names on which a session handle was dropped
    released_on: Vec<Option<String>>,
}

/// Scriptable [`Environment`] backed by shared in-memory state.
#[derive(Debug, Clone)]
pub struct FakeEnvironment {
    state: Arc<Mutex<FakeState>>,
    /// Set on the handle given out by [`FakeEnvironment::connector`]
    session_handle: bool,
}

impl Drop for FakeEnvironment {
    fn drop(&mut self) {
        if !self.session_handle {
            return;
        }
        let thread = std::thread::current().name().map(str::to_string);
        if let Ok(mut state) = self.state.lock() {
            state.released_on.push(thread);
        }
    }
}

impl FakeEnvironment {
    /// An environment reporting `version` with no containers.
    pub fn new(version: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                version: version.to_string(),
                ..FakeState::default()
            })),
            session_handle: false,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_container(self, container: &str) -> Self {
        self.state()
            .containers
            .entry(container.to_lowercase())
            .or_default();
        self
    }

    /// Register `group` (and every parent group) inside `container`.
    pub fn with_group(self, container: &str, group: &str) -> Self {
        {
            let mut state = self.state();
            let groups = state
                .containers
                .entry(container.to_lowercase())
                .or_default();
            let segments: Vec<&str> = group.split('/').filter(|s| !s.is_empty()).collect();
            for depth in 1..=segments.len() {
                groups.insert(segments[..depth].join("/").to_lowercase());
            }
        }
        self
    }

    /// Add an artifact, creating its container and group.
    pub fn with_artifact(self, descriptor: &ArtifactDescriptor, content: &str) -> Self {
        let this = self.with_group(descriptor.container(), descriptor.group());
        this.set_content(descriptor, content);
        this
    }

    /// Reads and writes of `kind` report [`Capability::NotSupported`].
    pub fn with_unsupported_kind(self, kind: ArtifactKind) -> Self {
        self.state().unsupported_kinds.insert(kind);
        self
    }

    pub fn with_failing_read(self, descriptor: &ArtifactDescriptor) -> Self {
        self.state()
            .failing_reads
            .insert(descriptor.logical_key().to_string());
        self
    }

    pub fn with_failing_write(self, descriptor: &ArtifactDescriptor) -> Self {
        self.state()
            .failing_writes
            .insert(descriptor.logical_key().to_string());
        self
    }

    /// Make `scan` return every artifact twice.
    pub fn with_duplicate_scan_entries(self) -> Self {
        self.state().duplicate_scan_entries = true;
        self
    }

    /// Replace the stored content of an artifact (adding it if new).
    pub fn set_content(&self, descriptor: &ArtifactDescriptor, content: &str) {
        self.state().artifacts.insert(
            descriptor.logical_key().to_string(),
            (descriptor.clone(), content.to_string()),
        );
    }

    pub fn remove_artifact(&self, descriptor: &ArtifactDescriptor) {
        self.state().artifacts.remove(descriptor.logical_key());
    }

    /// From now on every call fails with [`EnvironmentError::Unavailable`].
    pub fn make_unavailable(&self) {
        self.state().unavailable = true;
    }

    pub fn content(&self, descriptor: &ArtifactDescriptor) -> Option<String> {
        self.state()
            .artifacts
            .get(descriptor.logical_key())
            .map(|(_, content)| content.clone())
    }

    /// Logical keys passed to `read`, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.state().reads.clone()
    }

    /// Successful writes, in call order.
    pub fn writes(&self) -> Vec<FakeWrite> {
        self.state().writes.clone()
    }

    pub fn project(&self) -> Option<ProjectInfo> {
        self.state().project.clone()
    }

    /// Name of the thread each session handle was dropped on, in order.
    pub fn released_on(&self) -> Vec<Option<String>> {
        self.state().released_on.clone()
    }

    /// A `connect` closure for [`SessionManager::attach`].
    pub fn connector(
        &self,
    ) -> impl FnOnce() -> EnvironmentResult<Box<dyn Environment>> + Send + 'static {
        let env = FakeEnvironment {
            state: Arc::clone(&self.state),
            session_handle: true,
        };
        move || Ok(Box::new(env) as Box<dyn Environment>)
    }

    fn check_available(&self) -> EnvironmentResult<()> {
        if self.state().unavailable {
            return Err(EnvironmentError::Unavailable(
                "automation server stopped responding".into(),
            ));
        }
        Ok(())
    }
}

impl InventoryProvider for FakeEnvironment {
    fn scan(&mut self, filter: &FilterProfile) -> EnvironmentResult<Vec<ArtifactDescriptor>> {
        self.check_available()?;
        let state = self.state();
        let mut found: Vec<ArtifactDescriptor> = state
            .artifacts
            .values()
            .map(|(descriptor, _)| descriptor.clone())
            .filter(|descriptor| filter.matches(descriptor))
            .collect();
        if state.duplicate_scan_entries {
            found.extend(found.clone());
        }
        // Deliberately not in processing order.
        found.reverse();
        Ok(found)
    }

    fn resolve_container(&mut self, path: &str) -> EnvironmentResult<ContainerId> {
        self.check_available()?;
        if self.state().containers.contains_key(&path.to_lowercase()) {
            Ok(ContainerId(path.to_string()))
        } else {
            Err(EnvironmentError::missing("container", path))
        }
    }

    fn resolve_group(
        &mut self,
        container: &ContainerId,
        group: &str,
    ) -> EnvironmentResult<GroupId> {
        self.check_available()?;
        let state = self.state();
        let groups = state
            .containers
            .get(&container.0.to_lowercase())
            .ok_or_else(|| EnvironmentError::missing("container", container.0.clone()))?;
        if !group.is_empty() && !groups.contains(&group.to_lowercase()) {
            return Err(EnvironmentError::missing("group", group));
        }
        Ok(GroupId {
            container: container.clone(),
            path: group.to_string(),
        })
    }
}

impl ArtifactReader for FakeEnvironment {
    fn read(&mut self, descriptor: &ArtifactDescriptor) -> EnvironmentResult<Capability<String>> {
        self.check_available()?;
        let mut state = self.state();
        let key = descriptor.logical_key().to_string();
        state.reads.push(key.clone());

        if state.unsupported_kinds.contains(&descriptor.kind()) {
            return Ok(Capability::NotSupported(format!(
                "{} export is not available in {}",
                descriptor.kind(),
                state.version
            )));
        }
        if state.failing_reads.contains(&key) {
            return Err(EnvironmentError::Failed(format!(
                "export of {} raised an exception",
                descriptor.name()
            )));
        }
        state
            .artifacts
            .get(&key)
            .map(|(_, content)| Capability::Found(content.clone()))
            .ok_or_else(|| EnvironmentError::missing("artifact", descriptor.name()))
    }
}

impl ArtifactWriter for FakeEnvironment {
    fn write(
        &mut self,
        group: &GroupId,
        descriptor: &ArtifactDescriptor,
        raw: &str,
    ) -> EnvironmentResult<Capability<()>> {
        self.check_available()?;
        let mut state = self.state();
        let key = descriptor.logical_key().to_string();

        if state.unsupported_kinds.contains(&descriptor.kind()) {
            return Ok(Capability::NotSupported(format!(
                "{} import is not available in {}",
                descriptor.kind(),
                state.version
            )));
        }
        if state.failing_writes.contains(&key) {
            return Err(EnvironmentError::Failed(format!(
                "import of {} was rejected",
                descriptor.name()
            )));
        }

        state
            .artifacts
            .insert(key.clone(), (descriptor.clone(), raw.to_string()));
        state.writes.push(FakeWrite {
            logical_key: key,
            container: group.container.0.clone(),
            group: group.path.clone(),
            content: raw.to_string(),
        });
        Ok(Capability::Found(()))
    }
}

impl Environment for FakeEnvironment {
    fn version(&self) -> String {
        self.state().version.clone()
    }

    fn open_project(&mut self, path: &Path) -> EnvironmentResult<ProjectInfo> {
        self.check_available()?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| EnvironmentError::missing("project", path.display().to_string()))?;
        let project = ProjectInfo {
            name,
            path: path.to_path_buf(),
        };
        self.state().project = Some(project.clone());
        Ok(project)
    }

    fn close_project(&mut self) -> EnvironmentResult<()> {
        self.state().project = None;
        Ok(())
    }
}

/// Attach `env` to a fresh executor and open a project.
///
/// # Panics
/// Panics if the executor cannot start or the session cannot be set up.
pub async fn open_session(env: &FakeEnvironment) -> SessionManager {
    let executor = blocksync_core::AffinityExecutor::with_defaults()
        .expect("open_session: executor failed to start");
    let session = SessionManager::new(Arc::new(executor));
    session
        .attach(env.connector())
        .await
        .expect("open_session: attach failed");
    session
        .open_project("projects/Line1.ap19")
        .await
        .expect("open_session: open_project failed");
    session
}
