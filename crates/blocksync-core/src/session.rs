//! Ownership of the environment session and its open project
//!
//! The session handle and the open project are the only mutable state
//! shared with the external environment. [`SessionManager`] keeps both
//! behind the [`AffinityExecutor`]: every access is a submitted job, so
//! the state is only ever touched on the affinity thread. That includes
//! the release: when the last handle goes away the session is detached by
//! one more job, never dropped on the caller's thread.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::descriptor::{ArtifactDescriptor, sort_for_processing};
use crate::environment::{Environment, EnvironmentResult, FilterProfile, ProjectInfo};
use crate::executor::{AffinityExecutor, ExecutorState};
use crate::{Error, Result};

#[derive(Default)]
struct SessionState {
    environment: Option<Box<dyn Environment>>,
    project: Option<ProjectInfo>,
}

impl SessionState {
    fn environment(&mut self) -> Result<&mut dyn Environment> {
        self.environment
            .as_deref_mut()
            .map(|env| env as &mut dyn Environment)
            .ok_or(Error::NoSession)
    }

    /// The environment, provided a project is open.
    fn project_environment(&mut self) -> Result<&mut dyn Environment> {
        if self.environment.is_none() {
            return Err(Error::NoSession);
        }
        if self.project.is_none() {
            return Err(Error::NoProject);
        }
        self.environment()
    }

    fn close_project(&mut self) -> Result<()> {
        let Some(project) = self.project.take() else {
            return Ok(());
        };
        self.environment()?.close_project()?;
        info!(project = %project.name, "project closed");
        Ok(())
    }
}

/// Shared by every clone of a [`SessionManager`].
struct SessionCore {
    executor: Arc<AffinityExecutor>,
    state: Arc<Mutex<SessionState>>,
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if self.executor.state() != ExecutorState::Running {
            warn!("affinity executor stopped before the session was released");
        }
        let state = Arc::clone(&self.state);
        let release = self.executor.submit(move || {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.environment.is_none() {
                return;
            }
            if let Err(e) = state.close_project() {
                warn!(error = %e, "failed to close project while releasing session");
            }
            state.project = None;
            state.environment = None;
            debug!("environment session released");
        });
        // Runs before the executor drains; nobody waits for it.
        drop(release);
    }
}

/// Owns the environment session; cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionCore>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("executor", &self.inner.executor)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(executor: Arc<AffinityExecutor>) -> Self {
        Self {
            inner: Arc::new(SessionCore {
                executor,
                state: Arc::new(Mutex::new(SessionState::default())),
            }),
        }
    }

    pub fn executor(&self) -> &Arc<AffinityExecutor> {
        &self.inner.executor
    }

    /// Run `f` with the session state on the affinity thread.
    async fn on_affinity<F, T>(&self, cancel: Option<CancellationToken>, f: F) -> Result<T>
    where
        F: FnOnce(&mut SessionState) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.inner.state);
        let job = move || {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        let completion = match cancel {
            Some(token) => self.inner.executor.submit_with_cancel(job, token),
            None => self.inner.executor.submit(job),
        };
        completion.await?
    }

    /// Connect to the environment.
    ///
    /// `connect` runs on the affinity thread, so the session is created
    /// on the thread that will use it. An existing session is detached
    /// first. Returns the environment version.
    pub async fn attach<F>(&self, connect: F) -> Result<String>
    where
        F: FnOnce() -> EnvironmentResult<Box<dyn Environment>> + Send + 'static,
    {
        self.on_affinity(None, move |state| {
            if state.environment.is_some() {
                if let Err(e) = state.close_project() {
                    warn!(error = %e, "failed to close project of previous session");
                }
                state.environment = None;
            }
            let environment = connect()?;
            let version = environment.version();
            state.environment = Some(environment);
            info!(%version, "environment session attached");
            Ok(version)
        })
        .await
    }

    /// Close any open project and drop the session. No-op when detached.
    pub async fn detach(&self) -> Result<()> {
        self.on_affinity(None, |state| {
            if state.environment.is_none() {
                return Ok(());
            }
            let closed = state.close_project();
            state.project = None;
            state.environment = None;
            info!("environment session detached");
            closed
        })
        .await
    }

    /// Open `path` in the attached environment, closing the current project.
    pub async fn open_project(&self, path: impl Into<PathBuf>) -> Result<ProjectInfo> {
        let path = path.into();
        self.on_affinity(None, move |state| {
            state.close_project()?;
            let project = state.environment()?.open_project(&path)?;
            info!(project = %project.name, path = %project.path.display(), "project opened");
            state.project = Some(project.clone());
            Ok(project)
        })
        .await
    }

    pub async fn close_project(&self) -> Result<()> {
        self.on_affinity(None, |state| {
            state.environment()?;
            state.close_project()
        })
        .await
    }

    pub async fn current_project(&self) -> Result<Option<ProjectInfo>> {
        self.on_affinity(None, |state| Ok(state.project.clone())).await
    }

    pub async fn environment_version(&self) -> Result<String> {
        self.on_affinity(None, |state| Ok(state.environment()?.version()))
            .await
    }

    /// List the open project's artifacts admitted by `filter`.
    ///
    /// The result is filtered again on this side, free of duplicate
    /// logical keys, and in processing order, whatever the provider
    /// returned.
    pub async fn scan(&self, filter: FilterProfile) -> Result<Vec<ArtifactDescriptor>> {
        let profile = filter.clone();
        let descriptors = self
            .with_environment(None, move |env| env.scan(&profile))
            .await??;

        let mut seen = HashSet::new();
        let mut result: Vec<ArtifactDescriptor> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if !filter.matches(&descriptor) {
                continue;
            }
            if !seen.insert(descriptor.logical_key().to_string()) {
                warn!(artifact = %descriptor, "inventory returned a duplicate artifact, ignoring");
                continue;
            }
            result.push(descriptor);
        }
        sort_for_processing(&mut result);
        debug!(count = result.len(), "inventory scanned");
        Ok(result)
    }

    /// Run `f` against the environment of the open project.
    ///
    /// Fails with [`Error::NoSession`] or [`Error::NoProject`] when the
    /// precondition is not met, and with an executor error when the work
    /// was cancelled or could not be queued.
    pub(crate) async fn with_environment<F, T>(
        &self,
        cancel: Option<CancellationToken>,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut dyn Environment) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.on_affinity(cancel, move |state| Ok(f(state.project_environment()?)))
            .await
    }
}
