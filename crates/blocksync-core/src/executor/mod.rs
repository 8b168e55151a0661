//! Single-thread affinity executor
//!
//! Every call into the external environment must happen on one dedicated
//! thread, in submission order. [`AffinityExecutor`] owns that thread and
//! a FIFO queue in front of it; callers on any thread submit closures and
//! await a [`Completion`].
//!
//! Lifecycle: `Created -> Running -> Draining -> Stopped`. Shutdown never
//! discards queued work: the worker keeps dequeuing while draining and only
//! stops once the queue is empty.

mod completion;

pub use completion::Completion;

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default name of the affinity thread.
pub const DEFAULT_THREAD_NAME: &str = "blocksync-affinity";

/// Errors delivered through a [`Completion`] or returned by lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("work was cancelled before it started")]
    Cancelled,

    #[error("executor is shut down and accepts no new work")]
    ShutDown,

    #[error("executor queue is full")]
    QueueFull,

    #[error("work panicked: {message}")]
    Panicked { message: String },

    #[error("work was dropped before completing")]
    Dropped,

    #[error("affinity thread did not stop within the shutdown timeout")]
    ShutdownTimedOut,

    #[error("failed to spawn affinity thread: {message}")]
    Spawn { message: String },
}

/// Tuning for an [`AffinityExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Name given to the affinity thread (visible in logs and debuggers)
    pub thread_name: String,
    /// Maximum number of queued, not yet started work items
    pub queue_capacity: usize,
    /// How long `shutdown` waits for queued work to drain
    pub shutdown_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            queue_capacity: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle state of an [`AffinityExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    /// Accepting submissions and draining the queue
    Running,
    /// Rejecting submissions, finishing queued work
    Draining,
    Stopped,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    state: ExecutorState,
    jobs: VecDeque<Job>,
}

struct Shared {
    queue: Mutex<Queue>,
    /// Signalled on new work, on shutdown and when the worker stops.
    signal: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // Jobs never run under the lock, so a poisoned queue is still consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO executor bound to one dedicated thread.
///
/// Work never runs on the submitting thread. A panic inside work is
/// captured and delivered to that work's [`Completion`] only; the thread
/// keeps serving the queue.
pub struct AffinityExecutor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    config: ExecutorConfig,
}

impl std::fmt::Debug for AffinityExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityExecutor")
            .field("thread_name", &self.config.thread_name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl AffinityExecutor {
    /// Spawn the affinity thread and start accepting work.
    pub fn start(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                state: ExecutorState::Created,
                jobs: VecDeque::new(),
            }),
            signal: Condvar::new(),
        });

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker(shared)
            })
            .map_err(|e| ExecutorError::Spawn {
                message: e.to_string(),
            })?;
        let worker_id = handle.thread().id();

        shared.lock().state = ExecutorState::Running;
        info!(thread = %config.thread_name, capacity = config.queue_capacity, "affinity executor started");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
            worker_id,
            config,
        })
    }

    /// Start with [`ExecutorConfig::default`].
    pub fn with_defaults() -> Result<Self, ExecutorError> {
        Self::start(ExecutorConfig::default())
    }

    /// Queue `work` for the affinity thread.
    pub fn submit<F, T>(&self, work: F) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(work, None)
    }

    /// Queue `work`, skipping it if `cancel` fires before it is dequeued.
    ///
    /// Cancellation is cooperative: work that has already started runs to
    /// completion, but the caller stops waiting for it.
    pub fn submit_with_cancel<F, T>(&self, work: F, cancel: CancellationToken) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(work, Some(cancel))
    }

    fn enqueue<F, T>(&self, work: F, cancel: Option<CancellationToken>) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (slot, completion) = Completion::channel(cancel.clone());

        let job: Job = Box::new(move || {
            if slot.is_completed() {
                return;
            }
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                slot.complete(Err(ExecutorError::Cancelled));
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(%message, "work panicked on affinity thread");
                ExecutorError::Panicked { message }
            });
            slot.complete(outcome);
        });

        let mut queue = self.shared.lock();
        match queue.state {
            ExecutorState::Draining | ExecutorState::Stopped => {
                return Completion::rejected(ExecutorError::ShutDown);
            }
            ExecutorState::Created | ExecutorState::Running => {}
        }
        if queue.jobs.len() >= self.config.queue_capacity {
            return Completion::rejected(ExecutorError::QueueFull);
        }
        queue.jobs.push_back(job);
        drop(queue);

        self.shared.signal.notify_all();
        completion
    }

    /// Stop accepting work, let the queue drain, and join the thread.
    ///
    /// Idempotent. Called from the affinity thread itself it only flips the
    /// state to `Draining`, since a thread cannot join itself.
    pub fn shutdown(&self) -> Result<(), ExecutorError> {
        {
            let mut queue = self.shared.lock();
            if matches!(queue.state, ExecutorState::Created | ExecutorState::Running) {
                debug!(pending = queue.jobs.len(), "affinity executor draining");
                queue.state = ExecutorState::Draining;
            }
        }
        self.shared.signal.notify_all();

        if self.is_affinity_thread() {
            return Ok(());
        }

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = worker.take() else {
            return Ok(());
        };

        let queue = self.shared.lock();
        let (queue, wait) = self
            .shared
            .signal
            .wait_timeout_while(queue, self.config.shutdown_timeout, |q| {
                q.state != ExecutorState::Stopped
            })
            .unwrap_or_else(PoisonError::into_inner);
        let pending = queue.jobs.len();
        drop(queue);

        if wait.timed_out() {
            warn!(pending, timeout = ?self.config.shutdown_timeout, "affinity executor shutdown timed out");
            // Keep the handle so a later shutdown can still join.
            *worker = Some(handle);
            return Err(ExecutorError::ShutdownTimedOut);
        }

        handle.join().map_err(|payload| ExecutorError::Panicked {
            message: panic_message(payload.as_ref()),
        })?;
        info!(thread = %self.config.thread_name, "affinity executor stopped");
        Ok(())
    }

    pub fn state(&self) -> ExecutorState {
        self.shared.lock().state
    }

    /// Number of queued work items not yet started.
    pub fn pending(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    /// True when called from this executor's affinity thread.
    pub fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

impl Drop for AffinityExecutor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "affinity executor did not shut down cleanly");
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                if matches!(queue.state, ExecutorState::Draining | ExecutorState::Stopped) {
                    break None;
                }
                queue = shared
                    .signal
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        match job {
            Some(job) => job(),
            None => break,
        }
    }

    shared.lock().state = ExecutorState::Stopped;
    shared.signal.notify_all();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
