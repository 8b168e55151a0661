//! One-shot result delivery for submitted work

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::ExecutorError;

type Outcome<T> = Result<T, ExecutorError>;

/// Sending half shared by the worker and the waiting caller.
///
/// Whoever completes first wins; every later attempt is a no-op. This is
/// what lets cancellation race with normal completion safely.
pub(crate) struct CompletionSlot<T> {
    sender: Mutex<Option<oneshot::Sender<Outcome<T>>>>,
}

impl<T> CompletionSlot<T> {
    fn new(sender: oneshot::Sender<Outcome<T>>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Deliver `outcome`. Returns `false` if the slot was already completed.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                // The receiver may already be gone; that is not an error here.
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Pending result of work submitted to an
/// [`AffinityExecutor`](super::AffinityExecutor).
///
/// Await it directly (`completion.await`) or via [`Completion::wait`].
/// Dropping it does not cancel the work.
#[must_use = "work still runs, but its result is lost unless awaited"]
pub struct Completion<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
    // Weak so that dropping unrun work closes the channel.
    slot: Weak<CompletionSlot<T>>,
    cancel: Option<CancellationToken>,
}

impl<T> Completion<T> {
    pub(crate) fn channel(cancel: Option<CancellationToken>) -> (Arc<CompletionSlot<T>>, Self) {
        let (sender, receiver) = oneshot::channel();
        let slot = Arc::new(CompletionSlot::new(sender));
        let completion = Self {
            receiver,
            slot: Arc::downgrade(&slot),
            cancel,
        };
        (slot, completion)
    }

    /// A completion that is already resolved with `error`.
    pub(crate) fn rejected(error: ExecutorError) -> Self {
        let (slot, completion) = Self::channel(None);
        slot.complete(Err(error));
        completion
    }

    /// Wait for the work's result.
    ///
    /// With a cancellation token attached, returns
    /// [`ExecutorError::Cancelled`] as soon as the token fires. Work that
    /// has not started yet is then never run; work already running is left
    /// to finish and its result is discarded.
    pub async fn wait(self) -> Outcome<T> {
        let Completion {
            receiver,
            slot,
            cancel,
        } = self;

        let Some(token) = cancel else {
            return receiver.await.unwrap_or(Err(ExecutorError::Dropped));
        };

        tokio::select! {
            biased;
            result = receiver => result.unwrap_or(Err(ExecutorError::Dropped)),
            _ = token.cancelled() => {
                if let Some(slot) = slot.upgrade() {
                    slot.complete(Err(ExecutorError::Cancelled));
                }
                Err(ExecutorError::Cancelled)
            }
        }
    }
}

impl<T: Send + 'static> IntoFuture for Completion<T> {
    type Output = Outcome<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Outcome<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
