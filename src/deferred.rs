//! Bridge from a single-shot completion callback to an awaitable result.
//!
//! [`deferred`] hands out a [`Completion`] for the producer and a
//! [`Promise`] for the consumer. The completion settles the promise at most
//! once; every later attempt is ignored.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

/// Failures produced by the bridge itself, never by the operation.
#[derive(Debug, Error)]
pub enum DeferredError {
    #[error("execution finished without completing its result")]
    Abandoned,
    #[error("promise polled after it already resolved")]
    Consumed,
}

type Slot<T> = Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>;

/// Create a linked completion/promise pair.
pub fn deferred<T>() -> (Completion<T>, Promise<T>) {
    let (tx, rx) = oneshot::channel();
    let completion = Completion {
        slot: Arc::new(Mutex::new(Some(tx))),
    };
    let promise = Promise {
        state: State::Pending(rx),
    };
    (completion, promise)
}

/// Producer side. Consumed on use, so each handle settles at most once.
pub struct Completion<T> {
    slot: Slot<T>,
}

impl<T> Completion<T> {
    /// Settle with either outcome. The error value is delivered unchanged.
    pub fn complete(self, result: Result<T>) {
        self.settle(result);
    }

    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: impl Into<anyhow::Error>) {
        self.settle(Err(error.into()));
    }

    /// Whether the linked promise has already been settled.
    pub fn is_settled(&self) -> bool {
        self.lock().is_none()
    }

    /// Another handle on the same slot, used to settle when the producer fails
    /// before it gets the chance to.
    pub(crate) fn share(&self) -> Completion<T> {
        Completion {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Returns true if this call settled the promise.
    pub(crate) fn settle(&self, result: Result<T>) -> bool {
        match self.lock().take() {
            // A dropped promise just discards the value.
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<Result<T>>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum State<T> {
    Pending(oneshot::Receiver<Result<T>>),
    Ready(Option<Result<T>>),
    Done,
}

/// Consumer side. Resolves exactly once to the value or error passed to the
/// completion.
pub struct Promise<T> {
    state: State<T>,
}

// The value is only ever moved out, never pinned.
impl<T> Unpin for Promise<T> {}

impl<T> Promise<T> {
    /// An already fulfilled promise.
    pub fn resolved(value: T) -> Self {
        Self {
            state: State::Ready(Some(Ok(value))),
        }
    }

    /// An already rejected promise.
    pub fn rejected(error: impl Into<anyhow::Error>) -> Self {
        Self {
            state: State::Ready(Some(Err(error.into()))),
        }
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match &mut this.state {
            State::Ready(value) => value
                .take()
                .unwrap_or_else(|| Err(DeferredError::Consumed.into())),
            State::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(result)) => result,
                Poll::Ready(Err(_)) => {
                    warn!("completion dropped before settling its promise");
                    Err(DeferredError::Abandoned.into())
                }
            },
            State::Done => Err(DeferredError::Consumed.into()),
        };
        this.state = State::Done;
        Poll::Ready(output)
    }
}
