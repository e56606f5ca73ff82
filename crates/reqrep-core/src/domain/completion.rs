//! # Completion Handle
//!
//! Single-resolution primitive behind every pending request.
//!
//! ```text
//! [PENDING] ──resolve(value)──→ [RESOLVED]
//!     │
//!     └──────cancel()─────────→ [CANCELLED]
//! ```
//!
//! The transition out of `PENDING` is a compare-and-swap, so exactly one
//! settle attempt wins. Every later attempt returns `false` and has no
//! effect. The resolved value travels to the waiter over a oneshot channel,
//! which makes resolution a non-blocking handoff.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;
const CANCELLED: u8 = 2;

/// Observable state of a [`CompletionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled without a value.
    Cancelled,
}

impl CompletionState {
    /// Whether this is a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Settling side of a pending outcome.
///
/// Shared between the pending-request table and the requester that created
/// it; whichever actor settles it first determines the outcome.
pub struct CompletionHandle<T> {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionHandle<T> {
    /// Create a pending handle and the future that observes it.
    #[must_use]
    pub fn new() -> (Arc<Self>, Completion<T>) {
        let (sender, receiver) = oneshot::channel();
        let handle = Arc::new(Self {
            state: AtomicU8::new(PENDING),
            sender: Mutex::new(Some(sender)),
        });
        (handle, Completion { receiver })
    }

    /// Settle with a value.
    ///
    /// Returns `false` if the handle was already settled; the value is then
    /// dropped.
    pub fn resolve(&self, value: T) -> bool {
        if !self.transition(RESOLVED) {
            return false;
        }
        if let Some(sender) = self.sender.lock().take() {
            // Waiter gone (request future dropped); the handle is still settled
            let _ = sender.send(value);
        }
        true
    }

    /// Settle without a value.
    ///
    /// Returns `false` if the handle was already settled.
    pub fn cancel(&self) -> bool {
        if !self.transition(CANCELLED) {
            return false;
        }
        self.sender.lock().take();
        true
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CompletionState {
        match self.state.load(Ordering::Acquire) {
            PENDING => CompletionState::Pending,
            RESOLVED => CompletionState::Resolved,
            _ => CompletionState::Cancelled,
        }
    }

    /// Whether the handle has reached a terminal state.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state().is_terminal()
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl<T> std::fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Waiting side of a [`CompletionHandle`].
///
/// Resolves to `Some(value)` if the handle was resolved, `None` if it was
/// cancelled or dropped unsettled.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}
