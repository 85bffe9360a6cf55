//! Cooperative cancellation.
//!
//! [`CancelToken`] wraps a [`tokio_util::sync::CancellationToken`] with a
//! cause flag so a canceled operation can report *why* it stopped:
//! caller-initiated cancellation or an expired deadline. Every long-running
//! operation in the engine takes a `&CancelToken` and is expected to check
//! it at sub-second granularity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// Why a [`CancelToken`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The token was canceled directly, by the caller or by a sibling
    /// worker's first-error policy.
    Canceled,
    /// A deadline set with [`CancelToken::with_deadline`] elapsed.
    DeadlineExceeded,
}

/// A cloneable cancellation handle shared across a processor chain and the
/// tasks a worker pool spawns on its behalf.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: CancellationToken,
    deadline_exceeded: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
            deadline_exceeded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a token that cancels itself after `duration` elapses, with
    /// [`CancelCause::DeadlineExceeded`].
    pub fn with_deadline(duration: Duration) -> Self {
        let token = Self::new();
        let inner = token.inner.clone();
        let flag = token.deadline_exceeded.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    flag.store(true, Ordering::SeqCst);
                    inner.cancel();
                }
                _ = inner.cancelled() => {}
            }
        });
        token
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn cause(&self) -> Option<CancelCause> {
        if !self.is_canceled() {
            return None;
        }
        if self.deadline_exceeded.load(Ordering::SeqCst) {
            Some(CancelCause::DeadlineExceeded)
        } else {
            Some(CancelCause::Canceled)
        }
    }

    /// A derived token: cancelling it does not cancel `self`, but cancelling
    /// `self` cancels it. Used by the worker pool's first-error policy so a
    /// single chunk's failure can tear down its siblings without reaching
    /// back into the caller's own token.
    pub fn child_token(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.child_token(),
            deadline_exceeded: self.deadline_exceeded.clone(),
        }
    }

    /// Converts the current cancellation state into an [`EngineError`]. Only
    /// meaningful once `is_canceled()` is true; otherwise the cause defaults
    /// to plain `Canceled`.
    pub fn to_error(&self) -> EngineError {
        EngineError::canceled("cancel", self.cause().unwrap_or(CancelCause::Canceled))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
