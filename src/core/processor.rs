//! The processor chain contract.
//!
//! A [`Processor`] consumes a whole [`Batch`], does its work, and forwards
//! the result to a successor it was wired to at construction time via
//! [`Processor::set_next`]. The chain is linear: each processor holds at
//! most one successor, and a processor with no successor is the chain's
//! tail. `set_next` is not safe to call concurrently with `process`; chains
//! are wired once, before the first batch flows through them.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::core::cancel::CancelToken;
use crate::core::record::Batch;
use crate::error::{Component, EngineError};

/// A boxed, `Send` future, used instead of `async-trait` so `Processor` stays
/// a plain, dependency-free trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Every processor in this crate owns its data outright (no borrowed
/// fields), which `close_with`'s default relies on to spawn `close()` onto
/// its own task.
pub trait Processor: Send + Sync + 'static {
    /// Runs this processor's work over `batch`, then forwards the result to
    /// the successor (if any). Implementations must check `token` before
    /// doing any non-trivial work and periodically while iterating records.
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>>;

    /// Wires `next` as this processor's successor. Not safe to call while a
    /// `process` call is in flight.
    fn set_next(&self, next: Arc<dyn Processor>);

    /// Releases any resources this processor holds. The default is a no-op;
    /// composite processors (the parallel processor, wrappers around a
    /// closeable collaborator) override it to tear down what they own and
    /// must make repeat calls idempotent.
    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async { Ok(()) })
    }

    /// Runs `close` on its own task and races it against `token`. If `token`
    /// fires first, this returns the cancellation error immediately, but the
    /// spawned `close()` call keeps running to completion in the background
    /// rather than being dropped mid-teardown — `close` itself is never
    /// aborted, only the caller's wait for it.
    ///
    /// Takes `self` behind an `Arc` so the spawned task can own a handle that
    /// outlives this call; every processor in this crate is already held
    /// behind `Arc<dyn Processor>` wherever it is wired into a chain.
    fn close_with(self: Arc<Self>, token: CancelToken) -> BoxFuture<'static, Result<(), EngineError>> {
        Box::pin(async move {
            let handle = tokio::spawn(async move { self.close().await });
            tokio::select! {
                _ = token.cancelled() => Err(token.to_error()),
                joined = handle => match joined {
                    Ok(res) => res,
                    Err(join_err) => Err(EngineError::permanent(Component::Engine, "processor.close_with")
                        .with_context("reason", join_err.to_string())),
                },
            }
        })
    }
}

/// Holds a processor's successor slot. Locking is momentary: callers must
/// never hold the guard across an `.await`.
#[derive(Default)]
pub struct Successor(Mutex<Option<Arc<dyn Processor>>>);

impl Successor {
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    pub fn set(&self, next: Arc<dyn Processor>) {
        *self.0.lock().expect("successor lock poisoned") = Some(next);
    }

    pub fn get(&self) -> Option<Arc<dyn Processor>> {
        self.0.lock().expect("successor lock poisoned").clone()
    }

    pub async fn forward(&self, token: &CancelToken, batch: Batch) -> Result<Batch, EngineError> {
        match self.get() {
            Some(next) => next.process(token, batch).await,
            None => Ok(batch),
        }
    }
}

/// A processor that forwards its input unchanged. Used as an explicit chain
/// tail and as the default wrapped processor in builder defaults.
#[derive(Default)]
pub struct NoopProcessor {
    successor: Successor,
}

impl NoopProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor for NoopProcessor {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }
            self.successor.forward(token, batch).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}
