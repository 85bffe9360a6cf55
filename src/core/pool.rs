//! Fixed-size worker pool driving the parallel processor's fan-out/fan-in.
//!
//! Concurrency is bounded by a [`tokio::sync::Semaphore`] sized to the
//! configured worker count rather than by spawning a fixed set of long-lived
//! tasks: one task is spawned per chunk, and the semaphore ensures at most
//! `workers` of them ever run at once. The first chunk task to fail cancels
//! a pool-derived token so its siblings stop promptly; the pool then returns
//! that first error and discards every partial result.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::core::cancel::CancelToken;
use crate::core::chunk::{WorkChunk, WorkResult};
use crate::error::{Component, EngineError};

pub struct WorkerPool {
    id: Uuid,
    workers: usize,
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Builds a pool with a fixed number of workers. `workers` must be at
    /// least 1.
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::configuration(Component::Engine, "worker_pool.new")
                .with_context("workers", "0"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Correlation id for this pool's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Runs `task` once per chunk, bounded to `workers` concurrent
    /// executions, and returns the results sorted by chunk index.
    ///
    /// Precedence, in order: an empty `chunks` list always returns `Ok(())`
    /// immediately, even on a closed pool; a closed pool otherwise rejects
    /// the call; a pre-canceled `token` is rejected next; only then does
    /// dispatch begin.
    pub async fn process_chunks<F, Fut>(
        &self,
        token: &CancelToken,
        chunks: Vec<WorkChunk>,
        task: F,
    ) -> Result<Vec<WorkResult>, EngineError>
    where
        F: Fn(CancelToken, WorkChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkResult, EngineError>> + Send + 'static,
    {
        self.process_chunks_ordered(token, chunks, true, task).await
    }

    /// As [`WorkerPool::process_chunks`], but lets the caller choose whether
    /// results come back sorted by chunk index (`ordered = true`) or in
    /// completion order (`ordered = false`) — the latter skips the final
    /// sort, trading reassembly order for returning finished work sooner to
    /// a caller that does not need position-preserving output.
    pub async fn process_chunks_ordered<F, Fut>(
        &self,
        token: &CancelToken,
        chunks: Vec<WorkChunk>,
        ordered: bool,
        task: F,
    ) -> Result<Vec<WorkResult>, EngineError>
    where
        F: Fn(CancelToken, WorkChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkResult, EngineError>> + Send + 'static,
    {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_closed() {
            return Err(EngineError::permanent(Component::Engine, "worker_pool.process_chunks")
                .with_context("reason", "pool closed"));
        }
        if token.is_canceled() {
            return Err(token.to_error());
        }

        let derived = token.child_token();
        let task = Arc::new(task);
        let mut joins = JoinSet::new();

        for chunk in chunks {
            if derived.is_canceled() {
                break;
            }
            let semaphore = self.semaphore.clone();
            let worker_token = derived.clone();
            let task = task.clone();
            joins.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(worker_token.to_error()),
                };
                if worker_token.is_canceled() {
                    return Err(worker_token.to_error());
                }
                task(worker_token.clone(), chunk).await
            });
        }

        let mut results = Vec::new();
        let mut first_error: Option<EngineError> = None;
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        warn!("worker pool {}: chunk failed, cancelling siblings: {err}", self.id);
                        derived.cancel();
                        first_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        derived.cancel();
                        first_error = Some(
                            EngineError::permanent(Component::Engine, "worker_pool.process_chunks")
                                .with_context("reason", join_err.to_string()),
                        );
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if derived.is_canceled() {
            return Err(token.to_error());
        }

        if ordered {
            results.sort_by_key(|r| r.index);
        }
        Ok(results)
    }

    /// Flips the pool to closed. Non-blocking: it does not wait for
    /// in-flight chunk tasks to finish, it only makes future
    /// `process_chunks` calls fail fast. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// As [`WorkerPool::close`], but returns a cancellation error instead if
    /// `token` is already canceled.
    pub async fn close_with(&self, token: &CancelToken) -> Result<(), EngineError> {
        if token.is_canceled() {
            return Err(token.to_error());
        }
        self.close();
        Ok(())
    }
}
