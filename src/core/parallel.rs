//! The parallel processor: the engine's centerpiece.
//!
//! Wraps an arbitrary [`Processor`] and runs it concurrently over chunks of
//! an incoming batch, using a [`WorkerPool`] to fan out and reassemble
//! results in input order before forwarding to its own successor.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::cancel::CancelToken;
use crate::core::chunk::{partition, WorkResult};
use crate::core::pool::WorkerPool;
use crate::core::processor::{BoxFuture, Processor, Successor};
use crate::core::record::Batch;
use crate::error::{Component, EngineError};

/// Tunables for a [`ParallelProcessor`]. `chunk_size` of 0 means "compute
/// automatically"; see [`auto_chunk_size`].
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub workers: usize,
    pub chunk_size: usize,
    pub min_chunk_size: usize,
    /// Reserved: always behaves as `true` in this version regardless of the
    /// value set here. Recognized by `configure` and the builder so callers
    /// and config files naming it don't fail, ahead of a future version that
    /// wires it to `WorkerPool::process_chunks_ordered`.
    pub ordered_results: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { workers, chunk_size: 0, min_chunk_size: 100, ordered_results: true }
    }
}

/// Computes the per-chunk size used when `config.chunk_size` is 0:
/// `max(floor(batch_len / (2 * workers)), min_chunk_size, 1)`.
pub fn auto_chunk_size(batch_len: usize, workers: usize, min_chunk_size: usize) -> usize {
    let workers = workers.max(1);
    let computed = batch_len / (2 * workers);
    computed.max(min_chunk_size).max(1)
}

pub struct ParallelProcessor {
    id: Uuid,
    name: String,
    wrapped: Arc<dyn Processor>,
    pool: RwLock<Arc<WorkerPool>>,
    config: RwLock<ParallelConfig>,
    successor: Successor,
}

impl ParallelProcessor {
    fn new(name: String, wrapped: Arc<dyn Processor>, config: ParallelConfig) -> Result<Self, EngineError> {
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            wrapped,
            pool: RwLock::new(Arc::new(pool)),
            config: RwLock::new(config),
            successor: Successor::new(),
        })
    }

    /// Correlation id for this processor's log lines, independent of its
    /// human-readable `name`.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn workers(&self) -> usize {
        self.config.read().await.workers
    }

    pub async fn chunk_size(&self) -> usize {
        self.config.read().await.chunk_size
    }

    /// Replaces the tunables, rebuilding the worker pool if the worker
    /// count changed. Must not be called concurrently with `process`.
    pub async fn configure(&self, params: &HashMap<String, String>) -> Result<(), EngineError> {
        let mut config = self.config.read().await.clone();
        if let Some(v) = params.get("workers") {
            config.workers = parse_positive(v, "workers")?;
        }
        if let Some(v) = params.get("chunk_size") {
            config.chunk_size = parse_nonnegative(v, "chunk_size")?;
        }
        if let Some(v) = params.get("min_chunk_size") {
            config.min_chunk_size = parse_positive(v, "min_chunk_size")?;
        }
        if let Some(v) = params.get("ordered_results") {
            config.ordered_results = v.parse().map_err(|_| {
                EngineError::configuration(Component::Engine, "parallel.configure")
                    .with_context("ordered_results", v)
            })?;
        }

        let workers_changed = config.workers != self.config.read().await.workers;
        if workers_changed {
            let pool = WorkerPool::new(config.workers)?;
            *self.pool.write().await = Arc::new(pool);
        }
        *self.config.write().await = config;
        Ok(())
    }
}

fn parse_positive(raw: &str, field: &str) -> Result<usize, EngineError> {
    let value: usize = raw
        .parse()
        .map_err(|_| EngineError::configuration(Component::Engine, "parallel.configure").with_context(field, raw))?;
    if value == 0 {
        return Err(EngineError::configuration(Component::Engine, "parallel.configure").with_context(field, raw));
    }
    Ok(value)
}

fn parse_nonnegative(raw: &str, field: &str) -> Result<usize, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::configuration(Component::Engine, "parallel.configure").with_context(field, raw))
}

impl Processor for ParallelProcessor {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            // 1. Cancellation is checked before any other work.
            if token.is_canceled() {
                return Err(token.to_error());
            }
            // 2. Empty input bypasses chunking entirely.
            if batch.is_empty() {
                return self.successor.forward(token, batch).await;
            }

            let config = self.config.read().await.clone();

            // 3. Small-batch bypass: below min_chunk_size, run inline.
            if batch.len() < config.min_chunk_size {
                debug!(
                    "{}[{}]: batch of {} below min_chunk_size, running inline",
                    self.name,
                    self.id,
                    batch.len()
                );
                let result = self.wrapped.process(token, batch).await?;
                return self.successor.forward(token, result).await;
            }

            // 4. Chunk-size policy.
            let chunk_size = if config.chunk_size > 0 {
                config.chunk_size
            } else {
                auto_chunk_size(batch.len(), config.workers, config.min_chunk_size)
            };

            // 5. Chunk construction.
            let chunks = partition(batch, chunk_size);

            // 6. Dispatch through the worker pool. `ordered_results` is
            // reserved (always true in this version): dispatch always asks
            // the pool for index-ordered results regardless of its value.
            let pool = self.pool.read().await.clone();
            let wrapped = self.wrapped.clone();
            let results = pool
                .process_chunks_ordered(token, chunks, true, move |chunk_token, chunk| {
                    let wrapped = wrapped.clone();
                    async move {
                        let data = wrapped.process(&chunk_token, chunk.data).await?;
                        Ok(WorkResult { data, index: chunk.index })
                    }
                })
                .await
                .map_err(|cause| {
                    EngineError::new(cause.component, "parallel process", cause.kind.clone())
                        .with_cause(cause)
                })?;

            // 7. Index-ordered reassembly (the pool already sorts by index).
            let mut reassembled = Batch::new();
            for result in results {
                reassembled.extend(result.data);
            }

            // 8. Forward to successor.
            self.successor.forward(token, reassembled).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }

    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.pool.read().await.close();
            self.wrapped.close().await
        })
    }
}

pub struct ParallelProcessorBuilder {
    name: Option<String>,
    wrapped: Option<Arc<dyn Processor>>,
    config: ParallelConfig,
}

impl ParallelProcessorBuilder {
    pub fn new() -> Self {
        Self { name: None, wrapped: None, config: ParallelConfig::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.wrapped = Some(processor);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.config.min_chunk_size = min_chunk_size;
        self
    }

    pub fn ordered_results(mut self, ordered_results: bool) -> Self {
        self.config.ordered_results = ordered_results;
        self
    }

    pub fn build(self) -> Result<ParallelProcessor, EngineError> {
        let wrapped = self.wrapped.ok_or_else(|| {
            EngineError::configuration(Component::Engine, "parallel.build")
                .with_context("reason", "wrapped processor is required")
        })?;
        let name = self.name.unwrap_or_else(crate::core::build_name);
        ParallelProcessor::new(name, wrapped, self.config)
    }
}

impl Default for ParallelProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
