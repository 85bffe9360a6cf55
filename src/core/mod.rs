//! Core module: the parallel processing engine.
//!
//! This module contains the fundamental components of the engine:
//!
//! - **record**: the dynamic `Value`/`Record`/`Batch` data model
//! - **cancel**: cooperative cancellation via `CancelToken`
//! - **strategy**: narrow single-record `Filter`/`Validator`/`Transformer` traits
//! - **wrappers**: adapters from strategies into the processor chain
//! - **chunk**: positional `WorkChunk`/`WorkResult` types and batch partitioning
//! - **processor**: the linear chain contract (`Processor`, `NoopProcessor`)
//! - **pool**: the fixed-size worker pool behind the parallel processor
//! - **parallel**: `ParallelProcessor`, the concurrent fan-out/fan-in engine
//! - **aggregate**: whole-batch `Deduplicate`/`Aggregate` processors
//!
//! # Architecture
//!
//! A chain of [`processor::Processor`]s is wired together with
//! `set_next`, each holding at most one successor. A batch enters at the
//! head of the chain; each processor does its work and forwards the result
//! on. Any processor in the chain may be a [`parallel::ParallelProcessor`]
//! wrapping a strategy-derived leaf processor, in which case that stage runs
//! concurrently over chunks of the batch via a [`pool::WorkerPool`] before
//! forwarding, in order, to its own successor.
use rand::distr::{Alphanumeric, SampleString};

pub mod aggregate;
pub mod cancel;
pub mod chunk;
pub mod parallel;
pub mod pool;
pub mod processor;
pub mod record;
pub mod strategy;
pub mod wrappers;

/// Generates a random name consisting of alphanumeric characters.
///
/// Used internally to create default names for processors when not
/// explicitly provided.
pub(crate) fn build_name() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 8)
}
