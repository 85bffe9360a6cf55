#![cfg_attr(docsrs, feature(doc_cfg))]
//#![warn(missing_docs)]

/*!
 <div align="center">
   <h1>parabatch-core</h1>
   <h3>Core of a parallel record-batch processing engine</h3>

   [![crate](https://img.shields.io/crates/v/parabatch-core.svg)](https://crates.io/crates/parabatch-core)
   [![docs](https://docs.rs/parabatch-core/badge.svg)](https://docs.rs/parabatch-core)
   ![license](https://shields.io/badge/license-MIT%2FApache--2.0-blue)

  </div>

 # parabatch-core

 This crate runs a pluggable, single-record operation — a filter, a
 validation, or a transform — concurrently over a large in-memory batch of
 records, while preserving input order and honoring cooperative
 cancellation. It composes into a linear chain with other processors so a
 parallel stage can sit alongside sequential ones (deduplication,
 aggregation) without either side knowing about the other's concurrency.

 ## Core Concepts

- **Record/Batch:** the dynamic, tagged-sum data model every processor operates on
- **Processor:** the chain contract — `process` a batch, `set_next` a successor
- **Strategy:** a narrow `Filter`/`Validator`/`Transformer` plugged into the chain via a wrapper
- **ParallelProcessor:** wraps a processor and fans its work out across a worker pool
- **WorkerPool:** the fixed-size, first-error-cancels executor behind a parallel processor
- **EngineError:** the structured error every fallible operation returns

 This crate does not parse configuration or a CLI, does not implement
 concrete data sources or sinks, does not encode output, and does not ship
 retry or circuit-breaker decorators — those are the concern of the code
 that wires a chain together, not of the chain itself.

 ## Quick Example

```rust
use std::sync::Arc;
use parabatch_core::core::cancel::CancelToken;
use parabatch_core::core::parallel::ParallelProcessorBuilder;
use parabatch_core::core::processor::Processor;
use parabatch_core::core::record::{Record, Value};
use parabatch_core::core::strategy::Filter;
use parabatch_core::core::wrappers::FilterWrapper;

struct EvenId;
impl Filter for EvenId {
    fn keep(&self, record: &Record) -> bool {
        matches!(record.get("id"), Some(Value::Int(n)) if n % 2 == 0)
    }
}

# #[tokio::main]
# async fn main() -> Result<(), parabatch_core::EngineError> {
let wrapped = Arc::new(FilterWrapper::new("even", Arc::new(EvenId)));
let parallel = ParallelProcessorBuilder::new()
    .processor(wrapped)
    .workers(4)
    .build()?;

let token = CancelToken::new();
let batch: Vec<Record> = (0..1000i64)
    .map(|i| [("id".to_string(), Value::Int(i))].into_iter().collect())
    .collect();
let out = parallel.process(&token, batch).await?;
assert!(out.len() <= 1000);
# Ok(())
# }
```
*/

/// Out-of-scope collaborator interfaces (`Provider`, `Formatter`, `Output`).
pub mod collaborators;

/// Core module: the parallel processing engine.
pub mod core;

/// Structured error taxonomy for the engine.
pub mod error;

#[doc(inline)]
pub use error::*;

/// Name-to-factory registries for collaborators and processors.
pub mod registry;
