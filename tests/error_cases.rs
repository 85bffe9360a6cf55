//! Universal invariants (P1-P8). P9 lives in core::aggregate's own unit
//! tests, the property being internal to that module's signature function.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::mocks::{MockCountingFilter, MockCountingValidator};
use parabatch_core::core::cancel::CancelToken;
use parabatch_core::core::chunk::WorkChunk;
use parabatch_core::core::parallel::{auto_chunk_size, ParallelProcessorBuilder};
use parabatch_core::core::pool::WorkerPool;
use parabatch_core::core::processor::{BoxFuture, NoopProcessor, Processor, Successor};
use parabatch_core::core::record::{Batch, Record, Value};
use parabatch_core::core::strategy::Filter;
use parabatch_core::core::wrappers::{FilterWrapper, ValidatorWrapper};
use parabatch_core::error::{Component, EngineError};

fn batch(n: usize) -> Batch {
    (0..n)
        .map(|i| {
            let mut r = Record::new();
            r.insert("value".to_string(), Value::Int(i as i64));
            r
        })
        .collect()
}

struct EvenFilter;
impl Filter for EvenFilter {
    fn keep(&self, record: &Record) -> bool {
        matches!(record.get("value"), Some(Value::Int(n)) if n % 2 == 0)
    }
}

/// Wraps a processor and records how many times `process` itself was
/// invoked — once per chunk dispatched through the pool, or exactly once
/// when the parallel processor's small-batch bypass runs it inline.
struct CountingProcessor {
    inner: Arc<dyn Processor>,
    calls: Arc<AtomicUsize>,
    successor: Successor,
}

impl CountingProcessor {
    fn new(inner: Arc<dyn Processor>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self { inner, calls: calls.clone(), successor: Successor::new() }),
            calls,
        )
    }
}

impl Processor for CountingProcessor {
    fn process<'a>(
        &'a self,
        token: &'a CancelToken,
        batch: Batch,
    ) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = self.inner.process(token, batch).await?;
            self.successor.forward(token, out).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}

// P1: parallel processing of a position-preserving filter equals running
// the same filter sequentially.
#[tokio::test]
async fn p1_parallel_equals_sequential_for_filter() {
    common::init_logging();
    let input = batch(777);

    let sequential = FilterWrapper::new("even", Arc::new(EvenFilter));
    let seq_token = CancelToken::new();
    let sequential_out = sequential.process(&seq_token, input.clone()).await.unwrap();

    let wrapped = Arc::new(FilterWrapper::new("even", Arc::new(EvenFilter)));
    let parallel = ParallelProcessorBuilder::new()
        .processor(wrapped)
        .workers(5)
        .min_chunk_size(7)
        .build()
        .unwrap();
    let par_token = CancelToken::new();
    let parallel_out = parallel.process(&par_token, input).await.unwrap();

    assert_eq!(sequential_out, parallel_out);
}

// P2: order is preserved — records derived from an earlier input position
// never appear after records derived from a later one.
#[tokio::test]
async fn p2_order_is_preserved() {
    common::init_logging();
    let input = batch(931);
    let wrapped = Arc::new(NoopProcessor::new());
    let parallel = ParallelProcessorBuilder::new()
        .processor(wrapped)
        .workers(6)
        .min_chunk_size(11)
        .build()
        .unwrap();
    let token = CancelToken::new();
    let out = parallel.process(&token, input.clone()).await.unwrap();
    assert_eq!(out, input);
}

// P3: close is idempotent; a second close succeeds with no error, as does
// close_with on an already-closed pool.
#[tokio::test]
async fn p3_close_is_idempotent() {
    common::init_logging();
    let wrapped = Arc::new(NoopProcessor::new());
    let parallel = ParallelProcessorBuilder::new().processor(wrapped).build().unwrap();

    parallel.close().await.unwrap();
    parallel.close().await.unwrap();

    let pool = WorkerPool::new(1).unwrap();
    pool.close();
    let token = CancelToken::new();
    pool.close_with(&token).await.unwrap();
}

// P4: at-most-once invocation — a mock filter sees exactly one call per
// record on success, across however many chunks the pool used.
#[tokio::test]
async fn p4_filter_called_exactly_once_per_record() {
    common::init_logging();
    let call_count = Arc::new(AtomicUsize::new(0));
    let counter = call_count.clone();
    let mut mock = MockCountingFilter::new();
    mock.expect_keep().returning(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });

    let wrapped = Arc::new(FilterWrapper::new("mock", Arc::new(mock)));
    let parallel = ParallelProcessorBuilder::new()
        .processor(wrapped)
        .workers(4)
        .min_chunk_size(10)
        .build()
        .unwrap();

    let token = CancelToken::new();
    let n = 500;
    parallel.process(&token, batch(n)).await.unwrap();

    assert_eq!(call_count.load(Ordering::SeqCst), n);
}

// P5: a token canceled mid-flight causes process to return a canceled
// error, not a successful partial batch.
#[tokio::test]
async fn p5_cancellation_yields_canceled_error() {
    common::init_logging();
    struct SlowFilter;
    impl Filter for SlowFilter {
        fn keep(&self, _record: &Record) -> bool {
            std::thread::sleep(std::time::Duration::from_millis(1));
            true
        }
    }

    let wrapped = Arc::new(FilterWrapper::new("slow", Arc::new(SlowFilter)));
    let parallel = ParallelProcessorBuilder::new()
        .processor(wrapped)
        .workers(2)
        .min_chunk_size(50)
        .build()
        .unwrap();

    let token = CancelToken::new();
    token.cancel();
    let result = parallel.process(&token, batch(5000)).await;
    assert!(result.is_err());
}

// P6: below min_chunk_size, the worker pool is never exercised — the
// wrapped processor's `process` runs exactly once, not once per chunk.
#[tokio::test]
async fn p6_small_batch_bypasses_pool() {
    common::init_logging();
    let (counting, calls) = CountingProcessor::new(Arc::new(NoopProcessor::new()));
    let parallel = ParallelProcessorBuilder::new()
        .processor(counting)
        .workers(4)
        .min_chunk_size(1000)
        .build()
        .unwrap();

    let token = CancelToken::new();
    parallel.process(&token, batch(50)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// P7: the chunk-size policy matches the documented formula exactly, and the
// resulting chunk count matches ceil(N / chunk_size).
#[tokio::test]
async fn p7_chunk_size_policy_matches_formula() {
    common::init_logging();
    let cases = [(1000usize, 4usize, 10usize), (50, 8, 100), (256, 2, 1)];
    for (n, workers, min_chunk_size) in cases {
        let chunk_size = auto_chunk_size(n, workers, min_chunk_size);
        let expected = (n / (2 * workers)).max(min_chunk_size).max(1);
        assert_eq!(chunk_size, expected);

        let chunks = parabatch_core::core::chunk::partition(batch(n), chunk_size);
        let expected_chunk_count = n.div_ceil(chunk_size);
        assert_eq!(chunks.len(), expected_chunk_count);
    }
}

// P8: given some failing chunks and some passing, the pool's returned error
// is a failure (the first dispatched to fail) and no partial batch leaks.
#[tokio::test]
async fn p8_first_error_wins_no_partial_batch() {
    common::init_logging();
    let pool = WorkerPool::new(4).unwrap();
    let token = CancelToken::new();

    let chunks: Vec<WorkChunk> = (0..6)
        .map(|i| WorkChunk { data: Batch::new(), index: i, start: i, end: i + 1 })
        .collect();

    let result = pool
        .process_chunks(&token, chunks, |tok, chunk| async move {
            if chunk.index % 2 == 0 {
                return Err(EngineError::permanent(Component::Processor, "boom")
                    .with_context("index", chunk.index.to_string()));
            }
            tokio::time::sleep(std::time::Duration::from_millis(15)).await;
            if tok.is_canceled() {
                return Err(tok.to_error());
            }
            Ok(parabatch_core::core::chunk::WorkResult { data: chunk.data, index: chunk.index })
        })
        .await;

    assert!(result.is_err());
}

// Auxiliary coverage: validator wrapper surfaces a distinct EngineError per
// distinct validation failure message, with position and message both
// recoverable from context. P9 itself (distinct canonical keys yield
// distinct signatures) is tested directly against core::aggregate::signature
// in that module's own unit tests.
#[tokio::test]
async fn validator_failures_carry_distinguishable_position_and_message() {
    common::init_logging();
    let mut mock = MockCountingValidator::new();
    mock.expect_validate().returning(|record| match record.get("value") {
        Some(Value::Int(n)) if *n < 0 => {
            Some(parabatch_core::core::strategy::ValidationFailure::on_field("value", "negative"))
        }
        _ => None,
    });

    let validator = ValidatorWrapper::new("non_negative", Arc::new(mock));
    let token = CancelToken::new();
    let mut b = batch(3);
    b[1].insert("value".to_string(), Value::Int(-5));
    let err = validator.process(&token, b).await.unwrap_err();
    assert_eq!(err.context.get("position").map(String::as_str), Some("1"));
    assert_eq!(err.context.get("message").map(String::as_str), Some("negative"));
}
