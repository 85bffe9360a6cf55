//! Positional chunks handed to and returned from the worker pool.

use std::collections::VecDeque;

use crate::core::record::{Batch, Record};

/// A contiguous slice of an input batch, tagged with its position so the
/// worker pool can reassemble results in order regardless of completion
/// order.
#[derive(Debug)]
pub struct WorkChunk {
    pub data: Batch,
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// The output of processing one [`WorkChunk`].
#[derive(Debug)]
pub struct WorkResult {
    pub data: Batch,
    pub index: usize,
}

/// Splits `batch` into chunks of at most `chunk_size` records each,
/// preserving order. `chunk_size` is clamped to at least 1.
pub fn partition(batch: Batch, chunk_size: usize) -> Vec<WorkChunk> {
    let chunk_size = chunk_size.max(1);
    let mut remaining: VecDeque<Record> = batch.into();
    let mut chunks = Vec::with_capacity(remaining.len().div_ceil(chunk_size));
    let mut start = 0usize;
    let mut index = 0usize;
    while !remaining.is_empty() {
        let take = chunk_size.min(remaining.len());
        let data: Batch = remaining.drain(..take).collect();
        let end = start + data.len();
        chunks.push(WorkChunk { data, index, start, end });
        start = end;
        index += 1;
    }
    chunks
}
