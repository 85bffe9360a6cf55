//! Out-of-scope collaborator interfaces.
//!
//! Concrete data sources, output encodings, and sinks are explicitly not
//! this crate's concern — these traits exist only as the seam a caller's
//! own implementations plug into, so a [`crate::core::processor::Processor`]
//! chain can be wired to real I/O without the engine knowing what kind.

use crate::core::cancel::CancelToken;
use crate::core::processor::BoxFuture;
use crate::core::record::Batch;
use crate::error::EngineError;

/// Produces a batch of records, e.g. from a file, queue, or database.
pub trait Provider: Send + Sync {
    fn fetch<'a>(&'a self, token: &'a CancelToken) -> BoxFuture<'a, Result<Batch, EngineError>>;
}

/// Encodes a batch of records into a wire or file format.
pub trait Formatter: Send + Sync {
    fn format<'a>(&'a self, token: &'a CancelToken, batch: &'a Batch) -> BoxFuture<'a, Result<Vec<u8>, EngineError>>;
}

/// Delivers encoded bytes to a destination, e.g. a file, socket, or bucket.
pub trait Output: Send + Sync {
    fn send<'a>(&'a self, token: &'a CancelToken, bytes: &'a [u8]) -> BoxFuture<'a, Result<(), EngineError>>;
}
