//! Structured error taxonomy for the processing engine.
//!
//! Every failure the core surfaces is a single [`EngineError`] carrying the
//! component that raised it, the operation in progress, a classification
//! ([`ErrorKind`]), an optional wrapped cause, a free-form context map, a
//! timestamp, and a `retryable` flag derived from the kind. Collaborator
//! layers (retry decorators, circuit breakers) consult `retryable` rather
//! than matching on `kind` directly.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use thiserror::Error;

use crate::core::cancel::CancelCause;

/// The subsystem that raised an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Provider,
    Processor,
    Formatter,
    Output,
    Engine,
    Factory,
    Registry,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Classification of an [`EngineError`].
///
/// Kinds are names, not types: downstream consumers switch on `kind` rather
/// than downcasting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record failed a validator. The offending position/field live in
    /// `context`.
    Validation,
    /// A parameter was missing, malformed, or out of range.
    Configuration,
    /// A transient dependency failure; the collaborator layer may retry.
    Transient,
    /// A definite failure that will not succeed on retry.
    Permanent,
    /// A resource limit was hit (memory, disk, quota).
    Resource,
    /// The cancel token fired, subcategorized by cause.
    Canceled(CancelCause),
    /// Aggregate of multiple errors from a best-effort teardown.
    Multi,
}

/// A single structured error produced anywhere in the engine.
#[derive(Debug, Clone, Error)]
#[error("[{component:?}] {operation}: {kind:?}")]
pub struct EngineError {
    pub component: Component,
    pub operation: String,
    pub kind: ErrorKind,
    #[source]
    pub cause: Option<Box<EngineError>>,
    pub context: BTreeMap<String, String>,
    pub timestamp: SystemTime,
    pub retryable: bool,
    /// Populated only for `ErrorKind::Multi`; the underlying error list for
    /// chain traversal.
    pub multi: Vec<EngineError>,
}

impl EngineError {
    pub fn new(component: Component, operation: impl Into<String>, kind: ErrorKind) -> Self {
        let retryable = Self::retryable_kind(&kind);
        Self {
            component,
            operation: operation.into(),
            kind,
            cause: None,
            context: BTreeMap::new(),
            timestamp: SystemTime::now(),
            retryable,
            multi: Vec::new(),
        }
    }

    pub fn with_cause(mut self, cause: EngineError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn validation(operation: impl Into<String>) -> Self {
        Self::new(Component::Processor, operation, ErrorKind::Validation)
    }

    pub fn configuration(component: Component, operation: impl Into<String>) -> Self {
        Self::new(component, operation, ErrorKind::Configuration)
    }

    pub fn permanent(component: Component, operation: impl Into<String>) -> Self {
        Self::new(component, operation, ErrorKind::Permanent)
    }

    pub fn transient(component: Component, operation: impl Into<String>) -> Self {
        Self::new(component, operation, ErrorKind::Transient)
    }

    pub fn resource(component: Component, operation: impl Into<String>) -> Self {
        Self::new(component, operation, ErrorKind::Resource)
    }

    pub fn canceled(operation: impl Into<String>, cause: CancelCause) -> Self {
        Self::new(Component::Engine, operation, ErrorKind::Canceled(cause))
    }

    /// Aggregates a best-effort teardown's errors into one `multi` error.
    /// Exposes the underlying list via `multi` for chain traversal.
    pub fn multi(errors: Vec<EngineError>) -> Self {
        let mut err = Self::new(Component::Engine, "close", ErrorKind::Multi);
        err.context.insert("count".into(), errors.len().to_string());
        err.multi = errors;
        err
    }

    /// Default retryability for a kind, per the engine's classification
    /// table: true only for transient failures and for cancellations caused
    /// by an outer deadline (which an outer retry loop may legitimately
    /// re-attempt), false otherwise.
    pub fn retryable_kind(kind: &ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::Transient | ErrorKind::Canceled(CancelCause::DeadlineExceeded)
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_derives_from_kind() {
        let transient = EngineError::transient(Component::Provider, "fetch");
        assert!(transient.is_retryable());

        let permanent = EngineError::permanent(Component::Processor, "filter");
        assert!(!permanent.is_retryable());

        let deadline = EngineError::canceled("process", CancelCause::DeadlineExceeded);
        assert!(deadline.is_retryable());

        let canceled = EngineError::canceled("process", CancelCause::Canceled);
        assert!(!canceled.is_retryable());
    }

    #[test]
    fn multi_exposes_underlying_errors() {
        let a = EngineError::permanent(Component::Processor, "a");
        let b = EngineError::permanent(Component::Processor, "b");
        let multi = EngineError::multi(vec![a, b]);
        assert_eq!(multi.multi.len(), 2);
        assert_eq!(multi.context.get("count").map(String::as_str), Some("2"));
    }

    #[test]
    fn context_and_cause_chain() {
        let cause = EngineError::transient(Component::Provider, "dial");
        let err = EngineError::permanent(Component::Processor, "process")
            .with_context("position", "3")
            .with_cause(cause);
        assert_eq!(err.context.get("position").map(String::as_str), Some("3"));
        assert!(err.cause.is_some());
    }
}
