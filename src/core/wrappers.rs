//! Adapters from §4.1 single-record strategies into the processor chain.
//!
//! Each wrapper iterates a batch record by record, rechecking the cancel
//! token every [`CANCEL_CHECK_INTERVAL`] records rather than on every single
//! one — the same periodic-bookkeeping shape the chunk-oriented step loop
//! uses for its own commit-interval checks.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::core::cancel::CancelToken;
use crate::core::processor::{BoxFuture, Processor, Successor};
use crate::core::record::Batch;
use crate::core::strategy::{Filter, Transformer, Validator};
use crate::error::{Component, EngineError};

/// Calls `configure` on `strategy` if it implements [`crate::core::strategy::Configurable`]
/// and `Arc::get_mut` can reach it — true for any `Arc` that hasn't been
/// cloned yet, which holds for every strategy a wrapper constructor receives
/// fresh from a caller.
fn configure_if_supported<T: ?Sized>(
    strategy: &mut Arc<T>,
    params: &HashMap<String, String>,
    as_configurable: impl FnOnce(&mut T) -> Option<&mut dyn crate::core::strategy::Configurable>,
) -> Result<(), EngineError> {
    if let Some(strategy) = Arc::get_mut(strategy) {
        if let Some(configurable) = as_configurable(strategy) {
            configurable.configure(params)?;
        }
    }
    Ok(())
}

/// How often, in records, a wrapper rechecks the cancel token while
/// iterating a batch.
pub const CANCEL_CHECK_INTERVAL: usize = 256;

fn cancel_check(token: &CancelToken, index: usize) -> Result<(), EngineError> {
    if index % CANCEL_CHECK_INTERVAL == 0 && token.is_canceled() {
        return Err(token.to_error());
    }
    Ok(())
}

/// Adapts a [`Filter`] into the processor chain.
pub struct FilterWrapper {
    name: String,
    filter: Arc<dyn Filter>,
    successor: Successor,
}

impl FilterWrapper {
    pub fn new(name: impl Into<String>, filter: Arc<dyn Filter>) -> Self {
        Self::with_config(name, filter, &HashMap::new())
            .expect("configuring with an empty parameter map cannot fail")
    }

    /// Like `new`, but if `filter` also implements
    /// [`crate::core::strategy::Configurable`], calls `configure(params)` on
    /// it before the wrapper is built.
    pub fn with_config(
        name: impl Into<String>,
        mut filter: Arc<dyn Filter>,
        params: &HashMap<String, String>,
    ) -> Result<Self, EngineError> {
        configure_if_supported(&mut filter, params, Filter::as_configurable)?;
        Ok(Self { name: name.into(), filter, successor: Successor::new() })
    }
}

impl Processor for FilterWrapper {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }
            let mut kept = Vec::with_capacity(batch.len());
            for (i, record) in batch.into_iter().enumerate() {
                cancel_check(token, i)?;
                let keep = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.filter.keep(&record)))
                    .map_err(|_| {
                        debug!("filter {} panicked at position {i}", self.name);
                        EngineError::permanent(Component::Processor, "filter")
                            .with_context("name", self.name.clone())
                            .with_context("position", i.to_string())
                    })?;
                if keep {
                    kept.push(record);
                }
            }
            self.successor.forward(token, kept).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}

/// Adapts a [`Validator`] into the processor chain. The first failing
/// record aborts the batch with a validation error carrying its position.
pub struct ValidatorWrapper {
    name: String,
    validator: Arc<dyn Validator>,
    successor: Successor,
}

impl ValidatorWrapper {
    pub fn new(name: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        Self::with_config(name, validator, &HashMap::new())
            .expect("configuring with an empty parameter map cannot fail")
    }

    /// Like `new`, but if `validator` also implements
    /// [`crate::core::strategy::Configurable`], calls `configure(params)` on
    /// it before the wrapper is built.
    pub fn with_config(
        name: impl Into<String>,
        mut validator: Arc<dyn Validator>,
        params: &HashMap<String, String>,
    ) -> Result<Self, EngineError> {
        configure_if_supported(&mut validator, params, Validator::as_configurable)?;
        Ok(Self { name: name.into(), validator, successor: Successor::new() })
    }
}

impl Processor for ValidatorWrapper {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }
            for (i, record) in batch.iter().enumerate() {
                cancel_check(token, i)?;
                if let Some(failure) = self.validator.validate(record) {
                    debug!("validator {} rejected position {i}: {}", self.name, failure.message);
                    let mut err = EngineError::validation("validate")
                        .with_context("name", self.name.clone())
                        .with_context("position", i.to_string())
                        .with_context("message", failure.message);
                    if let Some(field) = failure.field {
                        err = err.with_context("field", field);
                    }
                    return Err(err);
                }
            }
            self.successor.forward(token, batch).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}

/// Adapts a [`Transformer`] into the processor chain.
pub struct TransformWrapper {
    name: String,
    transformer: Arc<dyn Transformer>,
    successor: Successor,
}

impl TransformWrapper {
    pub fn new(name: impl Into<String>, transformer: Arc<dyn Transformer>) -> Self {
        Self::with_config(name, transformer, &HashMap::new())
            .expect("configuring with an empty parameter map cannot fail")
    }

    /// Like `new`, but if `transformer` also implements
    /// [`crate::core::strategy::Configurable`], calls `configure(params)` on
    /// it before the wrapper is built.
    pub fn with_config(
        name: impl Into<String>,
        mut transformer: Arc<dyn Transformer>,
        params: &HashMap<String, String>,
    ) -> Result<Self, EngineError> {
        configure_if_supported(&mut transformer, params, Transformer::as_configurable)?;
        Ok(Self { name: name.into(), transformer, successor: Successor::new() })
    }
}

impl Processor for TransformWrapper {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }
            let mut out = Vec::with_capacity(batch.len());
            for (i, record) in batch.into_iter().enumerate() {
                cancel_check(token, i)?;
                let transformed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.transformer.transform(&record)
                }))
                .map_err(|_| {
                    debug!("transformer {} panicked at position {i}", self.name);
                    EngineError::permanent(Component::Processor, "transform")
                        .with_context("name", self.name.clone())
                        .with_context("position", i.to_string())
                })?;
                out.push(transformed);
            }
            self.successor.forward(token, out).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}
