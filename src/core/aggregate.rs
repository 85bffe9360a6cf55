//! Whole-batch processors: deduplication and grouped aggregation.
//!
//! Both operate over an entire batch at once and therefore cannot be
//! parallelized the way §4.1 strategies can — wrapping either of these in a
//! [`crate::core::parallel::ParallelProcessor`] would chunk the batch before
//! either gets to see it as a whole, silently breaking their semantics. The
//! core does not enforce this; it is a documented hazard, not a guard rail.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::core::cancel::CancelToken;
use crate::core::processor::{BoxFuture, Processor, Successor};
use crate::core::record::{canonical_key, Batch, Record, Value};
use crate::error::EngineError;

fn signature(record: &Record, fields: Option<&[String]>) -> String {
    let canonical = canonical_key(record, fields);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Drops every record after the first with a matching key signature.
/// `fields` restricts the key to a subset of fields; `None` hashes the
/// whole record.
pub struct Deduplicate {
    fields: Option<Vec<String>>,
    successor: Successor,
}

impl Deduplicate {
    pub fn new(fields: Option<Vec<String>>) -> Self {
        Self { fields, successor: Successor::new() }
    }
}

impl Processor for Deduplicate {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }
            let mut seen = std::collections::HashSet::new();
            let mut out = Vec::with_capacity(batch.len());
            for record in batch {
                let sig = signature(&record, self.fields.as_deref());
                if seen.insert(sig) {
                    out.push(record);
                }
            }
            self.successor.forward(token, out).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}

/// Aggregate functions available to an [`AggregateExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

/// A single named aggregate computed per group: `name = func(field)`.
#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub name: String,
    pub func: AggFunc,
    pub field: String,
}

impl AggregateExpr {
    pub fn new(name: impl Into<String>, func: AggFunc, field: impl Into<String>) -> Self {
        Self { name: name.into(), func, field: field.into() }
    }
}

/// Groups records by `group_by` and computes `aggregates` per group.
/// Non-numeric values in an aggregated field are skipped; `avg` over no
/// numeric values is `0.0`; `min`/`max` over no numeric values is `Null`.
/// Output groups are ordered by the canonical string form of the first
/// `group_by` field.
pub struct Aggregate {
    group_by: Vec<String>,
    aggregates: Vec<AggregateExpr>,
    successor: Successor,
}

impl Aggregate {
    pub fn new(group_by: Vec<String>, aggregates: Vec<AggregateExpr>) -> Self {
        Self { group_by, aggregates, successor: Successor::new() }
    }
}

impl Processor for Aggregate {
    fn process<'a>(&'a self, token: &'a CancelToken, batch: Batch) -> BoxFuture<'a, Result<Batch, EngineError>> {
        Box::pin(async move {
            if token.is_canceled() {
                return Err(token.to_error());
            }

            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, (Vec<Value>, Vec<&Record>)> = HashMap::new();

            for record in &batch {
                let key = canonical_key(record, Some(&self.group_by));
                groups
                    .entry(key.clone())
                    .or_insert_with(|| {
                        order.push(key.clone());
                        let values = self
                            .group_by
                            .iter()
                            .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
                            .collect();
                        (values, Vec::new())
                    })
                    .1
                    .push(record);
            }

            let mut out: Vec<Record> = Vec::with_capacity(order.len());
            for key in &order {
                let (group_values, records) = &groups[key];
                let mut result = Record::new();
                for (field, value) in self.group_by.iter().zip(group_values.iter()) {
                    result.insert(field.clone(), value.clone());
                }
                for expr in &self.aggregates {
                    let numeric: Vec<f64> = records.iter().filter_map(|r| r.get(&expr.field).and_then(Value::as_f64)).collect();
                    let value = match expr.func {
                        AggFunc::Count => Value::Int(records.len() as i64),
                        AggFunc::Sum => Value::Float(numeric.iter().sum()),
                        AggFunc::Avg => {
                            if numeric.is_empty() {
                                Value::Float(0.0)
                            } else {
                                Value::Float(numeric.iter().sum::<f64>() / numeric.len() as f64)
                            }
                        }
                        AggFunc::Min => numeric
                            .iter()
                            .cloned()
                            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
                            .map(Value::Float)
                            .unwrap_or(Value::Null),
                        AggFunc::Max => numeric
                            .iter()
                            .cloned()
                            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                            .map(Value::Float)
                            .unwrap_or(Value::Null),
                    };
                    result.insert(expr.name.clone(), value);
                }
                out.push(result);
            }

            out.sort_by(|a, b| {
                let ka = self.group_by.first().and_then(|f| a.get(f)).map(Value::canonical).unwrap_or_default();
                let kb = self.group_by.first().and_then(|f| b.get(f)).map(Value::canonical).unwrap_or_default();
                ka.cmp(&kb)
            });

            self.successor.forward(token, out).await
        })
    }

    fn set_next(&self, next: Arc<dyn Processor>) {
        self.successor.set(next);
    }
}
