//! The dynamic record model the engine operates on.
//!
//! Records are untyped on purpose: the engine has no notion of a domain
//! schema, only a tagged-sum [`Value`] and a sorted [`Record`] map of named
//! fields. Strategies and processors are the layer that gives records
//! meaning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single dynamically-typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// A type-tagged canonical string form used for hashing and ordering.
    /// The type tag prevents `Int(1)` and `String("1")` from colliding.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(i) => format!("i:{i}"),
            Value::Float(f) => format!("f:{f}"),
            Value::String(s) => format!("s:{s}"),
        }
    }
}

/// A record is a sorted map of named fields. `BTreeMap` keeps iteration
/// order deterministic, which the dedup/aggregate digest relies on.
pub type Record = BTreeMap<String, Value>;

/// A batch is an ordered sequence of records.
pub type Batch = Vec<Record>;

/// Builds the canonical key string for a record, either over an explicit
/// ordered field list or over every field in sorted key order.
pub fn canonical_key(record: &Record, fields: Option<&[String]>) -> String {
    let mut parts = Vec::new();
    match fields {
        Some(keys) => {
            for key in keys {
                let value = record.get(key).unwrap_or(&Value::Null);
                parts.push(format!("{key}={}", value.canonical()));
            }
        }
        None => {
            for (key, value) in record.iter() {
                parts.push(format!("{key}={}", value.canonical()));
            }
        }
    }
    parts.join("\u{1f}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn canonical_distinguishes_type() {
        let a = record(&[("id", Value::Int(1))]);
        let b = record(&[("id", Value::String("1".to_string()))]);
        assert_ne!(canonical_key(&a, None), canonical_key(&b, None));
    }

    #[test]
    fn canonical_field_subset_is_order_stable() {
        let rec = record(&[
            ("b", Value::Int(2)),
            ("a", Value::Int(1)),
            ("c", Value::Int(3)),
        ]);
        let fields = vec!["a".to_string(), "c".to_string()];
        assert_eq!(canonical_key(&rec, Some(&fields)), "a=i:1\u{1f}c=i:3");
    }
}
