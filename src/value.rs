//! The domain of values a segment column or cell can hold.
//!
//! Covers the set of primitive types a provider round-trips: integer, long,
//! double, boolean, string, plus a NULL sentinel. `Value` is `Ord` so it can
//! live in a sorted set — NULL sorts last by convention, and doubles compare
//! via `f64::total_cmp` so the type can be `Eq`/`Hash` without pretending NaN
//! doesn't exist.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single cell/predicate value. Deliberately small and `Copy`-ish (the
/// `String` variant aside) since these are compared and hashed constantly
/// while building segment keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    String(String),
    /// The domain-defined NULL sentinel. Not Rust's `Option::None` — NULL is
    /// itself a storable, orderable value in this domain.
    Null,
}

impl Value {
    /// Fixed rank used to order values of different types deterministically.
    /// NULL sorts last, by convention.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Long(_) => 1,
            Value::Double(_) => 2,
            Value::Bool(_) => 3,
            Value::String(_) => 4,
            Value::Null => 5,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used as key material for `SegmentHeader::unique_id`.
    pub fn textual_form(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Double(v) => format!("{v:?}"),
            Value::Bool(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Null => "\u{0}NULL\u{0}".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Null, Null) => Ordering::Equal,
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Null => {}
        }
    }
}
