//! `SegmentColumn` — an immutable `(columnExpression, value predicate)` pair
//! with a merge algebra.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::Xxh64;

use crate::value::Value;

const HASH_SEED: u64 = 0x517cc1b727220a95;

/// Either "every value matches" (wildcard) or an explicit sorted, deduplicated
/// set of admissible values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnValues {
    Wildcard,
    Values(Vec<Value>),
}

impl ColumnValues {
    /// Build from a raw (possibly unsorted, possibly duplicated) array:
    /// sort with a NULL-safe comparator placing NULL at the tail, and
    /// deduplicate.
    pub fn from_raw(mut values: Vec<Value>) -> Self {
        values.sort();
        values.dedup();
        ColumnValues::Values(values)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ColumnValues::Wildcard)
    }

    pub fn contains(&self, value: &Value) -> bool {
        match self {
            ColumnValues::Wildcard => true,
            ColumnValues::Values(vs) => vs.binary_search(value).is_ok(),
        }
    }

    pub fn values(&self) -> Option<&[Value]> {
        match self {
            ColumnValues::Wildcard => None,
            ColumnValues::Values(vs) => Some(vs),
        }
    }

    /// Set union, preserving sorted order. Wildcard absorbs anything.
    pub fn union(&self, other: &ColumnValues) -> ColumnValues {
        match (self, other) {
            (ColumnValues::Wildcard, _) | (_, ColumnValues::Wildcard) => ColumnValues::Wildcard,
            (ColumnValues::Values(a), ColumnValues::Values(b)) => {
                let mut merged: Vec<Value> = a.iter().chain(b.iter()).cloned().collect();
                merged.sort();
                merged.dedup();
                ColumnValues::Values(merged)
            }
        }
    }

    /// Set intersection. Wildcard intersected with a concrete set yields
    /// that set unchanged (wildcard is the universe); two wildcards yield
    /// wildcard. Used by rollup's axis reconciliation.
    pub fn intersect(&self, other: &ColumnValues) -> ColumnValues {
        match (self, other) {
            (ColumnValues::Wildcard, ColumnValues::Wildcard) => ColumnValues::Wildcard,
            (ColumnValues::Wildcard, ColumnValues::Values(v))
            | (ColumnValues::Values(v), ColumnValues::Wildcard) => {
                ColumnValues::Values(v.clone())
            }
            (ColumnValues::Values(a), ColumnValues::Values(b)) => {
                let bset: std::collections::HashSet<&Value> = b.iter().collect();
                let mut merged: Vec<Value> =
                    a.iter().filter(|v| bset.contains(v)).cloned().collect();
                merged.sort();
                merged.dedup();
                ColumnValues::Values(merged)
            }
        }
    }
}

impl PartialEq for ColumnValues {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnValues::Wildcard, ColumnValues::Wildcard) => true,
            (ColumnValues::Values(a), ColumnValues::Values(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ColumnValues {}

/// An immutable column-expression / value-predicate pair. `hash_code` is
/// precomputed at construction, an xxHash over the expression and its value
/// set, used for column-level equality acceleration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentColumn {
    pub column_expression: String,
    pub values: ColumnValues,
    hash_code: u64,
}

impl SegmentColumn {
    pub fn new(column_expression: impl Into<String>, values: ColumnValues) -> Self {
        let column_expression = column_expression.into();
        let hash_code = Self::compute_hash(&column_expression, &values);
        SegmentColumn {
            column_expression,
            values,
            hash_code,
        }
    }

    pub fn wildcard(column_expression: impl Into<String>) -> Self {
        Self::new(column_expression, ColumnValues::Wildcard)
    }

    pub fn from_values(column_expression: impl Into<String>, raw_values: Vec<Value>) -> Self {
        Self::new(column_expression, ColumnValues::from_raw(raw_values))
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    pub fn is_wildcard(&self) -> bool {
        self.values.is_wildcard()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    /// Merge two columns over the *same* `columnExpression`.
    ///
    /// # Panics
    /// If the two columns' expressions differ — merging is only defined
    /// for the same column.
    pub fn merge(&self, other: &SegmentColumn) -> SegmentColumn {
        assert_eq!(
            self.column_expression, other.column_expression,
            "SegmentColumn::merge requires equal columnExpression"
        );
        SegmentColumn::new(self.column_expression.clone(), self.values.union(&other.values))
    }

    fn compute_hash(column_expression: &str, values: &ColumnValues) -> u64 {
        let mut hasher = Xxh64::new(HASH_SEED);
        hasher.update(column_expression.as_bytes());
        match values {
            ColumnValues::Wildcard => hasher.update(b"\x01WILDCARD\x01"),
            ColumnValues::Values(vs) => {
                for v in vs {
                    hasher.update(v.textual_form().as_bytes());
                    hasher.update(b"\x1E");
                }
            }
        }
        hasher.digest()
    }
}

impl PartialEq for SegmentColumn {
    fn eq(&self, other: &Self) -> bool {
        self.column_expression == other.column_expression && self.values == other.values
    }
}

impl Eq for SegmentColumn {}

impl std::hash::Hash for SegmentColumn {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_commutes() {
        let a = SegmentColumn::from_values("state", vec![Value::String("CA".into())]);
        let b = SegmentColumn::from_values("state", vec![Value::String("OR".into())]);
        assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_with_wildcard_is_wildcard() {
        let a = SegmentColumn::from_values("state", vec![Value::String("CA".into())]);
        let w = SegmentColumn::wildcard("state");
        assert!(a.merge(&w).is_wildcard());
        assert!(w.merge(&a).is_wildcard());
    }

    #[test]
    fn dedup_and_sort_on_construction() {
        let c = SegmentColumn::from_values(
            "state",
            vec![
                Value::String("OR".into()),
                Value::String("CA".into()),
                Value::String("CA".into()),
                Value::Null,
            ],
        );
        assert_eq!(
            c.values.values().unwrap(),
            &[
                Value::String("CA".into()),
                Value::String("OR".into()),
                Value::Null,
            ]
        );
    }

    #[test]
    fn equal_columns_have_equal_hash() {
        let a = SegmentColumn::from_values("state", vec![Value::String("CA".into())]);
        let b = SegmentColumn::from_values("state", vec![Value::String("CA".into())]);
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
    }

    #[test]
    #[should_panic(expected = "equal columnExpression")]
    fn merge_requires_same_expression() {
        let a = SegmentColumn::wildcard("state");
        let b = SegmentColumn::wildcard("gender");
        let _ = a.merge(&b);
    }
}
