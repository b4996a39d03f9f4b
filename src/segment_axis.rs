//! `SegmentAxis` — a materialized axis of a [`crate::segment::SegmentWithData`]:
//! sorted keys, a key→ordinal map, and a residual predicate.

use std::collections::HashMap;

use crate::value::Value;

/// One materialized axis. `keys` is the sorted, deduplicated set of values
/// actually observed on this axis in the segment's body; `residual`
/// carries the original column-level predicate that produced the axis
/// (which may be broader than the observed keys, e.g. right after a
/// rollup demotes a predicate to a lost predicate).
#[derive(Debug, Clone)]
pub struct SegmentAxis {
    keys: Vec<Value>,
    ordinal_of: HashMap<Value, usize>,
    has_null: bool,
    residual: Option<Vec<Value>>,
}

impl SegmentAxis {
    /// Build an axis from an already sorted, deduplicated key array.
    pub fn new(keys: Vec<Value>, residual: Option<Vec<Value>>) -> Self {
        let has_null = keys.last().is_some_and(Value::is_null);
        let ordinal_of = keys
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        SegmentAxis {
            keys,
            ordinal_of,
            has_null,
            residual,
        }
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn has_null(&self) -> bool {
        self.has_null
    }

    /// Residual predicate, if the axis carries one narrower than "every
    /// observed key".
    pub fn residual(&self) -> Option<&[Value]> {
        self.residual.as_deref()
    }

    /// Hash-map-backed ordinal lookup. NULL maps to the last slot when the
    /// axis has one.
    pub fn ordinal_of(&self, value: &Value) -> Option<usize> {
        if value.is_null() {
            return if self.has_null {
                Some(self.keys.len() - 1)
            } else {
                None
            };
        }
        self.ordinal_of.get(value).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_lookup_matches_position() {
        let axis = SegmentAxis::new(
            vec![Value::String("CA".into()), Value::String("OR".into())],
            None,
        );
        assert_eq!(axis.ordinal_of(&Value::String("CA".into())), Some(0));
        assert_eq!(axis.ordinal_of(&Value::String("OR".into())), Some(1));
        assert_eq!(axis.ordinal_of(&Value::String("WA".into())), None);
    }

    #[test]
    fn null_maps_to_last_slot_when_present() {
        let axis = SegmentAxis::new(
            vec![Value::String("CA".into()), Value::Null],
            None,
        );
        assert_eq!(axis.ordinal_of(&Value::Null), Some(1));
        assert!(axis.has_null());
    }

    #[test]
    fn null_lookup_fails_when_axis_has_no_null() {
        let axis = SegmentAxis::new(vec![Value::String("CA".into())], None);
        assert_eq!(axis.ordinal_of(&Value::Null), None);
    }
}
