//! `SegmentBuilder::rollup` — combine one or more segments sharing
//! provenance and dimensionality into a new, reduced-dimensionality
//! segment, aggregating across the axes that are projected away.

use std::collections::{HashMap, HashSet};

use crate::aggregator::Aggregator;
use crate::bitkey::BitKey;
use crate::segment::{Segment, SegmentDataset, SegmentWithData};
use crate::segment_axis::SegmentAxis;
use crate::segment_body::{dense_len, AxisMetadata, NullBitset, SegmentBody};
use crate::segment_cell_key::SegmentCellKey;
use crate::segment_column::{ColumnValues, SegmentColumn};
use crate::value::Value;

pub struct SegmentBuilder;

struct KeptAxis {
    column_expression: String,
    source_index: usize,
    reconciled_values: ColumnValues,
    lost_predicate: bool,
    target_axis: SegmentAxis,
}

impl SegmentBuilder {
    /// `inputs` must be non-empty and every element must share provenance
    /// and `segment.bit_key`. `keep_columns` names the column expressions
    /// that survive into the result; every other constrained column is
    /// aggregated away. `target_bit_key` is the bit key of the surviving
    /// columns.
    pub fn rollup(
        inputs: &[SegmentWithData],
        keep_columns: &[String],
        target_bit_key: BitKey,
        aggregator: Aggregator,
        density_threshold: f64,
    ) -> SegmentWithData {
        assert!(!inputs.is_empty(), "rollup requires at least one input segment");
        let first = &inputs[0];
        for other in &inputs[1..] {
            assert_eq!(other.segment.provenance, first.segment.provenance);
            assert_eq!(other.segment.bit_key, first.segment.bit_key);
        }

        let kept_axes = reconcile_axes(inputs, keep_columns);
        let accumulator = accumulate_cells(inputs, &kept_axes);
        let (body, value_kind) =
            aggregate_into_body(&accumulator, &kept_axes, aggregator, density_threshold);

        let _ = value_kind;
        let constrained_columns: Vec<SegmentColumn> = kept_axes
            .iter()
            .map(|k| SegmentColumn::new(k.column_expression.clone(), k.reconciled_values.clone()))
            .collect();

        let segment = Segment::new(
            first.segment.provenance.clone(),
            constrained_columns,
            first.segment.compound_predicates.clone(),
            Vec::new(),
            target_bit_key,
        );
        let axes: Vec<SegmentAxis> = kept_axes.into_iter().map(|k| k.target_axis).collect();
        SegmentWithData::new(segment, axes, SegmentDataset::new(body))
    }
}

fn reconcile_axes(inputs: &[SegmentWithData], keep_columns: &[String]) -> Vec<KeptAxis> {
    let first = &inputs[0];
    // `keep_columns` is a set, unordered by contract; the output order must
    // follow the header's own column order, not whatever order the caller
    // happened to list `keep_columns` in.
    let keep_set: HashSet<&str> = keep_columns.iter().map(String::as_str).collect();
    let mut kept = Vec::new();

    for source_index in 0..first.segment.column_predicates.len() {
        let keep_expr = first.segment.column_predicates[source_index]
            .column_expression
            .clone();
        if !keep_set.contains(keep_expr.as_str()) {
            continue;
        }

        let mut reconciled_values = first.segment.column_predicates[source_index].values.clone();
        let mut lost_predicate = false;
        let mut reconciled_has_null = first.axes[source_index].has_null();
        let mut union_keys: Vec<Value> = first.axes[source_index].keys().to_vec();

        for other in &inputs[1..] {
            let other_col = &other.segment.column_predicates[source_index];
            if other_col.values != first.segment.column_predicates[source_index].values {
                lost_predicate = true;
            }
            reconciled_values = reconciled_values.intersect(&other_col.values);
            reconciled_has_null = reconciled_has_null && other.axes[source_index].has_null();
            union_keys.extend(other.axes[source_index].keys().iter().cloned());
        }

        union_keys.sort();
        union_keys.dedup();
        // Restrict the target axis to values still admitted by the
        // reconciled predicate; a value rejected by the intersection has
        // no surviving cells.
        union_keys.retain(|v| v.is_null() || reconciled_values.contains(v));
        if reconciled_has_null && !union_keys.iter().any(Value::is_null) {
            union_keys.push(Value::Null);
        }
        if !reconciled_has_null {
            union_keys.retain(|v| !v.is_null());
        }

        let target_axis = SegmentAxis::new(union_keys, None);

        kept.push(KeptAxis {
            column_expression: keep_expr,
            source_index,
            reconciled_values,
            lost_predicate,
            target_axis,
        });
    }

    kept
}

fn accumulate_cells(
    inputs: &[SegmentWithData],
    kept_axes: &[KeptAxis],
) -> HashMap<SegmentCellKey, Vec<Value>> {
    let mut accumulator: HashMap<SegmentCellKey, Vec<Value>> = HashMap::new();

    for input in inputs {
        for (source_ordinals, value) in input.dataset.body.iter_cells() {
            let mut target_ordinals = Vec::with_capacity(kept_axes.len());
            let mut admitted = true;
            for kept in kept_axes {
                let source_axis = &input.axes[kept.source_index];
                let source_value = match source_axis.keys().get(source_ordinals[kept.source_index] as usize) {
                    Some(v) => v,
                    None => {
                        admitted = false;
                        break;
                    }
                };
                match kept.target_axis.ordinal_of(source_value) {
                    Some(ord) => target_ordinals.push(ord as i32),
                    None => {
                        admitted = false;
                        break;
                    }
                }
            }
            if admitted {
                let key = SegmentCellKey::new(target_ordinals);
                accumulator.entry(key).or_default().push(value);
            }
        }
    }

    accumulator
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Double,
    Int,
    Object,
}

fn aggregate_into_body(
    accumulator: &HashMap<SegmentCellKey, Vec<Value>>,
    kept_axes: &[KeptAxis],
    aggregator: Aggregator,
    density_threshold: f64,
) -> (SegmentBody, ValueKind) {
    let axis_value_sets: Vec<Vec<Value>> = kept_axes
        .iter()
        .map(|k| k.target_axis.keys().to_vec())
        .collect();
    let null_axis_flags: Vec<bool> = kept_axes.iter().map(|k| k.target_axis.has_null()).collect();
    let meta = AxisMetadata {
        axis_value_sets,
        null_axis_flags,
    };
    let dims = meta.dims();
    let total_cells = dense_len(&dims);

    let aggregated: HashMap<SegmentCellKey, Value> = accumulator
        .iter()
        .map(|(key, values)| (key.clone(), aggregator.aggregate(values)))
        .collect();

    if total_cells == 0 || aggregated.is_empty() {
        return (SegmentBody::empty_dense_object(meta), ValueKind::Object);
    }

    let value_kind = classify(aggregated.values());
    let density = aggregated.len() as f64 / total_cells as f64;
    let use_dense = density >= density_threshold;

    if !use_dense {
        let cells: HashMap<SegmentCellKey, Value> = aggregated
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        return (SegmentBody::Sparse { meta, cells }, value_kind);
    }

    match value_kind {
        ValueKind::Double => {
            let mut values = vec![0.0f64; total_cells];
            let mut null_indicators = NullBitset::with_capacity(total_cells);
            for (key, v) in &aggregated {
                let idx = crate::segment_body::linear_index(key.ordinals(), &dims);
                match v {
                    Value::Double(d) => values[idx] = *d,
                    _ => null_indicators.set(idx, true),
                }
            }
            for idx in 0..total_cells {
                if !aggregated.keys().any(|k| crate::segment_body::linear_index(k.ordinals(), &dims) == idx) {
                    null_indicators.set(idx, true);
                }
            }
            (
                SegmentBody::DenseDouble {
                    meta,
                    values,
                    null_indicators,
                },
                value_kind,
            )
        }
        ValueKind::Int => {
            let mut values = vec![0i32; total_cells];
            let mut null_indicators = NullBitset::with_capacity(total_cells);
            for (key, v) in &aggregated {
                let idx = crate::segment_body::linear_index(key.ordinals(), &dims);
                match v {
                    Value::Int(i) => values[idx] = *i,
                    Value::Long(l) => values[idx] = *l as i32,
                    _ => null_indicators.set(idx, true),
                }
            }
            for idx in 0..total_cells {
                if !aggregated.keys().any(|k| crate::segment_body::linear_index(k.ordinals(), &dims) == idx) {
                    null_indicators.set(idx, true);
                }
            }
            (
                SegmentBody::DenseInt {
                    meta,
                    values,
                    null_indicators,
                },
                value_kind,
            )
        }
        ValueKind::Object => {
            let mut values = vec![None; total_cells];
            for (key, v) in &aggregated {
                let idx = crate::segment_body::linear_index(key.ordinals(), &dims);
                if !v.is_null() {
                    values[idx] = Some(v.clone());
                }
            }
            (SegmentBody::DenseObject { meta, values }, value_kind)
        }
    }
}

/// Picks the dense storage variant from the aggregated values. Falls back
/// to `Object` on any overflow of the `i32` range or any non-numeric
/// aggregate, matching the deterministic fallback called for in the
/// rollup design.
fn classify<'a>(values: impl Iterator<Item = &'a Value>) -> ValueKind {
    let mut saw_double = false;
    let mut saw_int_like = false;
    let mut saw_other = false;

    for v in values {
        match v {
            Value::Double(_) => saw_double = true,
            Value::Int(_) => saw_int_like = true,
            Value::Long(l) => {
                if *l > i32::MAX as i64 || *l < i32::MIN as i64 {
                    saw_other = true;
                } else {
                    saw_int_like = true;
                }
            }
            Value::Null => {}
            _ => saw_other = true,
        }
    }

    if saw_other {
        ValueKind::Object
    } else if saw_double {
        ValueKind::Double
    } else if saw_int_like {
        ValueKind::Int
    } else {
        ValueKind::Object
    }
}
