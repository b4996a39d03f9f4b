//! `SegmentBody` — the immutable cell payload of a segment, in one of four
//! storage variants.

use std::collections::HashMap;

use crate::segment_cell_key::SegmentCellKey;
use crate::value::Value;

/// A packed bitset used for null indicators on dense bodies. One bit per
/// linear cell index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullBitset {
    words: Vec<u64>,
}

impl NullBitset {
    pub fn with_capacity(bits: usize) -> Self {
        NullBitset {
            words: vec![0u64; bits.div_ceil(64)],
        }
    }

    pub fn set(&mut self, index: usize, is_null: bool) {
        let word = index / 64;
        let bit = index % 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        if is_null {
            self.words[word] |= 1u64 << bit;
        } else {
            self.words[word] &= !(1u64 << bit);
        }
    }

    pub fn get(&self, index: usize) -> bool {
        let word = index / 64;
        let bit = index % 64;
        self.words.get(word).is_some_and(|w| (w >> bit) & 1 == 1)
    }
}

/// Dimensions of a dense body's rectangle, in axis order. Used to convert
/// `SegmentCellKey` ordinals to a linear storage index and back.
pub fn linear_index(ordinals: &[i32], dims: &[usize]) -> usize {
    debug_assert_eq!(ordinals.len(), dims.len());
    let mut idx = 0usize;
    for (ord, dim) in ordinals.iter().zip(dims) {
        idx = idx * dim + (*ord as usize);
    }
    idx
}

pub fn dense_len(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Inverse of [`linear_index`]: recover per-axis ordinals from a flat index.
pub fn unflatten_index(mut idx: usize, dims: &[usize]) -> Vec<i32> {
    let mut ordinals = vec![0i32; dims.len()];
    for i in (0..dims.len()).rev() {
        let d = dims[i].max(1);
        ordinals[i] = (idx % d) as i32;
        idx /= d;
    }
    ordinals
}

/// Shared axis metadata every variant carries: the per-axis value sets and
/// whether each axis has a null slot.
#[derive(Debug, Clone)]
pub struct AxisMetadata {
    pub axis_value_sets: Vec<Vec<Value>>,
    pub null_axis_flags: Vec<bool>,
}

impl AxisMetadata {
    pub fn dims(&self) -> Vec<usize> {
        self.axis_value_sets.iter().map(Vec::len).collect()
    }
}

#[derive(Debug, Clone)]
pub enum SegmentBody {
    DenseDouble {
        meta: AxisMetadata,
        values: Vec<f64>,
        null_indicators: NullBitset,
    },
    DenseInt {
        meta: AxisMetadata,
        values: Vec<i32>,
        null_indicators: NullBitset,
    },
    DenseObject {
        meta: AxisMetadata,
        values: Vec<Option<Value>>,
    },
    Sparse {
        meta: AxisMetadata,
        cells: HashMap<SegmentCellKey, Value>,
    },
}

impl SegmentBody {
    pub fn meta(&self) -> &AxisMetadata {
        match self {
            SegmentBody::DenseDouble { meta, .. }
            | SegmentBody::DenseInt { meta, .. }
            | SegmentBody::DenseObject { meta, .. }
            | SegmentBody::Sparse { meta, .. } => meta,
        }
    }

    pub fn arity(&self) -> usize {
        self.meta().axis_value_sets.len()
    }

    /// Number of cells with a non-null value. For dense bodies this is
    /// `total - nulls`; for sparse, the map length (absent entries are
    /// implicitly null/zero, never materialized).
    pub fn non_null_count(&self) -> usize {
        match self {
            SegmentBody::DenseDouble {
                values,
                null_indicators,
                ..
            } => (0..values.len())
                .filter(|i| !null_indicators.get(*i))
                .count(),
            SegmentBody::DenseInt {
                values,
                null_indicators,
                ..
            } => (0..values.len())
                .filter(|i| !null_indicators.get(*i))
                .count(),
            SegmentBody::DenseObject { values, .. } => {
                values.iter().filter(|v| v.is_some()).count()
            }
            SegmentBody::Sparse { cells, .. } => cells.len(),
        }
    }

    /// Fetch a cell by ordinal key, regardless of variant.
    pub fn get(&self, key: &SegmentCellKey) -> Option<Value> {
        match self {
            SegmentBody::DenseDouble {
                meta,
                values,
                null_indicators,
            } => {
                let idx = linear_index(key.ordinals(), &meta.dims());
                if null_indicators.get(idx) {
                    None
                } else {
                    values.get(idx).map(|v| Value::Double(*v))
                }
            }
            SegmentBody::DenseInt {
                meta,
                values,
                null_indicators,
            } => {
                let idx = linear_index(key.ordinals(), &meta.dims());
                if null_indicators.get(idx) {
                    None
                } else {
                    values.get(idx).map(|v| Value::Int(*v))
                }
            }
            SegmentBody::DenseObject { meta, values } => {
                let idx = linear_index(key.ordinals(), &meta.dims());
                values.get(idx).cloned().flatten()
            }
            SegmentBody::Sparse { cells, .. } => cells.get(key).cloned(),
        }
    }

    pub fn empty_dense_object(meta: AxisMetadata) -> SegmentBody {
        let len = dense_len(&meta.dims());
        SegmentBody::DenseObject {
            values: vec![None; len],
            meta,
        }
    }

    /// Every non-null cell as `(ordinals, value)`, in no particular order.
    /// Used by rollup's cell-accumulation pass to walk a source body.
    pub fn iter_cells(&self) -> Box<dyn Iterator<Item = (Vec<i32>, Value)> + '_> {
        match self {
            SegmentBody::DenseDouble {
                meta,
                values,
                null_indicators,
            } => {
                let dims = meta.dims();
                Box::new((0..values.len()).filter_map(move |idx| {
                    if null_indicators.get(idx) {
                        None
                    } else {
                        Some((unflatten_index(idx, &dims), Value::Double(values[idx])))
                    }
                }))
            }
            SegmentBody::DenseInt {
                meta,
                values,
                null_indicators,
            } => {
                let dims = meta.dims();
                Box::new((0..values.len()).filter_map(move |idx| {
                    if null_indicators.get(idx) {
                        None
                    } else {
                        Some((unflatten_index(idx, &dims), Value::Int(values[idx])))
                    }
                }))
            }
            SegmentBody::DenseObject { meta, values } => {
                let dims = meta.dims();
                Box::new(values.iter().enumerate().filter_map(move |(idx, v)| {
                    v.clone().map(|v| (unflatten_index(idx, &dims), v))
                }))
            }
            SegmentBody::Sparse { cells, .. } => {
                Box::new(cells.iter().map(|(k, v)| (k.ordinals().to_vec(), v.clone())))
            }
        }
    }
}
