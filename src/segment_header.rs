//! `SegmentHeader` — the immutable, content-addressed identity of a segment.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bitkey::BitKey;
use crate::segment_column::SegmentColumn;

/// Opaque provenance quadruple that scopes a header's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub schema_name: String,
    pub schema_checksum: Vec<u8>,
    pub cube_name: String,
    pub measure_name: String,
    pub rolap_star_fact_table_name: String,
}

/// Fully immutable, content-addressed segment identity.
///
/// `unique_id` is computed lazily and memoized, since most headers are
/// constructed speculatively (e.g. while probing the index) and never need
/// their SHA-256 digest at all.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub provenance: Provenance,
    /// One entry per bit set in `constrained_cols_bit_key`, in the bitmap's
    /// natural (ascending-bit) order — order is significant.
    pub constrained_columns: Vec<SegmentColumn>,
    pub compound_predicates: Vec<String>,
    pub constrained_cols_bit_key: BitKey,
    pub excluded_regions: Vec<SegmentColumn>,

    #[serde(skip)]
    unique_id: OnceLock<[u8; 32]>,
    #[serde(skip)]
    hash_code: OnceLock<u64>,
}

impl SegmentHeader {
    pub fn new(
        provenance: Provenance,
        constrained_columns: Vec<SegmentColumn>,
        compound_predicates: Vec<String>,
        constrained_cols_bit_key: BitKey,
        excluded_regions: Vec<SegmentColumn>,
    ) -> Self {
        SegmentHeader {
            provenance,
            constrained_columns,
            compound_predicates,
            constrained_cols_bit_key,
            excluded_regions,
            unique_id: OnceLock::new(),
            hash_code: OnceLock::new(),
        }
    }

    /// SHA-256 over a deterministic serialization: `schemaName ‖
    /// schemaChecksum ‖ cubeName ‖ measureName ‖ (for each constrainedColumn
    /// in order: columnExpression ‖ for each value: textual form) ‖ (for
    /// each compoundPredicate: text)`.
    pub fn unique_id(&self) -> &[u8; 32] {
        self.unique_id.get_or_init(|| self.compute_unique_id())
    }

    pub fn unique_id_hex(&self) -> String {
        self.unique_id().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn hash_code(&self) -> u64 {
        *self.hash_code.get_or_init(|| {
            let id = self.unique_id();
            u64::from_le_bytes(id[0..8].try_into().unwrap())
        })
    }

    fn compute_unique_id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.provenance.schema_name.as_bytes());
        hasher.update(0u8.to_le_bytes()); // field separator
        hasher.update(&self.provenance.schema_checksum);
        hasher.update(0u8.to_le_bytes());
        hasher.update(self.provenance.cube_name.as_bytes());
        hasher.update(0u8.to_le_bytes());
        hasher.update(self.provenance.measure_name.as_bytes());
        hasher.update(0u8.to_le_bytes());

        for col in &self.constrained_columns {
            hasher.update(col.column_expression.as_bytes());
            hasher.update(b"\x1D");
            match col.values.values() {
                None => hasher.update(b"*"),
                Some(values) => {
                    for v in values {
                        hasher.update(v.textual_form().as_bytes());
                        hasher.update(b"\x1E");
                    }
                }
            }
            hasher.update(b"\x1F");
        }

        for pred in &self.compound_predicates {
            hasher.update(pred.as_bytes());
            hasher.update(b"\x1F");
        }

        hasher.finalize().into()
    }

    /// Linear scan over the ordered constrained-column array — arity is
    /// typically small.
    pub fn get_constrained_column(&self, expr: &str) -> Option<&SegmentColumn> {
        self.constrained_columns
            .iter()
            .find(|c| c.column_expression == expr)
    }

    pub fn get_excluded_region(&self, expr: &str) -> Option<&SegmentColumn> {
        self.excluded_regions
            .iter()
            .find(|c| c.column_expression == expr)
    }

    /// Replace or add columns by expression, preserving all others — returns
    /// a fresh header rather than mutating in place.
    pub fn clone_with_overrides(&self, overrides: &[SegmentColumn]) -> SegmentHeader {
        let mut columns = self.constrained_columns.clone();
        for over in overrides {
            if let Some(existing) = columns
                .iter_mut()
                .find(|c| c.column_expression == over.column_expression)
            {
                *existing = over.clone();
            } else {
                columns.push(over.clone());
            }
        }
        SegmentHeader::new(
            self.provenance.clone(),
            columns,
            self.compound_predicates.clone(),
            self.constrained_cols_bit_key,
            self.excluded_regions.clone(),
        )
    }

    /// Schema/cube/measure/fact-table/bitkey equality only — dimensionality
    /// match. Callers combine with further value-range checks.
    pub fn is_subset(&self, other: &SegmentHeader) -> bool {
        self.provenance == other.provenance
            && self.constrained_cols_bit_key == other.constrained_cols_bit_key
    }
}

/// Cloning produces a fresh memoization cell — cheap, since recomputing the
/// digest from identical key material yields an identical `unique_id`.
impl Clone for SegmentHeader {
    fn clone(&self) -> Self {
        SegmentHeader {
            provenance: self.provenance.clone(),
            constrained_columns: self.constrained_columns.clone(),
            compound_predicates: self.compound_predicates.clone(),
            constrained_cols_bit_key: self.constrained_cols_bit_key,
            excluded_regions: self.excluded_regions.clone(),
            unique_id: OnceLock::new(),
            hash_code: OnceLock::new(),
        }
    }
}

/// Equality is defined as equality of `unique_id`.
impl PartialEq for SegmentHeader {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id() == other.unique_id()
    }
}

impl Eq for SegmentHeader {}

impl std::hash::Hash for SegmentHeader {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.unique_id());
    }
}
