//! `SegmentCellKey` — a small immutable integer-array cell coordinate key.
//!
//! A single unified key type, used both as the key of a sparse
//! [`crate::segment_body::SegmentBody`] and as the translated target key
//! during rollup cell accumulation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCellKey {
    ordinals: Vec<i32>,
    hash_code: u64,
}

impl SegmentCellKey {
    pub fn new(ordinals: Vec<i32>) -> Self {
        let hash_code = Self::compute_hash(&ordinals);
        SegmentCellKey { ordinals, hash_code }
    }

    pub fn ordinals(&self) -> &[i32] {
        &self.ordinals
    }

    /// Number of axes this key addresses.
    pub fn arity(&self) -> usize {
        self.ordinals.len()
    }

    /// Stable across processes: a pure function of the ordinal array, no
    /// process-local address or random seed involved.
    fn compute_hash(ordinals: &[i32]) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
        for &o in ordinals {
            for byte in o.to_le_bytes() {
                h ^= byte as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
        }
        h
    }
}

impl PartialEq for SegmentCellKey {
    fn eq(&self, other: &Self) -> bool {
        self.ordinals == other.ordinals
    }
}

impl Eq for SegmentCellKey {}

impl std::hash::Hash for SegmentCellKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code);
    }
}
