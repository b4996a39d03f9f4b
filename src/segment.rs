//! Live segment types: `Segment` and `SegmentWithData`.
//!
//! A header is the content-addressed *key*; a `Segment` is its runtime
//! counterpart, bound to a star and a measure. A column-level predicate on a
//! live segment has the same shape as [`SegmentColumn`] — a column
//! expression paired with a value predicate — so rather than carry two
//! structurally identical types it is aliased instead of minting a second
//! copy.

use crate::bitkey::BitKey;
use crate::segment_axis::SegmentAxis;
use crate::segment_body::SegmentBody;
use crate::segment_column::SegmentColumn;
use crate::segment_header::{Provenance, SegmentHeader};
use crate::value::Value;

/// A column-level predicate bound to a live segment. Same shape as
/// [`SegmentColumn`] (see module doc).
pub type StarColumnPredicate = SegmentColumn;

/// A segment bound to a star, a measure, its column/compound predicates and
/// any excluded sub-regions, but not yet carrying materialized cell data.
#[derive(Debug, Clone)]
pub struct Segment {
    pub provenance: Provenance,
    pub column_predicates: Vec<StarColumnPredicate>,
    pub compound_predicates: Vec<String>,
    pub excluded_regions: Vec<SegmentColumn>,
    pub bit_key: BitKey,
}

impl Segment {
    pub fn new(
        provenance: Provenance,
        column_predicates: Vec<StarColumnPredicate>,
        compound_predicates: Vec<String>,
        excluded_regions: Vec<SegmentColumn>,
        bit_key: BitKey,
    ) -> Self {
        Segment {
            provenance,
            column_predicates,
            compound_predicates,
            excluded_regions,
            bit_key,
        }
    }

    /// Derive this segment's content-addressed header. The header's
    /// `unique_id` is the authoritative identity; this segment is only a
    /// convenient runtime handle to it plus its materialized data.
    pub fn to_header(&self) -> SegmentHeader {
        SegmentHeader::new(
            self.provenance.clone(),
            self.column_predicates.clone(),
            self.compound_predicates.clone(),
            self.bit_key,
            self.excluded_regions.clone(),
        )
    }
}

/// In-memory mirror of a [`SegmentBody`]. This is a thin wrapper rather than
/// a distinct wire representation, since `SegmentBody` is already an
/// in-memory shape (no separate wire encoding exists outside of `serde`).
#[derive(Debug, Clone)]
pub struct SegmentDataset {
    pub body: SegmentBody,
}

impl SegmentDataset {
    pub fn new(body: SegmentBody) -> Self {
        SegmentDataset { body }
    }
}

/// A live segment with materialized axes and an in-memory dataset.
#[derive(Debug, Clone)]
pub struct SegmentWithData {
    pub segment: Segment,
    pub axes: Vec<SegmentAxis>,
    pub dataset: SegmentDataset,
}

impl SegmentWithData {
    pub fn new(segment: Segment, axes: Vec<SegmentAxis>, dataset: SegmentDataset) -> Self {
        SegmentWithData {
            segment,
            axes,
            dataset,
        }
    }

    pub fn header(&self) -> SegmentHeader {
        self.segment.to_header()
    }

    /// Translate axis-aligned coordinate values into the body's ordinal
    /// key and fetch the cell, or `None` if any coordinate doesn't appear
    /// on its axis.
    pub fn cell(&self, coords: &[Value]) -> Option<Value> {
        if coords.len() != self.axes.len() {
            return None;
        }
        let ordinals: Option<Vec<i32>> = coords
            .iter()
            .zip(&self.axes)
            .map(|(v, axis)| axis.ordinal_of(v).map(|o| o as i32))
            .collect();
        let ordinals = ordinals?;
        self.dataset
            .body
            .get(&crate::segment_cell_key::SegmentCellKey::new(ordinals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_body::AxisMetadata;
    use std::collections::HashMap;

    fn provenance() -> Provenance {
        Provenance {
            schema_name: "S".into(),
            schema_checksum: vec![0],
            cube_name: "C".into(),
            measure_name: "Unit Sales".into(),
            rolap_star_fact_table_name: "sales_fact".into(),
        }
    }

    #[test]
    fn segment_to_header_round_trips_key_material() {
        let seg = Segment::new(
            provenance(),
            vec![SegmentColumn::wildcard("state")],
            vec![],
            vec![],
            BitKey::single(0),
        );
        let header = seg.to_header();
        assert_eq!(header.provenance, provenance());
        assert!(header.get_constrained_column("state").unwrap().is_wildcard());
    }

    #[test]
    fn cell_lookup_translates_coords_through_axes() {
        let seg = Segment::new(
            provenance(),
            vec![SegmentColumn::from_values(
                "state",
                vec![Value::String("CA".into()), Value::String("OR".into())],
            )],
            vec![],
            vec![],
            BitKey::single(0),
        );
        let axis = SegmentAxis::new(
            vec![Value::String("CA".into()), Value::String("OR".into())],
            None,
        );
        let mut cells = HashMap::new();
        cells.insert(
            crate::segment_cell_key::SegmentCellKey::new(vec![1]),
            Value::Double(7.0),
        );
        let body = crate::segment_body::SegmentBody::Sparse {
            meta: AxisMetadata {
                axis_value_sets: vec![axis.keys().to_vec()],
                null_axis_flags: vec![false],
            },
            cells,
        };
        let swd = SegmentWithData::new(seg, vec![axis], SegmentDataset::new(body));
        assert_eq!(swd.cell(&[Value::String("OR".into())]), Some(Value::Double(7.0)));
        assert_eq!(swd.cell(&[Value::String("WA".into())]), None);
    }
}
