//! Property-based tests for the universal invariants called out in the
//! design notes: merge commutativity, the manager-thread invariant, and
//! locate correctness over randomly generated header sets.

use std::collections::HashMap;

use proptest::prelude::*;

use olap_segment_cache::{
    BitKey, ColumnValues, LocateRequest, Provenance, SegmentCacheIndex, SegmentColumn,
    SegmentHeader, Value,
};

fn arb_string_value() -> impl Strategy<Value = Value> {
    "[a-z]{1,6}".prop_map(Value::String)
}

fn arb_values(max: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_string_value(), 1..=max)
}

fn values_of(column_values: &ColumnValues) -> Option<Vec<Value>> {
    column_values.values().map(|v| {
        let mut sorted: Vec<Value> = v.to_vec();
        sorted.sort();
        sorted
    })
}

proptest! {
    /// `merge` is commutative and absorbs into wildcard regardless of side.
    #[test]
    fn merge_is_commutative(a in arb_values(5), b in arb_values(5)) {
        let col_a = SegmentColumn::from_values("x", a);
        let col_b = SegmentColumn::from_values("x", b);

        let ab = col_a.merge(&col_b);
        let ba = col_b.merge(&col_a);
        prop_assert_eq!(values_of(&ab.values), values_of(&ba.values));

        let wildcard = SegmentColumn::wildcard("x");
        prop_assert!(col_a.merge(&wildcard).is_wildcard());
        prop_assert!(wildcard.merge(&col_a).is_wildcard());
    }

    /// `intersect` is commutative too, and wildcard is its identity element.
    #[test]
    fn intersect_is_commutative_and_wildcard_is_identity(a in arb_values(5), b in arb_values(5)) {
        let va = ColumnValues::from_raw(a.clone());
        let vb = ColumnValues::from_raw(b);

        prop_assert_eq!(values_of(&va.intersect(&vb)), values_of(&vb.intersect(&va)));
        prop_assert_eq!(values_of(&va.intersect(&ColumnValues::Wildcard)), values_of(&va));
    }

    /// Inserting a header under the owning thread and then querying it back
    /// via `locate` always finds exactly that header when the coordinates
    /// fall inside its constrained value set.
    #[test]
    fn locate_finds_headers_whose_predicates_admit_the_coords(values in arb_values(4)) {
        let provenance = Provenance {
            schema_name: "s".to_string(),
            schema_checksum: vec![0],
            cube_name: "c".to_string(),
            measure_name: "m".to_string(),
            rolap_star_fact_table_name: "f".to_string(),
        };
        let probe = values[0].clone();
        let header = SegmentHeader::new(
            provenance.clone(),
            vec![SegmentColumn::from_values("x", values)],
            vec![],
            BitKey::single(0),
            vec![],
        );

        let mut index = SegmentCacheIndex::new(None);
        index.insert(header.clone()).unwrap();

        let found = index
            .locate(&LocateRequest {
                provenance,
                bit_key: BitKey::single(0),
                coords: HashMap::from([("x".to_string(), probe)]),
                compound_predicates: vec![],
            })
            .unwrap();

        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].unique_id(), header.unique_id());
    }
}

#[test]
fn off_owner_thread_access_always_fails_with_invariant_violation() {
    let index = SegmentCacheIndex::new(None);
    let provenance = Provenance {
        schema_name: "s".to_string(),
        schema_checksum: vec![0],
        cube_name: "c".to_string(),
        measure_name: "m".to_string(),
        rolap_star_fact_table_name: "f".to_string(),
    };

    let outcome = std::thread::spawn(move || {
        index.locate(&LocateRequest {
            provenance,
            bit_key: BitKey::single(0),
            coords: HashMap::new(),
            compound_predicates: vec![],
        })
    })
    .join()
    .unwrap();

    assert!(matches!(
        outcome,
        Err(olap_segment_cache::CacheError::InvariantViolation(_))
    ));
}
