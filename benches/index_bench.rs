//! Benchmarks for `SegmentCacheIndex`'s three query paths: exact `locate`,
//! `intersectRegion`, and `findRollupCandidates` over index populations of
//! increasing size.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use olap_segment_cache::{
    BitKey, ColumnValues, LocateRequest, Provenance, SegmentCacheIndex, SegmentColumn,
    SegmentHeader, Value,
};
use std::collections::HashMap;

fn provenance() -> Provenance {
    Provenance {
        schema_name: "sales".to_string(),
        schema_checksum: vec![1, 2, 3],
        cube_name: "Sales".to_string(),
        measure_name: "Unit Sales".to_string(),
        rolap_star_fact_table_name: "sales_fact".to_string(),
    }
}

fn populated_index(n: usize) -> SegmentCacheIndex {
    let mut index = SegmentCacheIndex::new(None);
    for i in 0..n {
        let header = SegmentHeader::new(
            provenance(),
            vec![
                SegmentColumn::new("State", ColumnValues::from_raw(vec![Value::String(format!("ST{i}"))])),
                SegmentColumn::wildcard("Gender"),
            ],
            vec![],
            BitKey::from_bits([0, 1]),
            vec![],
        );
        index.insert(header).unwrap();
    }
    index
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");
    for size in [10, 100, 1_000, 10_000] {
        let index = populated_index(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let req = LocateRequest {
                provenance: provenance(),
                bit_key: BitKey::from_bits([0, 1]),
                coords: HashMap::from([
                    ("State".to_string(), Value::String("ST0".to_string())),
                    ("Gender".to_string(), Value::String("F".to_string())),
                ]),
                compound_predicates: vec![],
            };
            b.iter(|| index.locate(black_box(&req)).unwrap());
        });
    }
    group.finish();
}

fn bench_intersect_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("intersect_region");
    for size in [10, 100, 1_000, 10_000] {
        let index = populated_index(size);
        let region = vec![SegmentColumn::new(
            "Gender",
            ColumnValues::from_raw(vec![Value::String("F".to_string())]),
        )];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| index.intersect_region(black_box(&provenance()), black_box(&region)).unwrap());
        });
    }
    group.finish();
}

fn bench_find_rollup_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_rollup_candidates");
    for size in [10, 100, 1_000, 10_000] {
        let index = populated_index(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let coords = HashMap::from([("State".to_string(), Value::String("ST0".to_string()))]);
            b.iter(|| {
                index
                    .find_rollup_candidates(black_box(&provenance()), BitKey::from_bits([0]), black_box(&coords))
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_locate, bench_intersect_region, bench_find_rollup_candidates);
criterion_main!(benches);
