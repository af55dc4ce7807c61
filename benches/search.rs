//! Range query throughput of the reference point index against a full scan.
//!
//! Run with: cargo bench --bench search

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linkage::metric::{Aggregation, BaseMetric, CompositeMetric, Metric};
use linkage::search::{BitBlaster, ExhaustiveSearch, SearchStructure};
use linkage::utils::config::SearchConfig;
use linkage::utils::record::{birth, Record};
use linkage::utils::types::RecordKind;

const NAMES: &[&str] = &[
    "ANDERS", "PER", "JOHAN", "ERIK", "OLOF", "NILS", "LARS", "JONAS", "ANNA", "BRITA", "KARIN", "MARIA",
    "SARA", "PERSSON", "ERIKSSON", "NILSSON", "OLSDOTTER", "PERSDOTTER",
];

fn births(n: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n as u64)
        .map(|id| {
            let mut record = Record::blank(id, RecordKind::Birth);
            for field in RecordKind::Birth.identity_fields() {
                record.set_field(field, NAMES[rng.random_range(0..NAMES.len())]);
            }
            record
        })
        .collect()
}

fn metric() -> Arc<dyn Metric<Record>> {
    Arc::new(CompositeMetric::new(
        BaseMetric::Levenshtein,
        RecordKind::Birth.identity_fields().to_vec(),
        Aggregation::Sum,
    ))
}

fn bench_range_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_query");

    for size in [1_000, 10_000] {
        let data = births(size);
        let queries: Vec<Record> = data.iter().step_by(size / 10).cloned().collect();
        let config = SearchConfig { reference_points: 20, ..SearchConfig::default() };
        let indexed = BitBlaster::build(metric(), data.clone(), &config).unwrap_or_else(|e| panic!("{e}"));
        let scanned = ExhaustiveSearch::new(metric(), data);

        group.bench_with_input(BenchmarkId::new("bitblaster", size), &size, |b, _| {
            b.iter(|| {
                let hits: usize = queries
                    .iter()
                    .map(|q| indexed.find_within_threshold(black_box(q), 3.0).len())
                    .sum();
                black_box(hits)
            });
        });

        group.bench_with_input(BenchmarkId::new("exhaustive", size), &size, |b, _| {
            b.iter(|| {
                let hits: usize = queries
                    .iter()
                    .map(|q| scanned.find_within_threshold(black_box(q), 3.0).len())
                    .sum();
                black_box(hits)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_range_query);
criterion_main!(benches);
