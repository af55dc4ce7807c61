use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linkage::metric::{Aggregation, BaseMetric, CompositeMetric, FnMetric, Metric};
use linkage::search::pool::WorkerPool;
use linkage::search::{build_search_structure, BitBlaster, ExhaustiveSearch, SearchStructure};
use linkage::utils::config::{SearchConfig, SearchStructureKind};
use linkage::utils::errors::LinkageError;
use linkage::utils::record::{birth, Record};
use linkage::utils::types::{Distance, RecordId, RecordKind};

const LETTERS: &[u8] = b"AEINORS";

fn random_name(rng: &mut StdRng) -> String {
    let len = rng.random_range(3..7);
    (0..len)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

fn random_births(n: usize, seed: u64) -> Vec<Record> {
    println!("Generating {n} random births with seed {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n as u64)
        .map(|id| {
            Record::blank(id, RecordKind::Birth)
                .with_field(birth::FATHER_FORENAME, random_name(&mut rng))
                .with_field(birth::MOTHER_FORENAME, random_name(&mut rng))
                .with_field(birth::FATHER_SURNAME, random_name(&mut rng))
        })
        .collect()
}

fn levenshtein_sum() -> Arc<dyn Metric<Record>> {
    Arc::new(CompositeMetric::new(
        BaseMetric::Levenshtein,
        vec![birth::FATHER_FORENAME, birth::MOTHER_FORENAME, birth::FATHER_SURNAME],
        Aggregation::Sum,
    ))
}

fn hit_ids(hits: &[linkage::search::DataDistance<'_, Record>]) -> Vec<(RecordId, Distance)> {
    hits.iter().map(|h| (h.value.id(), h.distance)).collect()
}

fn config(reference_points: usize, workers: usize, chunk_size: usize) -> SearchConfig {
    SearchConfig {
        reference_points,
        workers: Some(workers),
        chunk_size,
        ..SearchConfig::default()
    }
}

#[test]
fn test_bitblaster_matches_exhaustive_scan() {
    let data = random_births(300, 11);
    let queries = random_births(25, 12);
    let metric = levenshtein_sum();

    let index = BitBlaster::build(Arc::clone(&metric), data.clone(), &config(8, 3, 32)).unwrap();
    let oracle = ExhaustiveSearch::new(metric, data);

    for threshold in [0.0, 2.0, 5.0, 9.0] {
        for query in &queries {
            let fast = hit_ids(&index.find_within_threshold(query, threshold));
            let slow = hit_ids(&oracle.find_within_threshold(query, threshold));
            assert_eq!(fast, slow, "query {} at threshold {threshold}", query.id());
        }
    }

    let stats = index.stats();
    println!("BitBlaster stats: {stats:?}");
    assert_eq!(stats.queries, 100);
    assert!(stats.pruned > 0, "reference points should rule out some values");
    assert_eq!(stats.evaluated + stats.pruned, 100 * 300);
}

#[test]
fn test_query_results_keep_indexed_order() {
    let data = random_births(120, 5);
    let index = BitBlaster::build(levenshtein_sum(), data.clone(), &config(4, 4, 7)).unwrap();

    let hits = index.find_within_threshold(&data[0], 100.0);
    assert_eq!(hits.len(), data.len());
    let ids: Vec<RecordId> = hits.iter().map(|h| h.value.id()).collect();
    let expected: Vec<RecordId> = data.iter().map(Record::id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_query_finds_itself_at_zero() {
    let data = random_births(50, 99);
    let index = BitBlaster::build(levenshtein_sum(), data.clone(), &config(5, 2, 16)).unwrap();
    for record in &data {
        let hits = index.find_within_threshold(record, 0.0);
        assert!(hits.iter().any(|h| h.value.id() == record.id() && h.distance == 0.0));
    }
}

#[test]
fn test_reference_points_capped_by_data_size() {
    let data = random_births(6, 1);
    let index = BitBlaster::build(levenshtein_sum(), data, &config(20, 1, 4)).unwrap();
    assert_eq!(index.reference_points(), &[0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_reference_points_are_reproducible() {
    let data = random_births(200, 3);
    let a = BitBlaster::build(levenshtein_sum(), data.clone(), &config(10, 2, 64)).unwrap();
    let b = BitBlaster::build(levenshtein_sum(), data, &config(10, 2, 64)).unwrap();
    assert_eq!(a.reference_points(), b.reference_points());
    assert_eq!(a.reference_points().len(), 10);
}

#[test]
fn test_empty_index_returns_nothing() {
    let metric = levenshtein_sum();
    let index = BitBlaster::build(metric, Vec::new(), &config(5, 2, 8)).unwrap();
    assert!(index.is_empty());
    let query = Record::blank(1, RecordKind::Birth);
    assert!(index.find_within_threshold(&query, 10.0).is_empty());
}

#[test]
fn test_failing_distances_are_skipped() {
    // Odd values cannot be compared.
    let metric: Arc<dyn Metric<i64>> = Arc::new(FnMetric::new("picky", |a: &i64, b: &i64| {
        if a % 2 != 0 || b % 2 != 0 {
            Err(LinkageError::MetricEvaluation(format!("{a} or {b} is odd")))
        } else {
            Ok((a - b).abs() as Distance)
        }
    }));
    let data: Vec<i64> = (0..20).collect();

    let index = BitBlaster::build(Arc::clone(&metric), data.clone(), &config(3, 2, 4)).unwrap();
    let hits: Vec<i64> = index.find_within_threshold(&4, 4.0).iter().map(|h| *h.value).collect();
    assert_eq!(hits, vec![0, 2, 4, 6, 8]);

    let oracle = ExhaustiveSearch::new(metric, data);
    let hits: Vec<i64> = oracle.find_within_threshold(&4, 4.0).iter().map(|h| *h.value).collect();
    assert_eq!(hits, vec![0, 2, 4, 6, 8]);
    assert_eq!(oracle.stats().failed, 10);
}

#[test]
#[should_panic(expected = "unavailable")]
fn test_bitblaster_panics_after_terminate() {
    let data = random_births(10, 2);
    let mut index = BitBlaster::build(levenshtein_sum(), data.clone(), &config(3, 2, 4)).unwrap();
    index.terminate();
    index.find_within_threshold(&data[0], 1.0);
}

#[test]
#[should_panic(expected = "unavailable")]
fn test_exhaustive_panics_after_terminate() {
    let data = random_births(10, 2);
    let mut index = ExhaustiveSearch::new(levenshtein_sum(), data.clone());
    index.terminate();
    index.find_within_threshold(&data[0], 1.0);
}

#[test]
fn test_build_search_structure_selects_kind() {
    let data = random_births(40, 8);
    let exhaustive = SearchConfig { structure: SearchStructureKind::Exhaustive, ..config(1, 1, 8) };
    let index = build_search_structure(levenshtein_sum(), data.clone(), &exhaustive).unwrap();
    index.find_within_threshold(&data[0], 3.0);
    assert_eq!(index.stats().pruned, 0);
    assert_eq!(index.stats().evaluated, 40);
    assert_eq!(index.len(), 40);
}

#[test]
fn test_invalid_search_config_is_rejected() {
    let data = random_births(5, 8);
    let bad = config(0, 1, 8);
    assert!(matches!(
        build_search_structure(levenshtein_sum(), data.clone(), &bad),
        Err(LinkageError::InvalidConfig(_))
    ));
    let bad = config(3, 0, 8);
    assert!(matches!(
        build_search_structure(levenshtein_sum(), data, &bad),
        Err(LinkageError::InvalidConfig(_))
    ));
}

#[test]
fn test_worker_pool_returns_results_in_order() {
    let mut pool = WorkerPool::new(4);
    let jobs: Vec<Box<dyn FnOnce() -> usize + Send>> = (0..50usize)
        .map(|i| Box::new(move || i * i) as Box<dyn FnOnce() -> usize + Send>)
        .collect();
    let results = pool.run_all(jobs);
    let expected: Vec<Option<usize>> = (0..50).map(|i| Some(i * i)).collect();
    assert_eq!(results, expected);

    pool.terminate();
    assert!(pool.is_terminated());
    assert_eq!(pool.size(), 0);
}

#[test]
fn test_worker_pool_survives_panicking_job() {
    let pool = WorkerPool::new(2);
    let jobs: Vec<Box<dyn FnOnce() -> u32 + Send>> = vec![
        Box::new(|| -> u32 { 1 }),
        Box::new(|| -> u32 { panic!("bad job") }),
        Box::new(|| -> u32 { 3 }),
    ];
    assert_eq!(pool.run_all(jobs), vec![Some(1), None, Some(3)]);

    let again: Vec<Box<dyn FnOnce() -> u32 + Send>> = vec![Box::new(|| -> u32 { 7 })];
    assert_eq!(pool.run_all(again), vec![Some(7)]);
}

#[test]
fn test_mean_over_present_fields_is_never_pruned() {
    let metric: Arc<dyn Metric<Record>> = Arc::new(CompositeMetric::new(
        BaseMetric::NormalisedLevenshtein,
        vec![birth::FATHER_FORENAME, birth::MOTHER_FORENAME],
        Aggregation::MeanOfPresent,
    ));
    let data = vec![
        Record::blank(1, RecordKind::Birth).with_field(birth::FATHER_FORENAME, "AAAA"),
        Record::blank(2, RecordKind::Birth)
            .with_field(birth::FATHER_FORENAME, "AAAA")
            .with_field(birth::MOTHER_FORENAME, "BBBB"),
        Record::blank(3, RecordKind::Birth)
            .with_field(birth::FATHER_FORENAME, "CCCC")
            .with_field(birth::MOTHER_FORENAME, "BBBB"),
    ];

    let index = BitBlaster::build(Arc::clone(&metric), data.clone(), &config(20, 2, 1)).unwrap();
    let oracle = ExhaustiveSearch::new(metric, data.clone());
    assert!(index.reference_points().is_empty());

    for query in &data {
        let fast = hit_ids(&index.find_within_threshold(query, 0.5));
        let slow = hit_ids(&oracle.find_within_threshold(query, 0.5));
        println!("query {}: {fast:?}", query.id());
        assert_eq!(fast, slow);
    }
    assert_eq!(hit_ids(&index.find_within_threshold(&data[1], 0.5)), vec![(1, 0.0), (2, 0.0), (3, 0.5)]);
    assert_eq!(index.stats().pruned, 0);
}

#[test]
fn test_flagged_closure_metric_is_scanned() {
    let metric: Arc<dyn Metric<i64>> = Arc::new(
        FnMetric::new("squared", |a: &i64, b: &i64| -> Result<Distance, LinkageError> {
            Ok(((a - b) * (a - b)) as Distance)
        })
        .without_triangle_inequality(),
    );
    let data: Vec<i64> = (0..30).collect();
    let index = BitBlaster::build(metric, data, &config(5, 2, 8)).unwrap();
    assert!(index.reference_points().is_empty());

    let hits: Vec<i64> = index.find_within_threshold(&10, 4.0).iter().map(|h| *h.value).collect();
    assert_eq!(hits, vec![8, 9, 10, 11, 12]);
    assert_eq!(index.stats().evaluated, 30);
}
