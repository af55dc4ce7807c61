//! Offline checks over candidate metrics: whether they behave as metrics on
//! real data, and how their distances distribute across thresholds.
use std::sync::Barrier;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::metric::composite::Metric;
use crate::utils::errors::LinkageResult;
use crate::utils::types::Distance;

/// Slack allowed before a triple counts as breaking the triangle inequality.
pub const TRIANGLE_DELTA: Distance = 1e-7;

/// Number of threshold buckets: 0.00, 0.01, ..., 1.00.
pub const THRESHOLD_BUCKETS: usize = 101;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleCheck {
    pub checked: usize,
    pub violations: usize,
    /// Triples skipped because one of the three distances failed.
    pub failed: usize,
    /// Largest observed excess of d(a,c) over d(a,b) + d(b,c).
    pub worst_excess: Distance,
}

/// Samples `samples` random triples and counts those where
/// d(a,c) > d(a,b) + d(b,c) + [`TRIANGLE_DELTA`].
pub fn triangle_inequality_violations<T>(
    metric: &dyn Metric<T>,
    records: &[T],
    samples: usize,
    seed: u64,
) -> TriangleCheck {
    let mut check = TriangleCheck::default();
    if records.len() < 3 {
        return check;
    }
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..samples {
        let a = &records[rng.random_range(0..records.len())];
        let b = &records[rng.random_range(0..records.len())];
        let c = &records[rng.random_range(0..records.len())];

        match sides(metric, a, b, c) {
            Ok((ab, bc, ac)) => {
                check.checked += 1;
                let excess = ac - (ab + bc);
                if excess > TRIANGLE_DELTA {
                    check.violations += 1;
                    check.worst_excess = check.worst_excess.max(excess);
                }
            }
            Err(e) => {
                debug!("triangle check skipped a triple: {e}");
                check.failed += 1;
            }
        }
    }

    info!(
        "{}: {} triples checked, {} violations, {} failed",
        metric.name(),
        check.checked,
        check.violations,
        check.failed
    );
    check
}

fn sides<T>(metric: &dyn Metric<T>, a: &T, b: &T, c: &T) -> LinkageResult<(Distance, Distance, Distance)> {
    Ok((metric.distance(a, b)?, metric.distance(b, c)?, metric.distance(a, c)?))
}

/// Distances of one metric bucketed by threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdHistogram {
    pub metric: String,
    /// `counts[i]` holds pairs whose distance rounds to `i / 100`; anything
    /// above 1 lands in the last bucket.
    pub counts: Vec<usize>,
    pub evaluated: usize,
    pub failed: usize,
}

impl ThresholdHistogram {
    fn new(metric: String) -> Self {
        Self {
            metric,
            counts: vec![0; THRESHOLD_BUCKETS],
            evaluated: 0,
            failed: 0,
        }
    }

    fn record(&mut self, distance: Distance) {
        let bucket = ((distance * 100.0).round().max(0.0) as usize).min(THRESHOLD_BUCKETS - 1);
        self.counts[bucket] += 1;
        self.evaluated += 1;
    }

    /// Pairs at or below the threshold.
    pub fn at_or_below(&self, threshold: Distance) -> usize {
        let last = ((threshold * 100.0).round().max(0.0) as usize).min(THRESHOLD_BUCKETS - 1);
        self.counts[..=last].iter().sum()
    }
}

/// Evaluates every metric over all pairs of `records`, one thread per metric.
///
/// Pairs are processed in blocks of `block_size`. All metric threads start a
/// block together and the caller only moves on once every thread has finished
/// it, so progress is reported per block for all metrics at once.
pub fn evaluate_metrics<T: Sync>(
    metrics: &[Box<dyn Metric<T>>],
    records: &[T],
    block_size: usize,
) -> Vec<ThresholdHistogram> {
    let pairs: Vec<(usize, usize)> = (0..records.len())
        .flat_map(|i| (i + 1..records.len()).map(move |j| (i, j)))
        .collect();
    let blocks: Vec<&[(usize, usize)]> = pairs.chunks(block_size.max(1)).collect();

    let start = Barrier::new(metrics.len() + 1);
    let end = Barrier::new(metrics.len() + 1);

    std::thread::scope(|s| {
        let handles: Vec<_> = metrics
            .iter()
            .map(|metric| {
                let (start, end, blocks) = (&start, &end, &blocks);
                s.spawn(move || {
                    let mut histogram = ThresholdHistogram::new(metric.name());
                    for block in blocks {
                        start.wait();
                        for &(i, j) in block.iter() {
                            match metric.distance(&records[i], &records[j]) {
                                Ok(d) => histogram.record(d),
                                Err(_) => histogram.failed += 1,
                            }
                        }
                        end.wait();
                    }
                    histogram
                })
            })
            .collect();

        for (n, block) in blocks.iter().enumerate() {
            start.wait();
            end.wait();
            debug!("block {}/{} done ({} pairs)", n + 1, blocks.len(), block.len());
        }

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
