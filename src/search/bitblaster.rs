//! Reference point index for range queries in an arbitrary metric space.
//!
//! A handful of indexed values are sampled as reference points and every
//! value's distance to each of them is stored. At query time the triangle
//! inequality gives `|d(q,ref) - d(r,ref)| <= d(q,r)`, so any value whose
//! stored distance disagrees with the query's by more than the threshold on
//! some reference point is out of range and skipped without evaluation.
//! Metrics that break the triangle inequality get no reference points and
//! every query evaluates the whole set.
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::metric::Metric;
use crate::search::pool::WorkerPool;
use crate::search::{DataDistance, SearchCounters, SearchStats, SearchStructure};
use crate::utils::config::SearchConfig;
use crate::utils::errors::{LinkageError, LinkageResult};
use crate::utils::types::Distance;

type PivotRow = Vec<Option<Distance>>;

struct ChunkResult {
    hits: Vec<(usize, Distance)>,
    evaluated: u64,
    pruned: u64,
    failed: u64,
}

pub struct BitBlaster<T> {
    data: Arc<Vec<T>>,
    metric: Arc<dyn Metric<T>>,
    reference_points: Vec<usize>,
    /// `pivots[i][r]`: distance from `data[i]` to reference point `r`, `None`
    /// where the metric failed.
    pivots: Arc<Vec<PivotRow>>,
    pool: WorkerPool,
    chunk_size: usize,
    counters: Arc<SearchCounters>,
}

impl<T> BitBlaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn build(metric: Arc<dyn Metric<T>>, data: Vec<T>, config: &SearchConfig) -> LinkageResult<Self> {
        config.validate()?;
        let data = Arc::new(data);
        let reference_points = if metric.satisfies_triangle_inequality() {
            sample_reference_points(data.len(), config.reference_points, config.seed)
        } else {
            warn!("{} breaks the triangle inequality; queries will not be pruned", metric.name());
            Vec::new()
        };
        let pool = WorkerPool::new(config.worker_count());

        let pivots = Arc::new(pivot_table(&pool, &data, &metric, &reference_points, config.chunk_size));

        info!(
            "BitBlaster built over {} values with {} reference points ({})",
            data.len(),
            reference_points.len(),
            metric.name()
        );

        Ok(Self {
            data,
            metric,
            reference_points,
            pivots,
            pool,
            chunk_size: config.chunk_size,
            counters: Arc::new(SearchCounters::default()),
        })
    }

    /// Positions of the sampled reference points in the indexed set.
    pub fn reference_points(&self) -> &[usize] {
        &self.reference_points
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}

/// Uniform sample without replacement. Asking for at least as many points as
/// there are values uses them all.
fn sample_reference_points(len: usize, wanted: usize, seed: u64) -> Vec<usize> {
    if wanted >= len {
        return (0..len).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, len, wanted).into_vec();
    picked.sort_unstable();
    picked
}

fn pivot_table<T>(
    pool: &WorkerPool,
    data: &Arc<Vec<T>>,
    metric: &Arc<dyn Metric<T>>,
    reference_points: &[usize],
    chunk_size: usize,
) -> Vec<PivotRow>
where
    T: Send + Sync + 'static,
{
    let refs = Arc::new(reference_points.to_vec());
    let jobs: Vec<Box<dyn FnOnce() -> Vec<PivotRow> + Send>> = chunk_bounds(data.len(), chunk_size)
        .map(|(start, end)| {
            let (data, metric, refs) = (Arc::clone(data), Arc::clone(metric), Arc::clone(&refs));
            Box::new(move || -> Vec<PivotRow> {
                (start..end)
                    .map(|i| {
                        refs.iter()
                            .map(|&r| match metric.distance(&data[i], &data[r]) {
                                Ok(d) => Some(d),
                                Err(e) => {
                                    warn!("reference distance {i}->{r} unavailable: {e}");
                                    None
                                }
                            })
                            .collect::<PivotRow>()
                    })
                    .collect()
            }) as Box<dyn FnOnce() -> Vec<PivotRow> + Send>
        })
        .collect();

    let mut table = Vec::with_capacity(data.len());
    for ((start, end), rows) in chunk_bounds(data.len(), chunk_size).zip(pool.run_all(jobs)) {
        match rows {
            Some(rows) => table.extend(rows),
            // A lost chunk keeps its values searchable, just never pruned.
            None => table.extend((start..end).map(|_| vec![None; reference_points.len()])),
        }
    }
    table
}

fn chunk_bounds(len: usize, chunk_size: usize) -> impl Iterator<Item = (usize, usize)> {
    let chunk_size = chunk_size.max(1);
    (0..len).step_by(chunk_size).map(move |start| (start, (start + chunk_size).min(len)))
}

impl<T> SearchStructure<T> for BitBlaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn find_within_threshold(&self, query: &T, threshold: Distance) -> Vec<DataDistance<'_, T>> {
        if self.pool.is_terminated() {
            panic!("{}", LinkageError::IndexUnavailable);
        }
        self.counters.query();

        let query_pivots: Arc<PivotRow> = Arc::new(
            self.reference_points
                .iter()
                .map(|&r| self.metric.distance(query, &self.data[r]).ok())
                .collect(),
        );
        let query = Arc::new(query.clone());

        let jobs: Vec<Box<dyn FnOnce() -> ChunkResult + Send>> = chunk_bounds(self.data.len(), self.chunk_size)
            .map(|(start, end)| {
                let data = Arc::clone(&self.data);
                let metric = Arc::clone(&self.metric);
                let pivots = Arc::clone(&self.pivots);
                let query_pivots = Arc::clone(&query_pivots);
                let query = Arc::clone(&query);
                Box::new(move || scan_chunk(&*metric, &query, &data, &pivots, &query_pivots, start, end, threshold))
                    as Box<dyn FnOnce() -> ChunkResult + Send>
            })
            .collect();

        let mut hits = Vec::new();
        for ((start, end), chunk) in chunk_bounds(self.data.len(), self.chunk_size).zip(self.pool.run_all(jobs)) {
            match chunk {
                Some(chunk) => {
                    self.counters.add(chunk.evaluated, chunk.pruned, chunk.failed);
                    hits.extend(chunk.hits);
                }
                None => {
                    warn!("query chunk {start}..{end} lost; its values are excluded");
                    self.counters.add(0, 0, (end - start) as u64);
                }
            }
        }
        hits.sort_unstable_by_key(|&(index, _)| index);

        debug!("query matched {} of {} values", hits.len(), self.data.len());
        hits.into_iter()
            .map(|(index, distance)| DataDistance { value: &self.data[index], distance })
            .collect()
    }

    fn terminate(&mut self) {
        self.pool.terminate();
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn stats(&self) -> SearchStats {
        self.counters.snapshot()
    }
}

#[allow(clippy::too_many_arguments)]
fn scan_chunk<T>(
    metric: &dyn Metric<T>,
    query: &T,
    data: &[T],
    pivots: &[PivotRow],
    query_pivots: &[Option<Distance>],
    start: usize,
    end: usize,
    threshold: Distance,
) -> ChunkResult {
    let mut result = ChunkResult { hits: Vec::new(), evaluated: 0, pruned: 0, failed: 0 };

    for index in start..end {
        let excluded = pivots[index].iter().zip(query_pivots).any(|pair| match pair {
            (Some(dr), Some(dq)) => (dq - dr).abs() > threshold,
            _ => false,
        });
        if excluded {
            result.pruned += 1;
            continue;
        }

        result.evaluated += 1;
        match metric.distance(query, &data[index]) {
            Ok(d) if d <= threshold => result.hits.push((index, d)),
            Ok(_) => {}
            Err(e) => {
                warn!("skipping indexed value {index}: {e}");
                result.failed += 1;
            }
        }
    }
    result
}
