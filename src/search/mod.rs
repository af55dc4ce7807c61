pub mod bitblaster;
pub mod exhaustive;
pub mod pool;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::metric::Metric;
use crate::utils::config::{SearchConfig, SearchStructureKind};
use crate::utils::errors::LinkageResult;
use crate::utils::types::Distance;

pub use bitblaster::BitBlaster;
pub use exhaustive::ExhaustiveSearch;

/// An indexed value paired with its distance to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataDistance<'a, T> {
    pub value: &'a T,
    pub distance: Distance,
}

/// Range search over a fixed set of values.
pub trait SearchStructure<T> {
    /// Every indexed value within `threshold` of `query`, in indexed-set order.
    ///
    /// # Panics
    /// When called after [`SearchStructure::terminate`].
    fn find_within_threshold(&self, query: &T, threshold: Distance) -> Vec<DataDistance<'_, T>>;

    /// Releases worker threads. Blocks until they have exited.
    fn terminate(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> SearchStats;
}

/// Work done by a search structure since it was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub queries: u64,
    /// Full distance evaluations against indexed values.
    pub evaluated: u64,
    /// Values excluded by reference point bounds without evaluation.
    pub pruned: u64,
    /// Evaluations that failed and were excluded.
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SearchCounters {
    queries: AtomicU64,
    evaluated: AtomicU64,
    pruned: AtomicU64,
    failed: AtomicU64,
}

impl SearchCounters {
    pub(crate) fn add(&self, evaluated: u64, pruned: u64, failed: u64) {
        self.evaluated.fetch_add(evaluated, Ordering::Relaxed);
        self.pruned.fetch_add(pruned, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub(crate) fn query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SearchStats {
        SearchStats {
            queries: self.queries.load(Ordering::Relaxed),
            evaluated: self.evaluated.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Builds the structure selected in `config` over `data`.
pub fn build_search_structure<T>(
    metric: Arc<dyn Metric<T>>,
    data: Vec<T>,
    config: &SearchConfig,
) -> LinkageResult<Box<dyn SearchStructure<T> + Send>>
where
    T: Clone + Send + Sync + 'static,
{
    config.validate()?;
    Ok(match config.structure {
        SearchStructureKind::BitBlaster => Box::new(BitBlaster::build(metric, data, config)?),
        SearchStructureKind::Exhaustive => Box::new(ExhaustiveSearch::new(metric, data)),
    })
}
