use std::sync::Arc;

use tracing::warn;

use crate::metric::Metric;
use crate::search::{DataDistance, SearchCounters, SearchStats, SearchStructure};
use crate::utils::errors::LinkageError;
use crate::utils::types::Distance;

/// Linear scan evaluating every indexed value. No pruning, no threads.
pub struct ExhaustiveSearch<T> {
    data: Vec<T>,
    metric: Arc<dyn Metric<T>>,
    terminated: bool,
    counters: SearchCounters,
}

impl<T> ExhaustiveSearch<T> {
    pub fn new(metric: Arc<dyn Metric<T>>, data: Vec<T>) -> Self {
        Self { data, metric, terminated: false, counters: SearchCounters::default() }
    }
}

impl<T> SearchStructure<T> for ExhaustiveSearch<T> {
    fn find_within_threshold(&self, query: &T, threshold: Distance) -> Vec<DataDistance<'_, T>> {
        if self.terminated {
            panic!("{}", LinkageError::IndexUnavailable);
        }
        self.counters.query();

        let mut failed = 0;
        let hits: Vec<_> = self
            .data
            .iter()
            .enumerate()
            .filter_map(|(index, value)| match self.metric.distance(query, value) {
                Ok(distance) if distance <= threshold => Some(DataDistance { value, distance }),
                Ok(_) => None,
                Err(e) => {
                    warn!("skipping indexed value {index}: {e}");
                    failed += 1;
                    None
                }
            })
            .collect();

        self.counters.add(self.data.len() as u64, 0, failed);
        hits
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn stats(&self) -> SearchStats {
        self.counters.snapshot()
    }
}
