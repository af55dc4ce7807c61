//! Domain rules deciding whether a close pair is plausible.
//!
//! Rules that read field data can fail on malformed values. Wrapped with
//! [`fail_open`], such a failure counts as viable: the data is incomplete, not
//! evidence against the pair.
use tracing::debug;

use crate::utils::errors::LinkageResult;
use crate::utils::record::RecordPair;
use crate::utils::vitals;

pub type Viability = Box<dyn Fn(&RecordPair<'_>) -> bool + Send + Sync>;

/// Accepts every pair.
pub fn always() -> Viability {
    Box::new(|_| true)
}

/// Turns a fallible rule into a predicate that treats errors as viable.
pub fn fail_open<F>(rule: F) -> Viability
where
    F: Fn(&RecordPair<'_>) -> LinkageResult<bool> + Send + Sync + 'static,
{
    Box::new(move |pair| match rule(pair) {
        Ok(viable) => viable,
        Err(e) => {
            debug!(
                "viability of {}-{} undecided, keeping pair: {e}",
                pair.record1.id(),
                pair.record2.id()
            );
            true
        }
    })
}

/// `record2` (the parent) must be born between `min` and `max` years before
/// `record1` (the child). Pairs missing either year are kept.
pub fn birth_year_gap(min: i32, max: i32) -> Viability {
    fail_open(move |pair| {
        let child = vitals::birth_year(pair.record1)?;
        let parent = vitals::birth_year(pair.record2)?;
        Ok(match (child, parent) {
            (Some(child), Some(parent)) => (min..=max).contains(&(child - parent)),
            _ => true,
        })
    })
}
