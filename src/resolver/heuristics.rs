//! Cheap rules over vital events, tried before any string comparison.
//!
//! Each rule looks at one chain `x - y - z` against the statistics of the
//! whole family around the pivot. Deletion rules remove the edge between `y`
//! and whichever end record is implausible; the creation rule closes the
//! triangle. A rule that meets unparsable data is skipped.
use itertools::Itertools;
use tracing::debug;

use crate::metric::{distance, BaseMetric};
use crate::resolver::normalise::{self, Identity};
use crate::resolver::provenance;
use crate::utils::config::ResolverConfig;
use crate::utils::errors::LinkageResult;
use crate::utils::record::{is_missing, Record};
use crate::utils::types::{Distance, RecordId, RecordKind};
use crate::utils::vitals;

/// A graph change proposed by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Repair {
    Delete {
        a: RecordId,
        b: RecordId,
        provenance: &'static str,
    },
    Create {
        a: RecordId,
        b: RecordId,
        provenance: &'static str,
    },
}

impl Repair {
    pub fn provenance(&self) -> &'static str {
        match self {
            Repair::Delete { provenance, .. } | Repair::Create { provenance, .. } => provenance,
        }
    }
}

/// The three records of one open triangle.
#[derive(Debug, Clone, Copy)]
pub struct ChainRecords<'r> {
    pub x: &'r Record,
    pub y: &'r Record,
    pub z: &'r Record,
}

impl<'r> ChainRecords<'r> {
    fn ends(&self) -> [&'r Record; 2] {
        [self.x, self.z]
    }
}

/// Summary of every record around a pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyStats {
    pub size: usize,
    pub median_year: Option<f64>,
    /// Years between the oldest and youngest known birth.
    pub age_range: i32,
    pub birthplace_mode: Option<String>,
}

impl FamilyStats {
    pub fn from_records(records: &[&Record]) -> Self {
        let years: Vec<i32> = records
            .iter()
            .filter_map(|r| vitals::birth_year(r).ok().flatten())
            .sorted()
            .collect();

        let median_year = match years.len() {
            0 => None,
            n if n % 2 == 0 => Some((years[n / 2 - 1] + years[n / 2]) as f64 / 2.0),
            n => Some(years[n / 2] as f64),
        };
        let age_range = match (years.first(), years.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };

        // Most frequent place; ties go to the alphabetically first.
        let birthplace_mode = records
            .iter()
            .filter_map(|r| vitals::place(r))
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
            .next()
            .map(|(place, _)| place.to_string());

        Self {
            size: records.len(),
            median_year,
            age_range,
            birthplace_mode,
        }
    }
}

/// Runs the rules in order and returns the first repair proposed.
pub fn evaluate(chain: &ChainRecords<'_>, stats: &FamilyStats, config: &ResolverConfig) -> Option<Repair> {
    let rules: [(&str, RuleFn); 4] = [
        (provenance::MAX_AGE_RANGE, max_age_range),
        (provenance::MIN_B_INTERVAL, min_b_interval),
        (provenance::BIRTHPLACE_MODE, birthplace_mode),
        (provenance::MATCH_M_DATE_BD, match_m_date_bd),
    ];
    for (name, rule) in rules {
        match rule(chain, stats, config) {
            Ok(Some(repair)) => return Some(repair),
            Ok(None) => {}
            Err(e) => debug!("{name} skipped for {}-{}-{}: {e}", chain.x.id(), chain.y.id(), chain.z.id()),
        }
    }
    None
}

type RuleFn = fn(&ChainRecords<'_>, &FamilyStats, &ResolverConfig) -> LinkageResult<Option<Repair>>;

/// An end record far from both the family median and `y`, or `y` far from
/// both the median and an end record.
pub fn max_age_range(
    chain: &ChainRecords<'_>,
    stats: &FamilyStats,
    config: &ResolverConfig,
) -> LinkageResult<Option<Repair>> {
    let Some(median) = stats.median_year else {
        return Ok(None);
    };
    let Some(y_year) = vitals::birth_year(chain.y)? else {
        return Ok(None);
    };
    let max = config.max_age_difference as f64;
    let far = |a: f64, b: f64| (a - b).abs() > max;

    let mut end_years = Vec::with_capacity(2);
    for end in chain.ends() {
        end_years.push(vitals::birth_year(end)?.map(|year| (end, year as f64)));
    }
    let y_year = y_year as f64;

    // An outlying end record first, then an outlying middle record.
    for (end, year) in end_years.iter().flatten() {
        if far(median, *year) && far(y_year, *year) {
            return Ok(Some(delete(end, chain.y, provenance::MAX_AGE_RANGE)));
        }
    }
    for (end, year) in end_years.iter().flatten() {
        if far(median, y_year) && far(y_year, *year) {
            return Ok(Some(delete(end, chain.y, provenance::MAX_AGE_RANGE)));
        }
    }
    Ok(None)
}

/// Two births of the same mother closer than the minimum interval but not
/// close enough to be twins.
pub fn min_b_interval(
    chain: &ChainRecords<'_>,
    _stats: &FamilyStats,
    config: &ResolverConfig,
) -> LinkageResult<Option<Repair>> {
    let Some(y_date) = vitals::birth_date(chain.y)? else {
        return Ok(None);
    };
    for end in chain.ends() {
        let Some(end_date) = vitals::birth_date(end)? else {
            continue;
        };
        let days = (y_date - end_date).num_days().abs();
        if days > config.twin_tolerance_days && days < config.min_birth_interval_days {
            return Ok(Some(delete(end, chain.y, provenance::MIN_B_INTERVAL)));
        }
    }
    Ok(None)
}

/// In a family large enough for a mode to mean something, an end record born
/// neither where `y` is recorded nor at the family's usual place, when `y`
/// died young enough to have stayed at home.
pub fn birthplace_mode(
    chain: &ChainRecords<'_>,
    stats: &FamilyStats,
    config: &ResolverConfig,
) -> LinkageResult<Option<Repair>> {
    if stats.size <= config.min_family_size {
        return Ok(None);
    }
    let Some(y_place) = vitals::place(chain.y) else {
        return Ok(None);
    };
    if chain.y.kind() == RecordKind::Death {
        match vitals::age_at_death(chain.y)? {
            Some(age) if (age as f64) < stats.age_range as f64 / 2.0 => {}
            _ => return Ok(None),
        }
    }

    for end in chain.ends() {
        let Some(end_place) = vitals::place(end) else {
            continue;
        };
        if end_place != y_place && stats.birthplace_mode.as_deref() != Some(end_place) {
            return Ok(Some(delete(end, chain.y, provenance::BIRTHPLACE_MODE)));
        }
    }
    Ok(None)
}

/// The ends share their parents' marriage date or, when no date is recorded,
/// the full canonical names of both parents.
pub fn match_m_date_bd(
    chain: &ChainRecords<'_>,
    _stats: &FamilyStats,
    config: &ResolverConfig,
) -> LinkageResult<Option<Repair>> {
    let (x, z) = (chain.x, chain.z);

    let x_year = vitals::marriage_year(x)?;
    let z_year = vitals::marriage_year(z)?;
    let matched = match (x_year, z_year, x.kind().marriage_date_fields(), z.kind().marriage_date_fields()) {
        (Some(_), Some(_), Some(x_fields), Some(z_fields)) => {
            marriage_date_distance(x, &x_fields, z, &z_fields) < config.date_threshold
        }
        _ => same_parents(x, z),
    };

    Ok(matched.then(|| Repair::Create {
        a: x.id(),
        b: z.id(),
        provenance: provenance::MATCH_M_DATE_BD,
    }))
}

fn marriage_date_distance(x: &Record, x_fields: &[usize; 3], z: &Record, z_fields: &[usize; 3]) -> Distance {
    x_fields
        .iter()
        .zip(z_fields)
        .map(|(&xf, &zf)| {
            distance(
                x.field(xf).unwrap_or(""),
                z.field(zf).unwrap_or(""),
                BaseMetric::Levenshtein,
            )
        })
        .sum()
}

fn same_parents(x: &Record, z: &Record) -> bool {
    let mut pair: [Identity; 2] = [normalise::identity_of(x), normalise::identity_of(z)];
    normalise::canonicalise(&mut pair);
    let [a, b] = &pair;
    a.iter().all(|v| !is_missing(v)) && a == b
}

fn delete(end: &Record, y: &Record, provenance: &'static str) -> Repair {
    Repair::Delete { a: end.id(), b: y.id(), provenance }
}
