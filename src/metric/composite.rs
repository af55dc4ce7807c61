//! Record-level distances built from per-field string distances.
use std::fmt;

use crate::metric::base::{self, BaseMetric};
use crate::utils::errors::{LinkageError, LinkageResult};
use crate::utils::record::{is_missing, Record};
use crate::utils::types::{Distance, FieldIndex, FieldSet};

/// A distance function over values of `T`.
///
/// Implementations must be symmetric and return 0 for identical inputs.
pub trait Metric<T>: Send + Sync {
    fn distance(&self, a: &T, b: &T) -> LinkageResult<Distance>;

    fn name(&self) -> String;

    /// Whether `d(a,c) <= d(a,b) + d(b,c)` holds for all inputs. The search
    /// index only prunes with reference points when it does.
    fn satisfies_triangle_inequality(&self) -> bool {
        true
    }
}

/// Adapts a closure into a [`Metric`].
pub struct FnMetric<F> {
    name: String,
    f: F,
    triangle: bool,
}

impl<F> FnMetric<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f, triangle: true }
    }

    /// Marks the closure as breaking the triangle inequality.
    pub fn without_triangle_inequality(mut self) -> Self {
        self.triangle = false;
        self
    }
}

impl<T, F> Metric<T> for FnMetric<F>
where
    F: Fn(&T, &T) -> LinkageResult<Distance> + Send + Sync,
{
    fn distance(&self, a: &T, b: &T) -> LinkageResult<Distance> {
        (self.f)(a, b)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn satisfies_triangle_inequality(&self) -> bool {
        self.triangle
    }
}

/// How per-field distances combine into one record distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Sum over all fields, missing markers compared as ordinary strings.
    Sum,
    /// Mean over fields present on both sides. No shared present field gives
    /// 0 for records equal over the field set and 1 otherwise.
    MeanOfPresent,
    /// Mean over all fields, a field missing on exactly one side counting as
    /// the given maximum.
    MeanWithMaxForMissing(Distance),
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sum => f.write_str("Sum"),
            Aggregation::MeanOfPresent => f.write_str("MeanOfPresent"),
            Aggregation::MeanWithMaxForMissing(max) => write!(f, "MeanWithMax({max})"),
        }
    }
}

/// Aggregates a base metric over a configured field list.
///
/// The symmetric form compares both records over the same fields; the mapped
/// form pairs `fields1` of the first record with `fields2` of the second,
/// positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeMetric {
    base: BaseMetric,
    aggregation: Aggregation,
    fields1: FieldSet,
    fields2: FieldSet,
    excluded: Option<FieldIndex>,
}

impl CompositeMetric {
    pub fn new(base: BaseMetric, fields: FieldSet, aggregation: Aggregation) -> Self {
        Self {
            base,
            aggregation,
            fields1: fields.clone(),
            fields2: fields,
            excluded: None,
        }
    }

    pub fn mapped(
        base: BaseMetric,
        fields1: FieldSet,
        fields2: FieldSet,
        aggregation: Aggregation,
    ) -> LinkageResult<Self> {
        if fields1.len() != fields2.len() {
            return Err(LinkageError::FieldSetMismatch {
                left: fields1.len(),
                right: fields2.len(),
            });
        }
        Ok(Self { base, aggregation, fields1, fields2, excluded: None })
    }

    /// Leaves the given field (typically the identifier) out of comparisons.
    pub fn excluding(mut self, field: FieldIndex) -> Self {
        self.excluded = Some(field);
        self
    }

    pub fn base(&self) -> BaseMetric {
        self.base
    }

    pub fn fields(&self) -> &[FieldIndex] {
        &self.fields1
    }

    pub fn is_mapped(&self) -> bool {
        self.fields1 != self.fields2
    }

    fn pairs(&self) -> impl Iterator<Item = (FieldIndex, FieldIndex)> + '_ {
        self.fields1
            .iter()
            .copied()
            .zip(self.fields2.iter().copied())
            .filter(move |(f1, _)| Some(*f1) != self.excluded)
    }
}

impl Metric<Record> for CompositeMetric {
    fn distance(&self, a: &Record, b: &Record) -> LinkageResult<Distance> {
        let mut total = 0.0;
        let mut counted = 0usize;
        let mut all_equal = true;

        for (f1, f2) in self.pairs() {
            let va = a.try_field(f1)?;
            let vb = b.try_field(f2)?;
            all_equal &= va == vb;

            match self.aggregation {
                Aggregation::Sum => {
                    total += base::distance(va, vb, self.base);
                    counted += 1;
                }
                Aggregation::MeanOfPresent => {
                    if !is_missing(va) && !is_missing(vb) {
                        total += base::distance(va, vb, self.base);
                        counted += 1;
                    }
                }
                Aggregation::MeanWithMaxForMissing(max) => {
                    total += match (is_missing(va), is_missing(vb)) {
                        (true, true) => 0.0,
                        (false, false) => base::distance(va, vb, self.base),
                        _ => max,
                    };
                    counted += 1;
                }
            }
        }

        let result = match self.aggregation {
            Aggregation::Sum => total,
            _ if counted == 0 => {
                if all_equal { 0.0 } else { 1.0 }
            }
            _ => total / counted as Distance,
        };
        Ok(result)
    }

    fn name(&self) -> String {
        format!("{} of {}", self.aggregation, self.base.name())
    }

    fn satisfies_triangle_inequality(&self) -> bool {
        keeps_triangle_inequality(self.base, self.aggregation)
    }
}

/// Summing per-field metrics preserves the triangle inequality, as does a
/// mean with a fixed denominator when a missing value sits at least half the
/// largest base distance from every present one. A mean over the fields
/// present on both sides changes its denominator and does not.
fn keeps_triangle_inequality(base: BaseMetric, aggregation: Aggregation) -> bool {
    match aggregation {
        Aggregation::Sum => base.is_metric(),
        Aggregation::MeanOfPresent => false,
        Aggregation::MeanWithMaxForMissing(max) => base.is_metric() && base.max_distance_is_one() && max >= 0.5,
    }
}

/// Compares the parents' identity fields of two records of any kinds,
/// pairing each kind's father/mother name fields positionally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityMetric {
    base: BaseMetric,
    aggregation: Aggregation,
}

impl IdentityMetric {
    pub fn new(base: BaseMetric, aggregation: Aggregation) -> Self {
        Self { base, aggregation }
    }
}

impl Default for IdentityMetric {
    fn default() -> Self {
        Self::new(BaseMetric::NormalisedLevenshtein, Aggregation::MeanOfPresent)
    }
}

impl Metric<Record> for IdentityMetric {
    fn distance(&self, a: &Record, b: &Record) -> LinkageResult<Distance> {
        CompositeMetric::mapped(
            self.base,
            a.kind().identity_fields().to_vec(),
            b.kind().identity_fields().to_vec(),
            self.aggregation,
        )?
        .distance(a, b)
    }

    fn name(&self) -> String {
        format!("{} of {} over parents", self.aggregation, self.base.name())
    }

    fn satisfies_triangle_inequality(&self) -> bool {
        keeps_triangle_inequality(self.base, self.aggregation)
    }
}
