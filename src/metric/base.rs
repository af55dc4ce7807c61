use std::collections::HashSet;

use crate::utils::types::Distance;

/// String distance applied to a single pair of field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseMetric {
    /// Raw edit distance.
    Levenshtein,
    /// Edit distance divided by the longer length, in [0, 1].
    NormalisedLevenshtein,
    /// Jaccard distance over character bigrams (with boundary markers), in [0, 1].
    Jaccard,
    /// 0 when equal, 1 otherwise.
    Exact,
}

impl BaseMetric {
    pub const ALL: [BaseMetric; 4] = [
        BaseMetric::Levenshtein,
        BaseMetric::NormalisedLevenshtein,
        BaseMetric::Jaccard,
        BaseMetric::Exact,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BaseMetric::Levenshtein => "Levenshtein",
            BaseMetric::NormalisedLevenshtein => "NormalisedLevenshtein",
            BaseMetric::Jaccard => "Jaccard",
            BaseMetric::Exact => "Exact",
        }
    }

    /// Edit distance divided by the longer length is not a metric in general.
    pub fn is_metric(&self) -> bool {
        !matches!(self, BaseMetric::NormalisedLevenshtein)
    }

    pub fn max_distance_is_one(&self) -> bool {
        !matches!(self, BaseMetric::Levenshtein)
    }
}

/// Main distance dispatcher
pub fn distance(a: &str, b: &str, metric: BaseMetric) -> Distance {
    match metric {
        BaseMetric::Levenshtein => strsim::levenshtein(a, b) as Distance,
        BaseMetric::NormalisedLevenshtein => 1.0 - strsim::normalized_levenshtein(a, b),
        BaseMetric::Jaccard => jaccard_distance(a, b),
        BaseMetric::Exact => {
            if a == b { 0.0 } else { 1.0 }
        }
    }
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let padded: Vec<char> = std::iter::once('\u{2}')
        .chain(s.chars())
        .chain(std::iter::once('\u{3}'))
        .collect();
    padded.windows(2).map(|w| (w[0], w[1])).collect()
}

fn jaccard_distance(a: &str, b: &str) -> Distance {
    if a == b {
        return 0.0;
    }
    let x = bigrams(a);
    let y = bigrams(b);
    let union = x.union(&y).count();
    let intersection = x.intersection(&y).count();
    1.0 - intersection as Distance / union as Distance
}
