//! Minimum spanning edit distance: how tightly a group of strings hangs
//! together, as the mean edge weight of their minimum spanning tree under
//! normalised edit distance.
use std::collections::BTreeSet;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::metric::{distance, BaseMetric};
use crate::resolver::normalise::{self, Identity};
use crate::utils::types::{Distance, RecordId};

/// Identity fields joined as compared by MSED.
pub fn identity_string(identity: &Identity) -> String {
    identity.iter().map(|v| format!("{v}/")).collect()
}

/// Identity strings of a whole family, canonicalised as one group.
pub fn family_strings(mut family: Vec<Identity>) -> Vec<String> {
    normalise::canonicalise(&mut family);
    family.iter().map(identity_string).collect()
}

/// MSED of a group; 0 for fewer than two strings.
pub fn msed<S: AsRef<str>>(strings: &[S]) -> Distance {
    let n = strings.len();
    if n < 2 {
        return 0.0;
    }

    // Prim's algorithm over the complete graph.
    let mut in_tree = vec![false; n];
    let mut best = vec![Distance::INFINITY; n];
    best[0] = 0.0;
    let mut total = 0.0;

    for _ in 0..n {
        let Some(next) = (0..n)
            .filter(|&i| !in_tree[i])
            .min_by_key(|&i| OrderedFloat(best[i]))
        else {
            break;
        };
        in_tree[next] = true;
        total += best[next];

        for i in 0..n {
            if !in_tree[i] {
                let d = distance(strings[next].as_ref(), strings[i].as_ref(), BaseMetric::NormalisedLevenshtein);
                if d < best[i] {
                    best[i] = d;
                }
            }
        }
    }
    total / (n - 1) as Distance
}

/// Every `k`-subset of `members` with its MSED, best first.
pub fn ranked_subsets(members: &[(RecordId, String)], k: usize) -> Vec<(Vec<RecordId>, Distance)> {
    members
        .iter()
        .combinations(k)
        .map(|subset| {
            let ids = subset.iter().map(|(id, _)| *id).collect::<Vec<_>>();
            let strings = subset.iter().map(|(_, s)| s.as_str()).collect::<Vec<_>>();
            (ids, msed(&strings))
        })
        .sorted_by_key(|(_, d)| OrderedFloat(*d))
        .collect()
}

/// Greedily grows families from a ranked subset list.
///
/// The best subset seeds the first family. Each following subset joins the
/// first family it shares a member with, or starts a new one, until a subset
/// either grows the distance by more than `ratio_bound` relative to the
/// previous one or exceeds `absolute_bound`.
pub fn grow_families(
    ranked: &[(Vec<RecordId>, Distance)],
    ratio_bound: f64,
    absolute_bound: Distance,
) -> Vec<BTreeSet<RecordId>> {
    let Some((first, _)) = ranked.first() else {
        return Vec::new();
    };
    let mut families = vec![first.iter().copied().collect::<BTreeSet<_>>()];

    for pair in ranked.windows(2) {
        let (previous, current) = (pair[0].1, pair[1].1);
        let growth_violated = if previous == 0.0 {
            current > 0.0
        } else {
            (current - previous) / previous > ratio_bound
        };
        if growth_violated || current > absolute_bound {
            break;
        }
        add_family(&mut families, pair[1].0.iter().copied());
    }
    families
}

/// Merges `members` into the first family sharing one of them, or adds them
/// as a new family.
pub fn add_family(families: &mut Vec<BTreeSet<RecordId>>, members: impl IntoIterator<Item = RecordId>) {
    let members: Vec<RecordId> = members.into_iter().collect();
    match families
        .iter_mut()
        .find(|family| members.iter().any(|m| family.contains(m)))
    {
        Some(family) => family.extend(members),
        None => families.push(members.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(values: [&str; 4]) -> Identity {
        values.map(str::to_string)
    }

    #[test]
    fn family_strings_reconcile_across_all_members() {
        // Only the last member uses MARIA on its own.
        let strings = family_strings(vec![
            identity(["ANDERS", "ANNA MARIA", "PERSSON", "OLSDOTTER"]),
            identity(["ANDERS", "ANNA MARIA", "PERSSON", "OLSD."]),
            identity(["ANDERS", "ANNA MARIA", "PERSON", "OLSDOTTER"]),
            identity(["ANDERS", "MARIA", "PERSSON", "OLSDOTTER"]),
        ]);
        assert_eq!(strings[0], "ANDERS/MARIA/PERSSON/OLSDOTTER/");
        assert_eq!(strings[1], strings[0]);
        assert_eq!(strings[2], "ANDERS/MARIA/PERSON/OLSDOTTER/");
        assert_eq!(strings[3], strings[0]);
    }

    #[test]
    fn msed_of_identical_strings_is_zero() {
        assert_eq!(msed(&["ANNA/", "ANNA/", "ANNA/"]), 0.0);
        assert_eq!(msed(&["ANNA/"]), 0.0);
    }

    #[test]
    fn msed_takes_cheapest_spanning_edges() {
        // ABCD-ABCE and ABCE-ABCF cost 0.25 each; ABCD-ABCF also 0.25.
        let d = msed(&["ABCD", "ABCE", "ABCF"]);
        assert!((d - 0.25).abs() < 1e-9);

        let d = msed(&["ABCD", "ABCD", "WXYZ"]);
        assert!((d - 0.5).abs() < 1e-9);
    }

    #[test]
    fn families_grow_until_distance_jumps() {
        let ranked = vec![
            (vec![1, 2, 3], 0.004),
            (vec![2, 3, 4], 0.005),
            (vec![5, 6, 7], 0.006),
            (vec![1, 5, 8], 0.02),
        ];
        let families = grow_families(&ranked, 0.5, 0.01);
        assert_eq!(families.len(), 2);
        assert_eq!(families[0], BTreeSet::from([1, 2, 3, 4]));
        assert_eq!(families[1], BTreeSet::from([5, 6, 7]));
    }

    #[test]
    fn zero_distance_runs_stop_at_first_positive() {
        let ranked = vec![(vec![1, 2, 3], 0.0), (vec![1, 2, 4], 0.0), (vec![1, 3, 5], 0.001)];
        let families = grow_families(&ranked, 0.5, 0.01);
        assert_eq!(families, vec![BTreeSet::from([1, 2, 3, 4])]);
    }
}
