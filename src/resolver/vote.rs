use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::graph::GraphStore;
use crate::resolver::provenance;
use crate::utils::config::ResolverConfig;
use crate::utils::types::{Distance, RecordId};

/// Outcome of weighing competing explanations of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum Vote {
    /// Fewer than two explanations, or none shared by the whole bundle.
    NoContest,
    /// Keep `winner`; the listed explanation edges lose.
    Keep {
        winner: RecordId,
        discard: Vec<(RecordId, RecordId)>,
        provenance: &'static str,
    },
    /// Several shared explanations and none clearly closest.
    Ambiguous,
}

/// Weighs the explanation edges leaving `members`.
///
/// An explanation is any node the bundle reaches over the explanation
/// relationship. One shared by every member wins outright; among several
/// shared ones the closest wins only if its mean distance is under the
/// clarity threshold.
pub fn vote(graph: &dyn GraphStore, members: &[RecordId], config: &ResolverConfig) -> Vote {
    let relation = config.explanation_edge_type;

    // explanation -> (member, distance) for every edge into it
    let mut explanations: BTreeMap<RecordId, Vec<(RecordId, Distance)>> = BTreeMap::new();
    for &member in members {
        for target in graph.neighbours(member, relation) {
            if members.contains(&target) {
                continue;
            }
            if let Some(edge) = graph.edge(member, target, relation) {
                explanations.entry(target).or_default().push((member, edge.distance));
            }
        }
    }
    if explanations.len() < 2 {
        return Vote::NoContest;
    }

    let agreed: Vec<(RecordId, Distance)> = explanations
        .iter()
        .filter(|(_, backers)| members.iter().all(|m| backers.iter().any(|(b, _)| b == m)))
        .map(|(&target, backers)| (target, backers.iter().map(|(_, d)| d).sum()))
        .collect();

    let (winner, provenance) = match agreed.as_slice() {
        [] => return Vote::NoContest,
        [(only, _)] => (*only, provenance::SOLE_EXPLANATION),
        several => {
            let Some(&(best, total)) = several.iter().min_by_key(|(_, total)| OrderedFloat(*total)) else {
                return Vote::NoContest;
            };
            if total / members.len() as Distance >= config.clarity_threshold {
                return Vote::Ambiguous;
            }
            (best, provenance::CLARITY_VOTE)
        }
    };

    let discard = explanations
        .iter()
        .filter(|(target, _)| **target != winner)
        .flat_map(|(&target, backers)| backers.iter().map(move |&(member, _)| (member, target)))
        .collect();

    Vote::Keep { winner, discard, provenance }
}
