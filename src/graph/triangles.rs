//! Detection of open triangles: `x - y - z` chains whose closing edge is missing.
use std::collections::BTreeMap;

use tracing::info;

use crate::graph::store::{GraphStore, TrianglePattern};
use crate::utils::types::{Distance, RecordId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenTriangle {
    pub x: RecordId,
    pub y: RecordId,
    pub z: RecordId,
    pub xy_distance: Distance,
    pub yz_distance: Distance,
}

/// One leg `y - z` hanging off a shared pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chain {
    pub y: RecordId,
    pub z: RecordId,
    pub xy_distance: Distance,
    pub yz_distance: Distance,
}

/// Every open triangle sharing the pivot `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTriangleCluster {
    pub x: RecordId,
    pub chains: Vec<Chain>,
}

impl OpenTriangleCluster {
    /// Distinct records of the cluster, pivot first.
    pub fn members(&self) -> Vec<RecordId> {
        let mut members = vec![self.x];
        for chain in &self.chains {
            for id in [chain.y, chain.z] {
                if !members.contains(&id) {
                    members.push(id);
                }
            }
        }
        members
    }

    pub fn triangles(&self) -> impl Iterator<Item = OpenTriangle> + '_ {
        self.chains.iter().map(|c| OpenTriangle {
            x: self.x,
            y: c.y,
            z: c.z,
            xy_distance: c.xy_distance,
            yz_distance: c.yz_distance,
        })
    }
}

pub struct OpenTriangleDetector {
    pattern: TrianglePattern,
}

impl OpenTriangleDetector {
    pub fn new(pattern: TrianglePattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &TrianglePattern {
        &self.pattern
    }

    /// Open triangles currently in the graph. When the pattern cannot tell
    /// `x` from `z`, each triangle is reported once, with `x < z`.
    pub fn detect(&self, graph: &dyn GraphStore) -> Vec<OpenTriangle> {
        let mirrored = self.pattern.is_mirrored();
        graph
            .match_two_edge_paths(&self.pattern)
            .into_iter()
            .filter(|p| !mirrored || p.x < p.z)
            .map(|p| OpenTriangle {
                x: p.x,
                y: p.y,
                z: p.z,
                xy_distance: p.xy.distance,
                yz_distance: p.yz.distance,
            })
            .collect()
    }

    /// Open triangles grouped by pivot, in pivot order.
    pub fn detect_clusters(&self, graph: &dyn GraphStore) -> Vec<OpenTriangleCluster> {
        let mut by_pivot: BTreeMap<RecordId, Vec<Chain>> = BTreeMap::new();
        for t in self.detect(graph) {
            by_pivot.entry(t.x).or_default().push(Chain {
                y: t.y,
                z: t.z,
                xy_distance: t.xy_distance,
                yz_distance: t.yz_distance,
            });
        }
        let clusters: Vec<_> = by_pivot
            .into_iter()
            .map(|(x, chains)| OpenTriangleCluster { x, chains })
            .collect();
        info!("{} open triangle clusters found", clusters.len());
        clusters
    }
}

/// Number of open triangles matching `pattern`, each counted once.
pub fn count_open_triangles(graph: &dyn GraphStore, pattern: &TrianglePattern) -> usize {
    OpenTriangleDetector::new(pattern.clone()).detect(graph).len()
}
