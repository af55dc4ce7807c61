//! Average-linkage hierarchical clustering over a candidate family.
//!
//! Nodes live in an arena and refer to their children by index, so a whole
//! dendrogram is dropped at once after resolution.
use crate::utils::types::{Distance, RecordId};

pub type ClusterId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    pub members: Vec<RecordId>,
    /// Average linkage distance at which the children merged; 0 for leaves.
    pub distance: Distance,
    pub left: Option<ClusterId>,
    pub right: Option<ClusterId>,
}

impl ClusterNode {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dendrogram {
    nodes: Vec<ClusterNode>,
    root: Option<ClusterId>,
}

impl Dendrogram {
    /// Builds the tree bottom-up. `matrix[i][j]` is the distance between
    /// `ids[i]` and `ids[j]`, `None` where it could not be computed. Such
    /// pairs are left out of averages; clusters with no computed pair between
    /// them sit at `unknown` distance.
    pub fn average_linkage(ids: &[RecordId], matrix: &[Vec<Option<Distance>>], unknown: Distance) -> Self {
        let mut nodes: Vec<ClusterNode> = ids
            .iter()
            .map(|&id| ClusterNode {
                members: vec![id],
                distance: 0.0,
                left: None,
                right: None,
            })
            .collect();

        // links[a][b]: sum and count of the computed member distances between
        // clusters a and b, updated on every merge instead of recomputed.
        let capacity = (2 * ids.len()).saturating_sub(1);
        let mut links = vec![vec![PairSum::default(); capacity]; capacity];
        for (i, row) in matrix.iter().enumerate().take(ids.len()) {
            for (j, d) in row.iter().enumerate().take(ids.len()) {
                match *d {
                    Some(d) if i != j => links[i][j] = PairSum { sum: d, count: 1 },
                    _ => {}
                }
            }
        }
        let mut active: Vec<ClusterId> = (0..ids.len()).collect();

        while active.len() > 1 {
            let mut best: Option<(usize, usize, Distance)> = None;
            for a in 0..active.len() {
                for b in a + 1..active.len() {
                    let d = links[active[a]][active[b]].average(unknown);
                    if best.is_none_or(|(_, _, bd)| d < bd) {
                        best = Some((a, b, d));
                    }
                }
            }
            let Some((a, b, distance)) = best else { break };

            let right_id = active.remove(b);
            let left_id = active.remove(a);
            let merged = nodes.len();
            for &k in &active {
                let combined = links[left_id][k].add(links[right_id][k]);
                links[merged][k] = combined;
                links[k][merged] = combined;
            }
            let members = nodes[left_id]
                .members
                .iter()
                .chain(&nodes[right_id].members)
                .copied()
                .collect();
            nodes.push(ClusterNode {
                members,
                distance,
                left: Some(left_id),
                right: Some(right_id),
            });
            active.push(merged);
        }

        let root = active.first().copied();
        Self { nodes, root }
    }

    pub fn root(&self) -> Option<ClusterId> {
        self.root
    }

    pub fn node(&self, id: ClusterId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Member groups to separate: a node is split when its merge distance
    /// exceeds `reject` while one child is tight (two or more members merged
    /// under `matched`). Every child larger than two is examined in turn.
    pub fn splits(&self, matched: Distance, reject: Distance) -> Vec<(Vec<RecordId>, Vec<RecordId>)> {
        let mut splits = Vec::new();
        let mut pending: Vec<ClusterId> = self.root.into_iter().collect();

        while let Some(id) = pending.pop() {
            let node = &self.nodes[id];
            let (Some(left), Some(right)) = (node.left, node.right) else {
                continue;
            };
            let (l, r) = (&self.nodes[left], &self.nodes[right]);
            let tight = |c: &ClusterNode| c.size() >= 2 && c.distance < matched;

            if node.distance > reject && (tight(l) || tight(r)) {
                splits.push((l.members.clone(), r.members.clone()));
            }
            for child in [left, right] {
                if self.nodes[child].size() > 2 {
                    pending.push(child);
                }
            }
        }
        splits
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PairSum {
    sum: Distance,
    count: usize,
}

impl PairSum {
    fn add(self, other: PairSum) -> PairSum {
        PairSum { sum: self.sum + other.sum, count: self.count + other.count }
    }

    fn average(self, unknown: Distance) -> Distance {
        if self.count == 0 {
            unknown
        } else {
            self.sum / self.count as Distance
        }
    }
}
