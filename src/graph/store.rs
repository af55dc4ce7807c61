use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::utils::types::{Distance, EdgeType, RecordId, RecordKind};

/// A typed, undirected relationship between two stored records. Endpoints are
/// kept in ascending id order.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub a: RecordId,
    pub b: RecordId,
    pub edge_type: EdgeType,
    pub distance: Distance,
    /// Fields holding a real value on both records when the edge was made.
    pub fields_populated: usize,
    /// Rule or linkage that produced the edge.
    pub provenance: String,
}

impl Edge {
    pub fn other(&self, id: RecordId) -> RecordId {
        if self.a == id { self.b } else { self.a }
    }
}

fn ordered(a: RecordId, b: RecordId) -> (RecordId, RecordId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Shape of the two-edge paths to look for: `x -[edge_type]- y -[edge_type]- z`
/// with no `x -[edge_type]- z`, optionally restricting the kind at each position.
#[derive(Debug, Clone, PartialEq)]
pub struct TrianglePattern {
    pub edge_type: EdgeType,
    pub x_kind: Option<RecordKind>,
    pub y_kind: Option<RecordKind>,
    pub z_kind: Option<RecordKind>,
}

impl TrianglePattern {
    pub fn new(edge_type: EdgeType) -> Self {
        Self { edge_type, x_kind: None, y_kind: None, z_kind: None }
    }

    pub fn with_kinds(mut self, x: RecordKind, y: RecordKind, z: RecordKind) -> Self {
        self.x_kind = Some(x);
        self.y_kind = Some(y);
        self.z_kind = Some(z);
        self
    }

    /// True when a path and its reverse can both match.
    pub fn is_mirrored(&self) -> bool {
        self.x_kind == self.z_kind
    }
}

/// A matched path with the metadata of both edges.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoEdgePath {
    pub x: RecordId,
    pub y: RecordId,
    pub z: RecordId,
    pub xy: Edge,
    pub yz: Edge,
}

/// The link graph as seen by detection and resolution.
///
/// Mutations are idempotent: creating an existing edge or deleting an absent
/// one changes nothing and returns `false`.
pub trait GraphStore {
    fn add_node(&mut self, id: RecordId, kind: RecordKind);

    fn node_kind(&self, id: RecordId) -> Option<RecordKind>;

    fn nodes(&self) -> Vec<RecordId>;

    fn edge(&self, a: RecordId, b: RecordId, edge_type: EdgeType) -> Option<Edge>;

    fn has_edge(&self, a: RecordId, b: RecordId, edge_type: EdgeType) -> bool {
        self.edge(a, b, edge_type).is_some()
    }

    /// Ids joined to `id` by an edge of the given type, ascending.
    fn neighbours(&self, id: RecordId, edge_type: EdgeType) -> Vec<RecordId>;

    fn edges(&self, edge_type: EdgeType) -> Vec<Edge>;

    fn create_edge(
        &mut self,
        a: RecordId,
        b: RecordId,
        edge_type: EdgeType,
        distance: Distance,
        fields_populated: usize,
        provenance: &str,
    ) -> bool;

    /// Removes the typed edge and leaves a [`EdgeType::Deleted`] marker between
    /// the same records carrying `provenance`.
    fn delete_edge(&mut self, a: RecordId, b: RecordId, edge_type: EdgeType, provenance: &str) -> bool;

    /// All paths matching `pattern` whose chain carries no deletion marker.
    /// A path and its reverse are both reported.
    fn match_two_edge_paths(&self, pattern: &TrianglePattern) -> Vec<TwoEdgePath> {
        let kind_matches = |id: RecordId, wanted: Option<RecordKind>| match wanted {
            Some(kind) => self.node_kind(id) == Some(kind),
            None => true,
        };

        let mut paths = Vec::new();
        for y in self.nodes() {
            if !kind_matches(y, pattern.y_kind) {
                continue;
            }
            let around = self.neighbours(y, pattern.edge_type);
            for &x in &around {
                if !kind_matches(x, pattern.x_kind) || self.has_edge(x, y, EdgeType::Deleted) {
                    continue;
                }
                for &z in &around {
                    if z == x
                        || !kind_matches(z, pattern.z_kind)
                        || self.has_edge(x, z, pattern.edge_type)
                        || self.has_edge(z, y, EdgeType::Deleted)
                    {
                        continue;
                    }
                    if let (Some(xy), Some(yz)) = (
                        self.edge(x, y, pattern.edge_type),
                        self.edge(y, z, pattern.edge_type),
                    ) {
                        paths.push(TwoEdgePath { x, y, z, xy, yz });
                    }
                }
            }
        }
        paths
    }
}

/// Graph held in ordered maps, so every listing is deterministic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGraph {
    kinds: BTreeMap<RecordId, RecordKind>,
    edges: BTreeMap<(RecordId, RecordId, EdgeType), Edge>,
    adjacency: BTreeMap<(RecordId, EdgeType), BTreeSet<RecordId>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn edge_count(&self, edge_type: EdgeType) -> usize {
        self.edges.keys().filter(|(_, _, t)| *t == edge_type).count()
    }

    fn insert(&mut self, edge: Edge) {
        self.adjacency.entry((edge.a, edge.edge_type)).or_default().insert(edge.b);
        self.adjacency.entry((edge.b, edge.edge_type)).or_default().insert(edge.a);
        self.edges.insert((edge.a, edge.b, edge.edge_type), edge);
    }

    fn remove(&mut self, a: RecordId, b: RecordId, edge_type: EdgeType) -> Option<Edge> {
        let removed = self.edges.remove(&(a, b, edge_type))?;
        if let Some(set) = self.adjacency.get_mut(&(a, edge_type)) {
            set.remove(&b);
        }
        if let Some(set) = self.adjacency.get_mut(&(b, edge_type)) {
            set.remove(&a);
        }
        Some(removed)
    }
}

impl GraphStore for InMemoryGraph {
    fn add_node(&mut self, id: RecordId, kind: RecordKind) {
        self.kinds.insert(id, kind);
    }

    fn node_kind(&self, id: RecordId) -> Option<RecordKind> {
        self.kinds.get(&id).copied()
    }

    fn nodes(&self) -> Vec<RecordId> {
        let mut ids: BTreeSet<RecordId> = self.kinds.keys().copied().collect();
        ids.extend(self.adjacency.keys().map(|(id, _)| *id));
        ids.into_iter().collect()
    }

    fn edge(&self, a: RecordId, b: RecordId, edge_type: EdgeType) -> Option<Edge> {
        let (a, b) = ordered(a, b);
        self.edges.get(&(a, b, edge_type)).cloned()
    }

    fn has_edge(&self, a: RecordId, b: RecordId, edge_type: EdgeType) -> bool {
        let (a, b) = ordered(a, b);
        self.edges.contains_key(&(a, b, edge_type))
    }

    fn neighbours(&self, id: RecordId, edge_type: EdgeType) -> Vec<RecordId> {
        self.adjacency
            .get(&(id, edge_type))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn edges(&self, edge_type: EdgeType) -> Vec<Edge> {
        self.edges
            .values()
            .filter(|e| e.edge_type == edge_type)
            .cloned()
            .collect()
    }

    fn create_edge(
        &mut self,
        a: RecordId,
        b: RecordId,
        edge_type: EdgeType,
        distance: Distance,
        fields_populated: usize,
        provenance: &str,
    ) -> bool {
        if a == b || self.has_edge(a, b, edge_type) {
            return false;
        }
        let (a, b) = ordered(a, b);
        debug!("create {edge_type} {a}-{b} ({provenance})");
        self.insert(Edge {
            a,
            b,
            edge_type,
            distance,
            fields_populated,
            provenance: provenance.to_string(),
        });
        true
    }

    fn delete_edge(&mut self, a: RecordId, b: RecordId, edge_type: EdgeType, provenance: &str) -> bool {
        let (a, b) = ordered(a, b);
        let Some(removed) = self.remove(a, b, edge_type) else {
            return false;
        };
        debug!("delete {edge_type} {a}-{b} ({provenance})");
        if edge_type != EdgeType::Deleted && !self.has_edge(a, b, EdgeType::Deleted) {
            self.insert(Edge {
                a,
                b,
                edge_type: EdgeType::Deleted,
                distance: removed.distance,
                fields_populated: removed.fields_populated,
                provenance: provenance.to_string(),
            });
        }
        true
    }
}
