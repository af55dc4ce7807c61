use linkage::graph::{count_open_triangles, GraphStore, InMemoryGraph, OpenTriangleDetector, TrianglePattern};
use linkage::utils::types::{EdgeType, RecordId, RecordKind};

fn births(graph: &mut InMemoryGraph, ids: &[RecordId]) {
    for &id in ids {
        graph.add_node(id, RecordKind::Birth);
    }
}

fn sibling(graph: &mut InMemoryGraph, a: RecordId, b: RecordId) -> bool {
    graph.create_edge(a, b, EdgeType::Sibling, 0.1, 4, "test")
}

fn sibling_pattern() -> TrianglePattern {
    TrianglePattern::new(EdgeType::Sibling).with_kinds(RecordKind::Birth, RecordKind::Birth, RecordKind::Birth)
}

#[test]
fn test_create_edge_is_idempotent() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 2]);

    assert!(sibling(&mut graph, 1, 2));
    assert!(!sibling(&mut graph, 1, 2));
    assert!(!sibling(&mut graph, 2, 1), "edges are undirected");
    assert!(!sibling(&mut graph, 1, 1), "no self loops");
    assert_eq!(graph.edge_count(EdgeType::Sibling), 1);

    let edge = graph.edge(2, 1, EdgeType::Sibling).unwrap();
    assert_eq!((edge.a, edge.b), (1, 2));
    assert_eq!(edge.other(1), 2);
    assert_eq!(edge.fields_populated, 4);
    assert_eq!(edge.provenance, "test");
}

#[test]
fn test_edge_types_are_independent() {
    let mut graph = InMemoryGraph::new();
    assert!(sibling(&mut graph, 1, 2));
    assert!(graph.create_edge(1, 2, EdgeType::Id, 0.3, 2, "id"));
    assert_eq!(graph.neighbours(1, EdgeType::Sibling), vec![2]);
    assert_eq!(graph.neighbours(1, EdgeType::Id), vec![2]);
    assert!(graph.neighbours(3, EdgeType::Sibling).is_empty());
}

#[test]
fn test_delete_leaves_marker() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 2]);
    sibling(&mut graph, 1, 2);

    assert!(graph.delete_edge(2, 1, EdgeType::Sibling, "max_age_range"));
    assert!(!graph.has_edge(1, 2, EdgeType::Sibling));
    let marker = graph.edge(1, 2, EdgeType::Deleted).unwrap();
    assert_eq!(marker.provenance, "max_age_range");
    assert_eq!(marker.distance, 0.1);

    assert!(!graph.delete_edge(1, 2, EdgeType::Sibling, "again"), "deleting twice changes nothing");
    assert_eq!(graph.edge(1, 2, EdgeType::Deleted).unwrap().provenance, "max_age_range");
    assert_eq!(graph.edge_count(EdgeType::Deleted), 1);
}

#[test]
fn test_open_triangle_reported_once() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 2, 3]);
    sibling(&mut graph, 1, 2);
    sibling(&mut graph, 2, 3);

    let detector = OpenTriangleDetector::new(sibling_pattern());
    let triangles = detector.detect(&graph);
    println!("{triangles:?}");
    assert_eq!(triangles.len(), 1);
    let t = triangles[0];
    assert_eq!((t.x, t.y, t.z), (1, 2, 3));
    assert_eq!(t.xy_distance, 0.1);

    sibling(&mut graph, 1, 3);
    assert_eq!(count_open_triangles(&graph, &sibling_pattern()), 0);
}

#[test]
fn test_deleted_marker_hides_chain() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 2, 3]);
    sibling(&mut graph, 1, 2);
    sibling(&mut graph, 2, 3);

    graph.create_edge(1, 2, EdgeType::Deleted, 0.0, 0, "manual review");
    assert_eq!(count_open_triangles(&graph, &sibling_pattern()), 0);
}

#[test]
fn test_kind_constraints_select_paths() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 3]);
    graph.add_node(2, RecordKind::Death);
    sibling(&mut graph, 1, 2);
    sibling(&mut graph, 2, 3);

    assert_eq!(count_open_triangles(&graph, &sibling_pattern()), 0);

    let around_death = TrianglePattern::new(EdgeType::Sibling).with_kinds(
        RecordKind::Birth,
        RecordKind::Death,
        RecordKind::Birth,
    );
    assert_eq!(count_open_triangles(&graph, &around_death), 1);

    // Unconstrained, every path and its reverse match; x < z keeps one.
    assert_eq!(count_open_triangles(&graph, &TrianglePattern::new(EdgeType::Sibling)), 1);
}

#[test]
fn test_asymmetric_pattern_keeps_both_directions() {
    let mut graph = InMemoryGraph::new();
    graph.add_node(1, RecordKind::Birth);
    graph.add_node(2, RecordKind::Birth);
    graph.add_node(3, RecordKind::Death);
    sibling(&mut graph, 1, 2);
    sibling(&mut graph, 2, 3);

    let pattern = TrianglePattern::new(EdgeType::Sibling).with_kinds(
        RecordKind::Death,
        RecordKind::Birth,
        RecordKind::Birth,
    );
    assert!(!pattern.is_mirrored());
    let triangles = OpenTriangleDetector::new(pattern).detect(&graph);
    assert_eq!(triangles.len(), 1);
    assert_eq!((triangles[0].x, triangles[0].z), (3, 1));
}

#[test]
fn test_clusters_group_by_pivot() {
    let mut graph = InMemoryGraph::new();
    births(&mut graph, &[1, 2, 3, 4]);
    // Star around 2: every pair of leaves forms an open triangle.
    sibling(&mut graph, 1, 2);
    sibling(&mut graph, 2, 3);
    sibling(&mut graph, 2, 4);

    let clusters = OpenTriangleDetector::new(sibling_pattern()).detect_clusters(&graph);
    let summary: Vec<(RecordId, usize)> = clusters.iter().map(|c| (c.x, c.chains.len())).collect();
    println!("{summary:?}");
    assert_eq!(summary, vec![(1, 2), (3, 1)]);

    let first = &clusters[0];
    assert_eq!(first.members(), vec![1, 2, 3, 4]);
    assert_eq!(first.triangles().count(), 2);
    assert_eq!(count_open_triangles(&graph, &sibling_pattern()), 3);
}

#[test]
fn test_nodes_include_edge_endpoints() {
    let mut graph = InMemoryGraph::new();
    graph.add_node(5, RecordKind::Marriage);
    sibling(&mut graph, 7, 9);
    assert_eq!(graph.nodes(), vec![5, 7, 9]);
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node_kind(7), None);
    assert_eq!(graph.edges(EdgeType::Sibling).len(), 1);
}
