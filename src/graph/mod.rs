pub mod store;
pub mod triangles;

pub use store::{Edge, GraphStore, InMemoryGraph, TrianglePattern, TwoEdgePath};
pub use triangles::{count_open_triangles, Chain, OpenTriangle, OpenTriangleCluster, OpenTriangleDetector};
