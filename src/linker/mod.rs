pub mod link;
pub mod similarity;
pub mod viability;

use tracing::info;

use crate::graph::GraphStore;

pub use link::Link;
pub use similarity::{LinkBatches, LinkageStats, Links, SimilaritySearchLinker};
pub use viability::Viability;

/// Writes links into the graph as edges. Returns how many were new.
pub fn persist_links(links: impl IntoIterator<Item = Link>, graph: &mut dyn GraphStore) -> usize {
    let mut created = 0;
    let mut total = 0;
    for link in links {
        total += 1;
        graph.add_node(link.record1, link.kind1);
        graph.add_node(link.record2, link.kind2);
        if graph.create_edge(
            link.record1,
            link.record2,
            link.link_type,
            link.distance,
            link.fields_populated,
            &link.provenance,
        ) {
            created += 1;
        }
    }
    info!("persisted {created} of {total} links");
    created
}
