use super::PriorityFunction;
use crate::{ch::vertex_info::VertexInfo, graphs::adjacency_store::AdjacencyStore};

/// Like the edge difference, but counting the original edges each record
/// stands for. Keeps long shortcut chains from piling up.
#[derive(Default)]
pub struct OriginalEdges {}

impl OriginalEdges {
    pub fn new() -> Self {
        Self {}
    }
}

impl PriorityFunction for OriginalEdges {
    fn priority(&self, info: &VertexInfo) -> i32 {
        info.original_edges_difference()
    }

    fn initialize(&mut self, _store: &AdjacencyStore) {}
}
