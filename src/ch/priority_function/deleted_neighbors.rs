use super::PriorityFunction;
use crate::{ch::vertex_info::VertexInfo, graphs::adjacency_store::AdjacencyStore};

/// Number of already contracted neighbours; spreads contraction uniformly.
pub struct DeletedNeighbors {}

impl PriorityFunction for DeletedNeighbors {
    fn priority(&self, info: &VertexInfo) -> i32 {
        info.contracted_neighbors as i32
    }

    fn initialize(&mut self, _store: &AdjacencyStore) {}
}

impl Default for DeletedNeighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletedNeighbors {
    pub fn new() -> Self {
        Self {}
    }
}
