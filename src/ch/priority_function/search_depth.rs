use super::PriorityFunction;
use crate::{ch::vertex_info::VertexInfo, graphs::adjacency_store::AdjacencyStore};

/// Deepest witness search needed to evaluate the vertex.
#[derive(Default)]
pub struct SearchDepth {}

impl SearchDepth {
    pub fn new() -> Self {
        Self {}
    }
}

impl PriorityFunction for SearchDepth {
    fn priority(&self, info: &VertexInfo) -> i32 {
        info.search_depth as i32
    }

    fn initialize(&mut self, _store: &AdjacencyStore) {}
}
