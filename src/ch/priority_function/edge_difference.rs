use super::PriorityFunction;
use crate::{ch::vertex_info::VertexInfo, graphs::adjacency_store::AdjacencyStore};

/// Shortcuts added minus records removed.
pub struct EdgeDifference {}

impl Default for EdgeDifference {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDifference {
    pub fn new() -> Self {
        Self {}
    }
}

impl PriorityFunction for EdgeDifference {
    fn priority(&self, info: &VertexInfo) -> i32 {
        info.shortcuts.len() as i32 - info.incoming.len() as i32 - info.outgoing.len() as i32
    }

    fn initialize(&mut self, _store: &AdjacencyStore) {}
}
