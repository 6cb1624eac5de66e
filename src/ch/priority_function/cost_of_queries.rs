use super::PriorityFunction;
use crate::{ch::vertex_info::VertexInfo, graphs::adjacency_store::AdjacencyStore};

/// Upper bound on the number of hierarchy levels below a vertex, which bounds
/// the length of upward searches through it.
pub struct CostOfQueries {
    costs: Vec<i32>,
}

impl PriorityFunction for CostOfQueries {
    fn priority(&self, info: &VertexInfo) -> i32 {
        self.costs.get(info.vertex as usize).copied().unwrap_or(0)
    }

    fn update(&mut self, info: &VertexInfo) {
        let Some(&cost) = self.costs.get(info.vertex as usize) else {
            return;
        };
        let cost = cost + 1;

        for neighbor in info.neighbors() {
            if let Some(neighbor_cost) = self.costs.get_mut(neighbor as usize) {
                *neighbor_cost = (*neighbor_cost).max(cost);
            }
        }
    }

    fn initialize(&mut self, store: &AdjacencyStore) {
        self.costs = vec![0; store.number_of_vertices() as usize];
    }
}

impl Default for CostOfQueries {
    fn default() -> Self {
        Self::new()
    }
}

impl CostOfQueries {
    pub fn new() -> Self {
        Self { costs: Vec::new() }
    }
}
