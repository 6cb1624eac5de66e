use ahash::HashMap;
use serde::{Deserialize, Serialize};

use super::{
    adjacency_store::AdjacencyStore,
    edge::{EdgeDirection, EdgeLayout, EdgePayload},
    VertexId, Weight,
};
use crate::error::{Result, RoutingError};

pub type ProfileId = u32;

/// Maps an edge profile (derived from tags by the ingestion layer) to a weight.
pub trait WeightFunction: Sync {
    fn weight(&self, profile: ProfileId) -> Option<Weight>;
}

impl WeightFunction for [Weight] {
    fn weight(&self, profile: ProfileId) -> Option<Weight> {
        self.get(profile as usize).copied()
    }
}

impl WeightFunction for Vec<Weight> {
    fn weight(&self, profile: ProfileId) -> Option<Weight> {
        self.as_slice().weight(profile)
    }
}

impl WeightFunction for HashMap<ProfileId, Weight> {
    fn weight(&self, profile: ProfileId) -> Option<Weight> {
        self.get(&profile).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub tail: VertexId,
    pub head: VertexId,
    pub profile: ProfileId,
    /// Travel is allowed in both directions with the same weight.
    pub bidirectional: bool,
}

/// The weighted directed graph handed over by the ingestion layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoadNetwork {
    number_of_vertices: u32,
    edges: Vec<NetworkEdge>,
}

impl RoadNetwork {
    pub fn new(number_of_vertices: u32) -> RoadNetwork {
        RoadNetwork {
            number_of_vertices,
            edges: Vec::new(),
        }
    }

    pub fn push(&mut self, edge: NetworkEdge) {
        self.edges.push(edge);
    }

    pub fn number_of_vertices(&self) -> u32 {
        self.number_of_vertices
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }
}

impl AdjacencyStore {
    /// Builds a store from an external network. Every directed original edge
    /// `u -> v` becomes a forward record at `u` and a backward record at `v`.
    pub fn from_network(
        network: &RoadNetwork,
        weights: &(impl WeightFunction + ?Sized),
        layout: EdgeLayout,
    ) -> Result<AdjacencyStore> {
        let mut store = AdjacencyStore::new(network.number_of_vertices(), layout);

        for edge in network.edges() {
            let weight = weights.weight(edge.profile).ok_or_else(|| {
                RoutingError::MalformedInput(format!(
                    "no weight for profile {} of edge {} -> {}",
                    edge.profile, edge.tail, edge.head
                ))
            })?;

            if edge.tail == edge.head {
                return Err(RoutingError::MalformedInput(format!(
                    "network contains a self loop at {}",
                    edge.tail
                )));
            }

            if edge.bidirectional {
                store.add_edge(edge.tail, edge.head, weight, EdgeDirection::Both, EdgePayload::Original)?;
            } else {
                store.add_edge(edge.tail, edge.head, weight, EdgeDirection::Forward, EdgePayload::Original)?;
                store.add_edge(edge.head, edge.tail, weight, EdgeDirection::Backward, EdgePayload::Original)?;
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_way_edges_get_forward_and_backward_records() {
        let mut network = RoadNetwork::new(2);
        network.push(NetworkEdge {
            tail: 0,
            head: 1,
            profile: 0,
            bidirectional: false,
        });
        let store = AdjacencyStore::from_network(&network, &vec![5.0], EdgeLayout::VertexBased).unwrap();

        let (_, at_tail) = store.edges(0).next().unwrap();
        assert_eq!(at_tail.direction(), EdgeDirection::Forward);
        let (_, at_head) = store.edges(1).next().unwrap();
        assert_eq!(at_head.direction(), EdgeDirection::Backward);
        assert_eq!(at_head.head(), 0);
    }

    #[test]
    fn missing_and_negative_weights_are_fatal() {
        let mut network = RoadNetwork::new(2);
        network.push(NetworkEdge {
            tail: 0,
            head: 1,
            profile: 3,
            bidirectional: true,
        });
        assert!(AdjacencyStore::from_network(&network, &vec![1.0], EdgeLayout::VertexBased).is_err());

        let weights: HashMap<ProfileId, Weight> = [(3, -2.0)].into_iter().collect();
        assert!(AdjacencyStore::from_network(&network, &weights, EdgeLayout::VertexBased).is_err());
    }
}
