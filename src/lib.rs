use std::sync::Arc;

use ch::{
    contracted_graph::ContractedGraph,
    contraction_params::ContractionParams,
    contractor::{ContractionStats, HierarchyBuilder},
};
use error::Result;
use graphs::{
    adjacency_store::AdjacencyStore,
    edge::{Direction, EdgeLayout},
    network::{RoadNetwork, WeightFunction},
    path::{EdgePath, Path},
    restrictions::{RestrictionSet, RestrictionSource},
    Graph, Weight,
};
use search::{
    bidirectional,
    dijkstra::Dijkstra,
    many_to_many::{many_to_many, DistanceMatrix, ManyToManyOptions},
    turns::TurnRules,
    SearchOptions,
};

pub mod ch;
pub mod error;
pub mod graphs;
pub mod queue;
pub mod search;
pub mod utility;

/// Loads `network` with `weights` into a store of the given layout and
/// contracts it. Fails before contracting on malformed or unsupported input.
pub fn build_contracted_graph(
    network: &RoadNetwork,
    weights: &(impl WeightFunction + ?Sized),
    restrictions: &impl RestrictionSource,
    layout: EdgeLayout,
    params: &ContractionParams,
) -> Result<(ContractedGraph, ContractionStats)> {
    let store = AdjacencyStore::from_network(network, weights, layout)?;
    let restrictions = RestrictionSet::from_source(restrictions, network.number_of_vertices())?;
    contract_store(store, restrictions, params)
}

/// Contracts an already loaded store.
pub fn contract_store(
    store: AdjacencyStore,
    restrictions: RestrictionSet,
    params: &ContractionParams,
) -> Result<(ContractedGraph, ContractionStats)> {
    HierarchyBuilder::new(params.clone()).build(store, restrictions)
}

/// Shortest route between the candidate roots of two locations, `Ok(None)`
/// if there is none.
pub fn shortest_path(
    graph: &ContractedGraph,
    sources: &[Arc<EdgePath>],
    targets: &[Arc<EdgePath>],
) -> Result<Option<Path>> {
    bidirectional::shortest_path(graph, sources, targets, &SearchOptions::default())
}

/// Source by target weights, [`Weight::MAX`] where unreachable.
pub fn distance_matrix(
    graph: &ContractedGraph,
    sources: &[Vec<Arc<EdgePath>>],
    targets: &[Vec<Arc<EdgePath>>],
) -> Result<Vec<Vec<Weight>>> {
    Ok(distance_matrix_with_diagnostics(graph, sources, targets, &ManyToManyOptions::default())?.weights)
}

pub fn distance_matrix_with_diagnostics(
    graph: &ContractedGraph,
    sources: &[Vec<Arc<EdgePath>>],
    targets: &[Vec<Arc<EdgePath>>],
    options: &ManyToManyOptions,
) -> Result<DistanceMatrix> {
    many_to_many(graph, sources, targets, options, &SearchOptions::default())
}

/// Whether a forward search from `sources` gets at least `radius` away, i.e.
/// the sources are not stuck on an island smaller than that.
pub fn is_reachable_within(graph: &ContractedGraph, sources: &[Arc<EdgePath>], radius: Weight) -> Result<bool> {
    let turns = TurnRules::for_layout(graph.layout(), Some(graph.restrictions()))?;
    let outcome = Dijkstra::run_with(
        graph,
        sources.to_vec(),
        Direction::Forward,
        false,
        turns,
        SearchOptions::with_max_weight(radius),
    )?;
    Ok(outcome.max_reached)
}
