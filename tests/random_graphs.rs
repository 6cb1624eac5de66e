use std::sync::Arc;

use hierarchy_paths::{
    build_contracted_graph,
    ch::{contracted_graph::ContractedGraph, contraction_params::ContractionParams},
    distance_matrix,
    graphs::{
        adjacency_store::AdjacencyStore,
        edge::{Direction, EdgeLayout},
        network::{NetworkEdge, RoadNetwork},
        path::{EdgePath, Path},
        restrictions::RestrictionSet,
        VertexId, Weight,
    },
    search::{dijkstra::Dijkstra, turns::TurnRules, SearchOptions, SearchOutcome},
    shortest_path,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const VERTICES: u32 = 40;
const EDGES: usize = 90;

/// Sparse random network with small integral weights, so sums compare exactly.
fn random_network(rng: &mut StdRng) -> (RoadNetwork, Vec<Weight>) {
    let mut network = RoadNetwork::new(VERTICES);
    let mut weights = Vec::new();
    while weights.len() < EDGES {
        let tail = rng.gen_range(0..VERTICES);
        let head = rng.gen_range(0..VERTICES);
        if tail == head {
            continue;
        }
        network.push(NetworkEdge {
            tail,
            head,
            profile: weights.len() as u32,
            bidirectional: rng.gen_bool(0.6),
        });
        weights.push(rng.gen_range(1..20) as Weight);
    }
    (network, weights)
}

fn plain_search(store: &AdjacencyStore, source: VertexId, turns: TurnRules) -> SearchOutcome {
    Dijkstra::run_with(
        store,
        vec![EdgePath::root(source)],
        Direction::Forward,
        false,
        turns,
        SearchOptions::default(),
    )
    .unwrap()
}

/// The unpacked path walks original records only and adds up to its weight.
fn assert_unpacked(graph: &ContractedGraph, path: &Path, source: VertexId, target: VertexId) {
    assert_eq!(path.vertices.first(), Some(&source));
    assert_eq!(path.vertices.last(), Some(&target));
    assert_eq!(path.edges.len() + 1, path.vertices.len());

    let mut weight = 0.0;
    for (id, pair) in path.edges.iter().zip(path.vertices.windows(2)) {
        let record = graph.store().edge(*id).unwrap();
        assert!(!record.is_shortcut());
        let ends = (record.tail(), record.head());
        assert!(ends == (pair[0], pair[1]) || ends == (pair[1], pair[0]));
        weight += record.weight();
    }
    assert_eq!(weight, path.weight);
}

fn assert_matches_plain_search(layout: EdgeLayout, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (network, weights) = random_network(&mut rng);
    let restrictions = RestrictionSet::new();

    let (graph, _) =
        build_contracted_graph(&network, &weights, &restrictions, layout, &ContractionParams::default()).unwrap();
    graph.verify_rank_monotonicity().unwrap();

    let store = AdjacencyStore::from_network(&network, &weights, layout).unwrap();
    let turns = TurnRules::for_layout(layout, None).unwrap();
    let roots: Vec<Vec<Arc<EdgePath>>> = (0..VERTICES).map(|vertex| vec![EdgePath::root(vertex)]).collect();
    let matrix = distance_matrix(&graph, &roots, &roots).unwrap();

    for source in 0..VERTICES {
        let outcome = plain_search(&store, source, turns);
        for target in 0..VERTICES {
            let expected = outcome.weight(target);
            let path = shortest_path(&graph, &roots[source as usize], &roots[target as usize]).unwrap();

            assert_eq!(path.as_ref().map(|path| path.weight), expected, "{} -> {}", source, target);
            assert_eq!(
                matrix[source as usize][target as usize],
                expected.unwrap_or(Weight::MAX),
                "matrix {} -> {}",
                source,
                target
            );
            if let Some(path) = path {
                assert_unpacked(&graph, &path, source, target);
            }
        }
    }
}

#[test]
fn vertex_based_hierarchy_matches_dijkstra() {
    for seed in 0..4 {
        assert_matches_plain_search(EdgeLayout::VertexBased, seed);
    }
}

#[test]
fn edge_based_hierarchy_matches_dijkstra() {
    for seed in 0..4 {
        assert_matches_plain_search(EdgeLayout::EdgeBased, seed);
    }
}

/// Forbids up to `count` turns that actually exist in `network`.
fn random_restrictions(rng: &mut StdRng, network: &RoadNetwork, count: usize) -> RestrictionSet {
    let mut restrictions = RestrictionSet::new();
    let edges = network.edges();
    for _ in 0..count {
        let first = edges[rng.gen_range(0..edges.len())];
        let followers: Vec<_> = edges
            .iter()
            .filter(|edge| edge.tail == first.head && edge.head != first.tail)
            .collect();
        if followers.is_empty() {
            continue;
        }
        let second = followers[rng.gen_range(0..followers.len())];
        restrictions.add(vec![first.tail, first.head, second.head]).unwrap();
    }
    restrictions
}

#[test]
fn restricted_hierarchy_matches_dijkstra() {
    for seed in 0..4 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (network, weights) = random_network(&mut rng);
        let restrictions = random_restrictions(&mut rng, &network, 15);

        let (graph, _) = build_contracted_graph(
            &network,
            &weights,
            &restrictions,
            EdgeLayout::EdgeBased,
            &ContractionParams::default(),
        )
        .unwrap();
        graph.verify_rank_monotonicity().unwrap();

        let store = AdjacencyStore::from_network(&network, &weights, EdgeLayout::EdgeBased).unwrap();
        let turns = TurnRules::edge_based(Some(&restrictions));
        let roots: Vec<Vec<Arc<EdgePath>>> = (0..VERTICES).map(|vertex| vec![EdgePath::root(vertex)]).collect();
        let matrix = distance_matrix(&graph, &roots, &roots).unwrap();

        for source in 0..VERTICES {
            let outcome = plain_search(&store, source, turns);
            for target in 0..VERTICES {
                let expected = outcome.weight(target);
                let path = shortest_path(&graph, &roots[source as usize], &roots[target as usize]).unwrap();

                assert_eq!(
                    path.as_ref().map(|path| path.weight),
                    expected,
                    "seed {}: {} -> {}",
                    seed,
                    source,
                    target
                );
                assert_eq!(
                    matrix[source as usize][target as usize],
                    expected.unwrap_or(Weight::MAX),
                    "seed {}: matrix {} -> {}",
                    seed,
                    source,
                    target
                );

                let Some(path) = path else {
                    continue;
                };
                assert_unpacked(&graph, &path, source, target);
                for window in path.vertices.windows(3) {
                    assert_ne!(window[0], window[2], "U-turn in {:?}", path.vertices);
                    assert_ne!(
                        restrictions.turn_weight(window),
                        Weight::MAX,
                        "forbidden turn in {:?}",
                        path.vertices
                    );
                }
            }
        }
    }
}
