use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    time::{Duration, Instant},
};

use clap::Parser;
use hierarchy_paths::{
    build_contracted_graph,
    ch::contraction_params::ContractionParams,
    graphs::{
        adjacency_store::AdjacencyStore, edge::Direction, edge::EdgeLayout, path::EdgePath,
        read_network_from_fmi_file, restrictions::RestrictionSet, VertexId,
    },
    search::{bidirectional::shortest_path_weight, dijkstra::Dijkstra, turns::TurnRules, SearchOptions},
};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Builds a contraction hierarchy for a graph in `.fmi` format, writes it in
/// `.bincode` format and checks random queries against plain Dijkstra.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Infile in .fmi format
    #[arg(short, long)]
    graph: PathBuf,
    /// Outfile in .bincode format
    #[arg(short, long)]
    contracted_graph: PathBuf,
    /// Contraction parameters as JSON
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Priority terms in compact notation, e.g. E:2_S:1_D:1
    #[arg(long)]
    priority: Option<String>,
    /// Forbidden vertex sequences as a JSON list of lists
    #[arg(short, long)]
    restrictions: Option<PathBuf>,
    /// Contract edge-based even without restrictions
    #[arg(long)]
    edge_based: bool,
    /// Number of random queries validated after contraction
    #[arg(short, long, default_value_t = 100)]
    number_of_tests: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut params = match (&args.params, &args.priority) {
        (Some(path), _) => ContractionParams::from_json_file(path).unwrap(),
        (None, Some(priority)) => ContractionParams::from_priority_string(priority).unwrap(),
        (None, None) => ContractionParams::default(),
    };
    params.show_progress = true;

    let restrictions = match &args.restrictions {
        Some(path) => {
            let reader = BufReader::new(File::open(path).unwrap());
            let sequences: Vec<Vec<VertexId>> = serde_json::from_reader(reader).unwrap();
            RestrictionSet::from_sequences(sequences).unwrap()
        }
        None => RestrictionSet::new(),
    };
    let layout = if args.edge_based || !restrictions.is_empty() {
        EdgeLayout::EdgeBased
    } else {
        EdgeLayout::VertexBased
    };

    info!("Loading graph");
    let start = Instant::now();
    let (network, weights) = read_network_from_fmi_file(&args.graph).unwrap();
    info!("it took {:?} to load graph", start.elapsed());

    info!("Starting contracted graph generation");
    let start = Instant::now();
    let (contracted_graph, stats) = build_contracted_graph(&network, &weights, &restrictions, layout, &params).unwrap();
    info!("Generating contracted graph took {:?}", start.elapsed());
    println!("{}", serde_json::to_string_pretty(&stats).unwrap());

    info!("Writing contracted graph to file");
    contracted_graph.write_to_file(&args.contracted_graph).unwrap();

    if args.number_of_tests == 0 || network.number_of_vertices() == 0 {
        return;
    }

    info!("Validating {} random queries", args.number_of_tests);
    let store = AdjacencyStore::from_network(&network, &weights, layout).unwrap();
    let turns = TurnRules::for_layout(layout, Some(&restrictions)).unwrap();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut ch_time = Duration::ZERO;
    let mut dijkstra_time = Duration::ZERO;

    for _ in 0..args.number_of_tests {
        let source = rng.gen_range(0..network.number_of_vertices());
        let target = rng.gen_range(0..network.number_of_vertices());

        let start = Instant::now();
        let actual = shortest_path_weight(
            &contracted_graph,
            &[EdgePath::root(source)],
            &[EdgePath::root(target)],
            &SearchOptions::default(),
        )
        .unwrap();
        ch_time += start.elapsed();

        let start = Instant::now();
        let outcome = Dijkstra::run_with(
            &store,
            vec![EdgePath::root(source)],
            Direction::Forward,
            false,
            turns,
            SearchOptions::default(),
        )
        .unwrap();
        dijkstra_time += start.elapsed();

        let expected = outcome.weight(target);
        assert_eq!(
            expected.is_some(),
            actual.is_some(),
            "reachability differs for {} -> {}",
            source,
            target
        );
        if let (Some(expected), Some(actual)) = (expected, actual) {
            assert!(
                (expected - actual).abs() <= 1e-6 * expected.max(1.0),
                "{} -> {}: expected {}, got {}",
                source,
                target,
                expected,
                actual
            );
        }
    }

    println!(
        "All correct. Average query took {:?} with the hierarchy and {:?} with Dijkstra",
        ch_time / args.number_of_tests,
        dijkstra_time / args.number_of_tests
    );
}
