use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::{FromStr, SplitWhitespace},
};

use indicatif::ProgressIterator;
use log::warn;

use self::{
    edge::{EdgeLayout, EdgeRecord},
    network::{NetworkEdge, RoadNetwork},
};
use crate::error::{Result, RoutingError};

pub mod adjacency_store;
pub mod edge;
pub mod network;
pub mod path;
pub mod restrictions;

pub type VertexId = u32;
pub type EdgeId = u32;
pub type Rank = u32;
pub type Weight = f64;

/// Read access shared by the mutable store and the frozen contracted graph.
pub trait Graph: Send + Sync {
    fn number_of_vertices(&self) -> u32;

    /// Records stored at `vertex`, with their edge ids.
    fn edges(&self, vertex: VertexId) -> Box<dyn Iterator<Item = (EdgeId, &EdgeRecord)> + '_>;

    fn layout(&self) -> EdgeLayout;

    /// Contraction rank, if the graph has been contracted.
    fn rank(&self, _vertex: VertexId) -> Option<Rank> {
        None
    }

    /// Records at `vertex` leading to a higher ranked vertex, plus loops.
    /// Empty for graphs without ranks.
    fn upward_edges(&self, vertex: VertexId) -> Box<dyn Iterator<Item = (EdgeId, &EdgeRecord)> + '_> {
        let Some(rank) = self.rank(vertex) else {
            return Box::new(std::iter::empty());
        };
        Box::new(self.edges(vertex).filter(move |(_, record)| {
            record.is_loop() || self.rank(record.head()).is_some_and(|head| head > rank)
        }))
    }
}

/// Reads a road network from the FMI text format.
///
/// The format is: optional `#` comment lines, a blank line, the vertex count,
/// the edge count, one line per vertex, then one `tail head weight ...` line per
/// edge. Every edge gets its own profile, whose weight is the cost column.
/// Self loops carry no route and are skipped with a warning.
pub fn read_network_from_fmi_file(file: &Path) -> Result<(RoadNetwork, Vec<Weight>)> {
    let reader = BufReader::new(File::open(file)?);
    let mut lines = reader
        .lines()
        .filter(|line| !matches!(line, Ok(line) if line.starts_with('#') || line.trim().is_empty()));

    let mut next_count = |what: &str| -> Result<usize> {
        let line = lines
            .next()
            .ok_or_else(|| RoutingError::MalformedInput(format!("missing {} count", what)))??;
        line.trim()
            .parse()
            .map_err(|_| RoutingError::MalformedInput(format!("unable to parse {} count", what)))
    };
    let number_of_vertices = next_count("vertex")?;
    let number_of_edges = next_count("edge")?;

    let mut network = RoadNetwork::new(number_of_vertices as u32);
    let mut weights = Vec::with_capacity(number_of_edges);
    let mut skipped_loops = 0usize;

    for line in lines
        .skip(number_of_vertices)
        .take(number_of_edges)
        .progress_count(number_of_edges as u64)
    {
        // srcIDX trgIDX cost type maxspeed
        let line = line?;
        let mut values = line.split_whitespace();
        let tail: VertexId = parse_field(&mut values, "tail", &line)?;
        let head: VertexId = parse_field(&mut values, "head", &line)?;
        let weight: Weight = parse_field(&mut values, "weight", &line)?;

        if tail == head {
            skipped_loops += 1;
            continue;
        }
        network.push(NetworkEdge {
            tail,
            head,
            profile: weights.len() as u32,
            bidirectional: false,
        });
        weights.push(weight);
    }

    if skipped_loops > 0 {
        warn!("skipped {} self loops in {}", skipped_loops, file.display());
    }
    Ok((network, weights))
}

fn parse_field<T: FromStr>(values: &mut SplitWhitespace, what: &str, line: &str) -> Result<T> {
    values
        .next()
        .ok_or_else(|| RoutingError::MalformedInput(format!("no {} found in line {}", what, line)))?
        .parse()
        .map_err(|_| RoutingError::MalformedInput(format!("unable to parse {} in line {}", what, line)))
}
