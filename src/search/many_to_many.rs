//! Bucket based distance matrices on a contracted graph.
//!
//! 1. Backward phase: an upward backward search per target, every settled
//!    state is stored as `(target, weight, arrival)` in the bucket of its
//!    vertex.
//! 2. Forward phase: an upward forward search per source, every settled state
//!    is joined with the bucket of its vertex to relax one matrix row.
//!
//! Both phases run their searches in parallel; buckets are read-only while
//! the forward phase runs.

use std::{ops::Range, sync::Arc};

use ahash::{HashMap, HashMapExt};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{dijkstra::Dijkstra, turns::TurnRules, SearchOptions};
use crate::{
    ch::contracted_graph::ContractedGraph,
    error::Result,
    graphs::{edge::Direction, path::EdgePath, Graph, VertexId, Weight},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ManyToManyOptions {
    /// Fraction of unreachable cells at which a row or column is reported as
    /// a probable island.
    pub island_threshold: f64,
}

impl Default for ManyToManyOptions {
    fn default() -> Self {
        ManyToManyOptions { island_threshold: 1.0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixDiagnostics {
    pub island_sources: Vec<usize>,
    pub island_targets: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    /// `weights[i][j]` is the distance from source `i` to target `j`,
    /// [`Weight::MAX`] if unreachable.
    pub weights: Vec<Vec<Weight>>,
    pub diagnostics: MatrixDiagnostics,
}

#[derive(Clone, Debug)]
struct BucketEntry {
    target: usize,
    path: Arc<EdgePath>,
}

/// Bucket entries grouped by vertex in one flat vector.
struct Buckets {
    entries: Vec<(VertexId, BucketEntry)>,
    ranges: HashMap<VertexId, Range<usize>>,
}

impl Buckets {
    fn new(mut entries: Vec<(VertexId, BucketEntry)>) -> Buckets {
        entries.sort_by_key(|(vertex, entry)| (*vertex, entry.target));

        let mut ranges: HashMap<VertexId, Range<usize>> = HashMap::new();
        for (index, (vertex, _)) in entries.iter().enumerate() {
            ranges.entry(*vertex).or_insert(index..index).end = index + 1;
        }

        Buckets { entries, ranges }
    }

    fn at(&self, vertex: VertexId) -> impl Iterator<Item = &BucketEntry> + '_ {
        let range = self.ranges.get(&vertex).cloned().unwrap_or(0..0);
        self.entries[range].iter().map(|(_, entry)| entry)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Distances between every source and every target. Each source and each
/// target is given as a set of weighted root paths.
pub fn many_to_many(
    graph: &ContractedGraph,
    sources: &[Vec<Arc<EdgePath>>],
    targets: &[Vec<Arc<EdgePath>>],
    options: &ManyToManyOptions,
    search: &SearchOptions,
) -> Result<DistanceMatrix> {
    let turns = TurnRules::for_layout(graph.layout(), Some(graph.restrictions()))?;

    let entries = targets
        .par_iter()
        .enumerate()
        .map(|(target, roots)| {
            let mut backward = Dijkstra::upward(graph, Direction::Backward, turns, search.clone())?;
            backward.initialize(roots)?;
            let mut entries = Vec::new();
            while let Some(path) = backward.step()? {
                entries.push((path.vertex, BucketEntry { target, path }));
            }
            Ok(entries)
        })
        .collect::<Result<Vec<_>>>()?;
    let buckets = Buckets::new(entries.into_iter().flatten().collect());
    debug!("filled {} bucket entries for {} targets", buckets.len(), targets.len());

    let weights = sources
        .par_iter()
        .map(|roots| {
            let mut row = vec![Weight::MAX; targets.len()];
            let mut forward = Dijkstra::upward(graph, Direction::Forward, turns, search.clone())?;
            forward.initialize(roots)?;
            while let Some(path) = forward.step()? {
                for entry in buckets.at(path.vertex) {
                    let weight = path.weight + entry.path.weight;
                    if weight < row[entry.target] && turns.allows_meeting(&path, &entry.path) {
                        row[entry.target] = weight;
                    }
                }
            }
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    let diagnostics = diagnose(&weights, targets.len(), options.island_threshold);
    if !diagnostics.island_sources.is_empty() || !diagnostics.island_targets.is_empty() {
        warn!(
            "{} sources and {} targets look like islands",
            diagnostics.island_sources.len(),
            diagnostics.island_targets.len()
        );
    }

    Ok(DistanceMatrix { weights, diagnostics })
}

fn diagnose(weights: &[Vec<Weight>], number_of_targets: usize, threshold: f64) -> MatrixDiagnostics {
    let unreachable_fraction = |unreachable: usize, total: usize| unreachable as f64 / total as f64;

    let island_sources = if number_of_targets == 0 {
        Vec::new()
    } else {
        weights
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let unreachable = row.iter().filter(|&&weight| weight == Weight::MAX).count();
                unreachable_fraction(unreachable, number_of_targets) >= threshold
            })
            .map(|(source, _)| source)
            .collect()
    };

    let island_targets = if weights.is_empty() {
        Vec::new()
    } else {
        (0..number_of_targets)
            .filter(|&target| {
                let unreachable = weights.iter().filter(|row| row[target] == Weight::MAX).count();
                unreachable_fraction(unreachable, weights.len()) >= threshold
            })
            .collect()
    };

    MatrixDiagnostics {
        island_sources,
        island_targets,
    }
}
