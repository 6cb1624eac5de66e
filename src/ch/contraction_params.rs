//! Parameters for building a contraction hierarchy.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use super::priority_function::{
    cost_of_queries::CostOfQueries, decode_factors, deleted_neighbors::DeletedNeighbors,
    edge_difference::EdgeDifference, original_edges::OriginalEdges, register, search_depth::SearchDepth,
    PriorityTerms,
};
use crate::error::{Result, RoutingError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractionParams {
    /// Coefficient of shortcuts added minus records removed (`E`).
    pub difference_factor: f64,
    /// Coefficient of the witness search depth (`S`).
    pub depth_factor: f64,
    /// Coefficient of already contracted neighbours (`D`).
    pub contracted_factor: f64,
    /// Coefficient of the hierarchy depth below a vertex (`C`).
    pub hierarchy_depth_factor: f64,
    /// Coefficient of the original edge difference (`O`).
    pub original_edges_factor: f64,
    pub hop_limit: u32,
    pub settle_limit: u32,
    /// Keep parallel shortcuts instead of merging them into the lighter one.
    pub allow_parallel_edges: bool,
    pub show_progress: bool,
}

impl Default for ContractionParams {
    fn default() -> Self {
        ContractionParams {
            difference_factor: 2.0,
            depth_factor: 1.0,
            contracted_factor: 1.0,
            hierarchy_depth_factor: 0.0,
            original_edges_factor: 0.0,
            hop_limit: 16,
            settle_limit: 500,
            allow_parallel_edges: false,
            show_progress: false,
        }
    }
}

impl ContractionParams {
    pub fn new() -> Self {
        Default::default()
    }

    /// Takes the coefficients from the compact notation, e.g. `E:2_S:1_D:1`.
    /// Terms missing from `letters` get a coefficient of zero.
    pub fn from_priority_string(letters: &str) -> Result<ContractionParams> {
        let mut params = ContractionParams {
            difference_factor: 0.0,
            depth_factor: 0.0,
            contracted_factor: 0.0,
            ..ContractionParams::default()
        };
        for (letter, coefficient) in decode_factors(letters)? {
            let factor = match letter {
                'E' => &mut params.difference_factor,
                'S' => &mut params.depth_factor,
                'D' => &mut params.contracted_factor,
                'C' => &mut params.hierarchy_depth_factor,
                'O' => &mut params.original_edges_factor,
                _ => {
                    return Err(RoutingError::MalformedInput(format!(
                        "priority term {} not recognized",
                        letter
                    )))
                }
            };
            *factor = coefficient;
        }
        Ok(params)
    }

    pub fn from_json_file(path: &Path) -> Result<ContractionParams> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn settle_limit(mut self, settle_limit: u32) -> Self {
        self.settle_limit = settle_limit;
        self
    }

    pub fn allow_parallel_edges(mut self, allow: bool) -> Self {
        self.allow_parallel_edges = allow;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Priority terms with a nonzero coefficient.
    pub fn priority_terms(&self) -> PriorityTerms {
        let mut terms = PriorityTerms::new();
        if self.difference_factor != 0.0 {
            register(&mut terms, self.difference_factor, EdgeDifference::new());
        }
        if self.depth_factor != 0.0 {
            register(&mut terms, self.depth_factor, SearchDepth::new());
        }
        if self.contracted_factor != 0.0 {
            register(&mut terms, self.contracted_factor, DeletedNeighbors::new());
        }
        if self.hierarchy_depth_factor != 0.0 {
            register(&mut terms, self.hierarchy_depth_factor, CostOfQueries::new());
        }
        if self.original_edges_factor != 0.0 {
            register(&mut terms, self.original_edges_factor, OriginalEdges::new());
        }
        terms
    }
}
