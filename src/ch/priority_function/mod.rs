use super::vertex_info::VertexInfo;
use crate::{
    error::{Result, RoutingError},
    graphs::adjacency_store::AdjacencyStore,
};

pub mod cost_of_queries;
pub mod deleted_neighbors;
pub mod edge_difference;
pub mod original_edges;
pub mod search_depth;

pub type PriorityTerms = Vec<(f64, Box<dyn PriorityFunction + Send + Sync>)>;

pub trait PriorityFunction {
    fn initialize(&mut self, store: &AdjacencyStore);

    /// Gets the priority of the vertex described by `info`.
    fn priority(&self, info: &VertexInfo) -> i32;

    /// Gets called just before a vertex is contracted. Gives priority terms
    /// the opportunity to update state kept for neighbouring vertices.
    fn update(&mut self, _info: &VertexInfo) {}
}

/// Splits `E:2_S:1` into `[('E', 2.0), ('S', 1.0)]`.
///
/// Letters: `E` edge difference, `S` witness search depth, `D` contracted
/// neighbours, `C` cost of queries, `O` original edge difference.
pub fn decode_factors(priority_functions_letters: &str) -> Result<Vec<(char, f64)>> {
    priority_functions_letters
        .split('_')
        .filter(|term| !term.is_empty())
        .map(|term| {
            let malformed = || RoutingError::MalformedInput(format!("priority term {} is malformed", term));
            let (letter, coefficient) = term.split_once(':').ok_or_else(malformed)?;
            let mut letters = letter.chars();
            let (Some(letter), None) = (letters.next(), letters.next()) else {
                return Err(malformed());
            };
            let coefficient = coefficient.parse::<f64>().map_err(|_| malformed())?;
            Ok((letter, coefficient))
        })
        .collect()
}

pub fn register(
    priority_terms: &mut PriorityTerms,
    coefficient: f64,
    priority_function: impl PriorityFunction + Send + Sync + 'static,
) {
    priority_terms.push((coefficient, Box::new(priority_function)));
}
