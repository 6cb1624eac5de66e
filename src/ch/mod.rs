pub mod contracted_graph;
pub mod contraction_params;
pub mod contractor;
pub mod priority_function;
pub mod vertex_info;
pub mod witness_search;
