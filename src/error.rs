use thiserror::Error;

/// Errors surfaced by preprocessing and queries.
///
/// A missing route is not an error: queries return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The hierarchy is internally inconsistent, e.g. an upward record points
    /// to a vertex of lower rank. Always a preprocessing defect.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The request cannot be served by this graph, detected before searching.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The input network, weight function or restrictions are unusable.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("search cancelled")]
    Cancelled,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
