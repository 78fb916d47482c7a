//! Query construction error types

use thiserror::Error;
use trellis_driver::DriverError;

/// Result type alias for query construction and execution
pub type CypherResult<T> = std::result::Result<T, CypherError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CypherError {
    /// Every error recorded while chaining clauses
    #[error("errors found: {} -- total errors ({})", .details.join(";"), .details.len())]
    Build { details: Vec<String> },

    #[error("no clauses were added")]
    Empty,

    #[error("no statements are staged")]
    EmptyBatch,

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CypherError {
    /// Number of aggregated build errors
    pub fn count(&self) -> usize {
        match self {
            Self::Build { details } => details.len(),
            _ => 1,
        }
    }
}
