//! Driver error types

use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors raised at the database boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool exhausted: {0} connections in use")]
    PoolExhausted(usize),

    #[error("Access mode error: {0}")]
    AccessMode(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unsupported statement: {0}")]
    Unsupported(String),
}

impl DriverError {
    /// Whether retrying on a fresh connection could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::PoolExhausted(_))
    }
}
