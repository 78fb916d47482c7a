//! Error types for the Trellis session layer

use thiserror::Error;
use trellis_core::LimitError;
use trellis_cypher::CypherError;
use trellis_driver::DriverError;

/// Result type alias using Trellis' Error
pub type Result<T> = std::result::Result<T, Error>;

/// Every error a caller of the mapper can see
#[derive(Error, Debug)]
pub enum Error {
    /// Schema, registry, conversion and object-graph errors
    #[error(transparent)]
    Metadata(#[from] trellis_core::Error),

    /// Statement construction and pagination errors
    #[error(transparent)]
    Query(CypherError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    DepthTooLarge(#[from] LimitError),

    #[error("Transaction state error: {0}")]
    TransactionState(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Config error: {0}")]
    Config(String),

    /// Constraints or indexes the catalog requires are missing
    #[error("Index validation failed: {0}")]
    IndexValidation(String),

    #[error("original error: `{original}`, rollback error: `{rollback}`")]
    Rollback {
        original: Box<Error>,
        rollback: Box<Error>,
    },
}

impl From<CypherError> for Error {
    fn from(e: CypherError) -> Self {
        match e {
            CypherError::Driver(e) => Self::Driver(e),
            other => Self::Query(other),
        }
    }
}

impl Error {
    /// True for errors that must abort startup
    pub fn is_startup_fatal(&self) -> bool {
        match self {
            Self::Metadata(e) => e.is_startup_fatal(),
            Self::Config(_) | Self::IndexValidation(_) => true,
            _ => false,
        }
    }
}
