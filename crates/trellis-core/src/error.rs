//! Error types for Trellis Core

use thiserror::Error;

/// Result type alias using Trellis core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Metadata, registry and object-graph errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed entity or field declaration. Fatal at startup.
    #[error("Configuration error on [{entity}]: {message}")]
    Configuration { entity: String, message: String },

    /// Relationship declarations disagree across entities. Fatal at startup.
    #[error("Relationship registry validation failed: {0}")]
    RegistryValidation(String),

    #[error("Relationship config not found: {0}")]
    RelationshipNotFound(String),

    #[error("Ambiguous relationship config: {0}")]
    AmbiguousRelationship(String),

    /// A value could not be cast between its declared and actual type.
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Entity type not registered: {0}")]
    UnregisteredType(String),

    #[error("Entity not found in object graph: {0}")]
    MissingEntity(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// True for errors that must abort startup
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::RegistryValidation(_))
    }
}
