//! Error types for delta collections and particle filtering.

use thiserror::Error;

/// Main error type for inference operations.
#[derive(Debug, Error)]
pub enum SmcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("All particles have zero weight")]
    AllParticlesDead,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index {index} out of bounds for collection of size {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Sampler not found: {0}")]
    SamplerNotFound(String),

    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("Result writer error: {0}")]
    Writer(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SmcError {
    fn from(e: serde_json::Error) -> Self {
        SmcError::Serialization(e.to_string())
    }
}

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, SmcError>;
