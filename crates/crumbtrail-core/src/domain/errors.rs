//! Domain error types

use thiserror::Error;

/// Errors that can occur while building domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown performance metric category name
    #[error("Unknown metric category: {0}")]
    UnknownMetricCategory(String),

    /// Payload could not be serialized
    #[error("Payload serialization failed: {0}")]
    Serialization(String),
}
