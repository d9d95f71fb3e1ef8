//! Registry error types.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by [`MetricRegistry`](crate::MetricRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The name is already declared with a different label set.
    #[error("metric {name} already declared with labels {existing:?}, cannot redeclare with {requested:?}")]
    SchemaConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    #[error("metric not registered: {0}")]
    NotRegistered(String),

    #[error("exposition error: {0}")]
    Exposition(#[from] prometheus::Error),
}

/// Errors raised while resolving a single label value.
#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("no accessor registered for label {0}")]
    NotFound(String),

    #[error("accessor for label {label} failed: {source}")]
    Failed {
        label: String,
        #[source]
        source: anyhow::Error,
    },
}
