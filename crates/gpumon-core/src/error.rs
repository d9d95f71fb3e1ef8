//! Error types for metric declaration loading.

use thiserror::Error;

/// Result type alias for schema loading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while reading or validating metric declarations.
///
/// Every variant is fatal at startup: a misconfigured metric set must not
/// run silently.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read metric declarations from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed TOML declarations: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("malformed JSON declarations: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no metrics declared")]
    NoMetrics,

    #[error("metric {metric}: unsupported metric type {kind:?} (only \"gauge\" is supported)")]
    UnsupportedKind { metric: String, kind: String },

    #[error("metric {0}: help text must not be empty")]
    MissingHelp(String),

    #[error("invalid metric name: {0:?}")]
    InvalidMetricName(String),

    #[error("metric {metric}: invalid label name {label:?}")]
    InvalidLabelName { metric: String, label: String },

    #[error("metric {metric}: label {label} declared more than once")]
    DuplicateLabel { metric: String, label: String },
}
