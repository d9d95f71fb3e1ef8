//! gpumon-core: shared model for the gpumon exporter.
//!
//! Holds the metric declaration model ([`MetricSchema`]) and its loader,
//! plus the label value types that flow between accessors, the label
//! resolver, and the exposition layer.

pub mod error;
pub mod labels;
pub mod schema;

pub use error::{SchemaError, SchemaResult};
pub use labels::{LabelSet, LabelValue, UNRESOLVED};
pub use schema::{MetricKind, MetricSchema, SourceFormat, Unit};
