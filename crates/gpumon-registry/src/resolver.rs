//! Label resolution: maps a metric's declared label names to values for one
//! entity.
//!
//! A label whose accessor is missing or fails gets the [`UNRESOLVED`]
//! sentinel. Resolution itself only fails for an undeclared metric.

use std::sync::Arc;

use tracing::{debug, warn};

use gpumon_core::{LabelSet, MetricSchema, UNRESOLVED};

use crate::accessor::AccessorRegistry;
use crate::error::{AccessorError, RegistryResult};
use crate::metrics::MetricRegistry;

pub struct LabelResolver<E: ?Sized> {
    metrics: Arc<MetricRegistry>,
    accessors: Arc<AccessorRegistry<E>>,
}

impl<E: ?Sized> LabelResolver<E> {
    pub fn new(metrics: Arc<MetricRegistry>, accessors: Arc<AccessorRegistry<E>>) -> Self {
        Self { metrics, accessors }
    }

    /// Resolve every declared label of `metric` for `entity`.
    ///
    /// Fails only when the metric itself is not registered. The returned set
    /// always has exactly the declared label cardinality.
    pub fn resolve_labels(&self, metric: &str, entity: &E) -> RegistryResult<LabelSet> {
        let observable = self.metrics.lookup(metric)?;
        Ok(self.resolve_for(observable.schema(), entity))
    }

    /// Resolve labels against an already looked-up schema.
    pub fn resolve_for(&self, schema: &MetricSchema, entity: &E) -> LabelSet {
        schema
            .labels
            .iter()
            .map(|label| {
                let value = match self.accessors.resolve(label, entity) {
                    Ok(value) => value,
                    Err(AccessorError::NotFound(_)) => {
                        debug!(metric = %schema.name, %label, "no accessor for label");
                        UNRESOLVED.to_string()
                    }
                    Err(e) => {
                        warn!(metric = %schema.name, %label, error = %e, "label unresolved");
                        UNRESOLVED.to_string()
                    }
                };
                (label.clone(), value)
            })
            .collect()
    }
}

impl<E: ?Sized> Clone for LabelResolver<E> {
    fn clone(&self) -> Self {
        Self {
            metrics: self.metrics.clone(),
            accessors: self.accessors.clone(),
        }
    }
}
