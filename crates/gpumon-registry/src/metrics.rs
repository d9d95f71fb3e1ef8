//! Metric registry: declared metrics and their live observables.
//!
//! Each declared [`MetricSchema`] gets exactly one [`Observable`], a labeled
//! gauge published to the exposition registry. Registration happens once at
//! startup; afterwards the map is read-mostly and every sample write goes
//! straight to the gauge, which handles concurrent label-set writes itself.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::{debug, info, warn};

use gpumon_core::{LabelSet, MetricKind, MetricSchema};

use crate::error::{RegistryError, RegistryResult};

/// The live time series backing one declared metric.
pub struct Observable {
    schema: MetricSchema,
    gauge: GaugeVec,
}

impl Observable {
    fn new(schema: MetricSchema) -> RegistryResult<Self> {
        let gauge = match schema.kind {
            MetricKind::Gauge => GaugeVec::new(
                Opts::new(schema.name.clone(), schema.help.clone()),
                &schema.label_names(),
            )?,
        };
        Ok(Self { schema, gauge })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// The declaration this observable was created from.
    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn label_names(&self) -> &BTreeSet<String> {
        &self.schema.labels
    }

    /// Write one sample. The label set must carry exactly the declared labels.
    pub fn set(&self, labels: &LabelSet, value: f64) -> RegistryResult<()> {
        let gauge = self.gauge.get_metric_with(&labels.as_map())?;
        gauge.set(value);
        Ok(())
    }

    /// Read back the current value for a label set without creating the series.
    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        self.gauge
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                let pairs = metric.get_label();
                pairs.len() == labels.len()
                    && pairs
                        .iter()
                        .all(|pair| labels.get(pair.get_name()) == Some(pair.get_value()))
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Number of label combinations written so far.
    pub fn series_count(&self) -> usize {
        self.gauge
            .collect()
            .iter()
            .map(|family| family.get_metric().len())
            .sum()
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.schema.name)
            .field("labels", &self.schema.labels)
            .field("series", &self.series_count())
            .finish()
    }
}

/// Name → observable map bound to one exposition registry.
pub struct MetricRegistry {
    exposition: Registry,
    metrics: RwLock<HashMap<String, Arc<Observable>>>,
}

impl MetricRegistry {
    /// Create a registry publishing to a fresh exposition registry.
    pub fn new() -> Self {
        Self::with_exposition(Registry::new())
    }

    /// Create a registry publishing to an existing exposition registry.
    pub fn with_exposition(exposition: Registry) -> Self {
        Self {
            exposition,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// The exposition registry observables are published to.
    pub fn exposition(&self) -> &Registry {
        &self.exposition
    }

    /// Declare a metric.
    ///
    /// Re-declaring a name with the same label set returns the existing
    /// observable. A different label set fails with `SchemaConflict` and
    /// leaves the original untouched.
    pub fn register(&self, schema: &MetricSchema) -> RegistryResult<Arc<Observable>> {
        let mut metrics = self.metrics.write().expect("metrics lock");

        if let Some(existing) = metrics.get(&schema.name) {
            if existing.schema.labels != schema.labels {
                return Err(RegistryError::SchemaConflict {
                    name: schema.name.clone(),
                    existing: existing.schema.labels.iter().cloned().collect(),
                    requested: schema.labels.iter().cloned().collect(),
                });
            }
            if existing.schema.help != schema.help {
                debug!(metric = %schema.name, "help text differs on redeclaration, keeping the original");
            }
            debug!(metric = %schema.name, "metric already registered");
            return Ok(existing.clone());
        }

        let observable = Arc::new(Observable::new(schema.clone())?);
        self.publish(&observable)?;
        metrics.insert(schema.name.clone(), observable.clone());

        info!(
            metric = %schema.name,
            labels = ?schema.label_names(),
            "metric registered"
        );
        Ok(observable)
    }

    /// Register every schema in order, stopping at the first failure.
    ///
    /// Schemas registered before the failure stay registered; calling again
    /// with the same input is safe.
    pub fn load_all(&self, schemas: &[MetricSchema]) -> RegistryResult<()> {
        for schema in schemas {
            self.register(schema)?;
        }
        info!(count = schemas.len(), "metric declarations loaded");
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> RegistryResult<Arc<Observable>> {
        let metrics = self.metrics.read().expect("metrics lock");
        metrics
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }

    /// Whether a metric with this name has been declared.
    pub fn is_declared(&self, name: &str) -> bool {
        let metrics = self.metrics.read().expect("metrics lock");
        metrics.contains_key(name)
    }

    /// All declared observables, sorted by name.
    pub fn declared(&self) -> Vec<Arc<Observable>> {
        let metrics = self.metrics.read().expect("metrics lock");
        let mut declared: Vec<_> = metrics.values().cloned().collect();
        declared.sort_by(|a, b| a.name().cmp(b.name()));
        declared
    }

    pub fn len(&self) -> usize {
        self.metrics.read().expect("metrics lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather every family published to the exposition registry.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.exposition.gather()
    }

    /// Publish an observable to the exposition registry exactly once.
    ///
    /// If an identical collector is already published (another registry
    /// sharing the same exposition registry), it is replaced by ours.
    fn publish(&self, observable: &Observable) -> RegistryResult<()> {
        match self.exposition.register(Box::new(observable.gauge.clone())) {
            Ok(()) => Ok(()),
            Err(prometheus::Error::AlreadyReg) => {
                self.exposition
                    .unregister(Box::new(observable.gauge.clone()))?;
                self.exposition
                    .register(Box::new(observable.gauge.clone()))?;
                warn!(metric = %observable.name(), "replaced previously published collector");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}
