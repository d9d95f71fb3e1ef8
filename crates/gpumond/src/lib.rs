//! Exporter assembly shared by the `gpumond` binary and its tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use gpumon_core::MetricSchema;
use gpumon_device::{Device, DeviceProvider};
use gpumon_metrics::SampleCollector;
use gpumon_registry::{AccessorRegistry, MetricRegistry};

/// Load metric declarations from disk.
pub fn load_schemas(path: &Path) -> anyhow::Result<Vec<MetricSchema>> {
    let schemas = gpumon_core::schema::load_file(path)
        .with_context(|| format!("loading metric declarations from {}", path.display()))?;
    info!(path = %path.display(), count = schemas.len(), "metric declarations parsed");
    Ok(schemas)
}

/// Registries, collector, and router wired together.
pub struct Exporter {
    pub registry: Arc<MetricRegistry>,
    pub collector: Arc<SampleCollector>,
}

impl Exporter {
    /// Register every declaration, install the built-in label accessors,
    /// and build a collector over `provider`.
    pub fn new(
        schemas: &[MetricSchema],
        provider: Arc<dyn DeviceProvider>,
        interval: Duration,
        pass_timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(MetricRegistry::new());
        registry
            .load_all(schemas)
            .context("registering metric declarations")?;

        let accessors: Arc<AccessorRegistry<dyn Device>> = Arc::new(AccessorRegistry::new());
        gpumon_device::register_builtin(&accessors);

        let collector = SampleCollector::new(provider, registry.clone(), accessors, interval)
            .context("creating sample collector")?;
        let collector = match pass_timeout {
            Some(timeout) => collector.with_pass_timeout(timeout),
            None => collector,
        };

        Ok(Self {
            registry,
            collector: Arc::new(collector),
        })
    }

    pub fn router(&self) -> Router {
        gpumon_api::build_router(self.registry.clone())
    }

    /// Start the collection loop on the runtime.
    pub fn spawn_collector(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.collector.clone().run(shutdown))
    }
}
