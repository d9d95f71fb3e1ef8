//! Sample collector: periodically reads every declared catalogue metric from
//! every device and writes it into the matching observable.
//!
//! A pass never aborts on a single failure. An acquisition error skips that
//! (metric, device) pair, a missing label value becomes the sentinel, and
//! the rest of the pass carries on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{IntCounter, Opts};
use tracing::{debug, error, info, warn};

use gpumon_device::{Device, DeviceError, DeviceProvider, GpuMetric};
use gpumon_registry::{AccessorRegistry, LabelResolver, MetricRegistry, RegistryResult};

use crate::error::SampleError;

/// Counter incremented once per completed pass.
pub const PROCESSED_OPS_METRIC: &str = "gpu_metrics_processed_ops_total";

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// Devices visited.
    pub devices: u32,
    /// Samples written.
    pub written: usize,
    /// (metric, device) pairs skipped after a failure or an elapsed deadline.
    pub skipped: usize,
}

pub struct SampleCollector {
    provider: Arc<dyn DeviceProvider>,
    registry: Arc<MetricRegistry>,
    resolver: LabelResolver<dyn Device>,
    interval: Duration,
    pass_timeout: Duration,
    processed_ops: IntCounter,
}

impl SampleCollector {
    /// Create a collector and publish its pass counter to the registry's
    /// exposition registry. The pass timeout defaults to the interval.
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        registry: Arc<MetricRegistry>,
        accessors: Arc<AccessorRegistry<dyn Device>>,
        interval: Duration,
    ) -> RegistryResult<Self> {
        let processed_ops = IntCounter::with_opts(Opts::new(
            PROCESSED_OPS_METRIC,
            "The total number of processed collection passes.",
        ))?;
        publish_counter(&registry, &processed_ops)?;

        for observable in registry.declared() {
            if GpuMetric::from_name(observable.name()).is_none() {
                warn!(
                    metric = %observable.name(),
                    "declared metric has no device source and will not be collected"
                );
            }
        }

        Ok(Self {
            resolver: LabelResolver::new(registry.clone(), accessors),
            provider,
            registry,
            interval,
            pass_timeout: interval,
            processed_ops,
        })
    }

    pub fn with_pass_timeout(mut self, pass_timeout: Duration) -> Self {
        self.pass_timeout = pass_timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed passes.
    pub fn processed_ops(&self) -> u64 {
        self.processed_ops.get()
    }

    /// Run one pass over every device. Blocks on hardware calls.
    ///
    /// Fails only when the device count itself cannot be read.
    pub fn collect_once(&self) -> Result<PassSummary, SampleError> {
        // A timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(self.pass_timeout);
        let count = self
            .provider
            .device_count()
            .map_err(SampleError::Enumeration)?;

        let declared: Vec<GpuMetric> = GpuMetric::ALL
            .into_iter()
            .filter(|metric| self.registry.is_declared(metric.name()))
            .collect();

        let mut summary = PassSummary::default();

        for index in 0..count {
            if elapsed(deadline) {
                warn!(device = index, "collection deadline elapsed, skipping device");
                summary.skipped += declared.len();
                continue;
            }

            let device = match self.provider.device(index) {
                Ok(device) => device,
                Err(e) => {
                    warn!(device = index, error = %e, "device unavailable, skipping");
                    summary.skipped += declared.len();
                    continue;
                }
            };
            summary.devices += 1;

            for metric in &declared {
                let outcome = if elapsed(deadline) {
                    Err(SampleError::Acquisition {
                        device: index,
                        metric: metric.name(),
                        source: DeviceError::Timeout,
                    })
                } else {
                    self.sample(*metric, device.as_ref())
                };

                match outcome {
                    Ok(()) => summary.written += 1,
                    Err(e) => {
                        if e.is_not_supported() {
                            debug!(device = index, metric = %metric, error = %e, "sample skipped");
                        } else {
                            warn!(device = index, metric = %metric, error = %e, "sample skipped");
                        }
                        summary.skipped += 1;
                    }
                }
            }
        }

        self.processed_ops.inc();
        debug!(
            devices = summary.devices,
            written = summary.written,
            skipped = summary.skipped,
            "collection pass complete"
        );
        Ok(summary)
    }

    /// Acquire, label, and write one sample.
    fn sample(
        &self,
        metric: GpuMetric,
        device: &(dyn Device + 'static),
    ) -> Result<(), SampleError> {
        let observable = self.registry.lookup(metric.name())?;

        let raw = metric
            .acquire(device)
            .map_err(|source| SampleError::Acquisition {
                device: device.index(),
                metric: metric.name(),
                source,
            })?;
        let value = if metric.is_byte_valued() {
            observable.schema().scale(raw)
        } else {
            raw
        };

        let labels = self.resolver.resolve_labels(metric.name(), device)?;
        observable.set(&labels, value)?;

        debug!(device = device.index(), metric = %metric, value, "sample written");
        Ok(())
    }

    /// Run passes every interval until shutdown. The first pass starts
    /// immediately; a pass in flight when shutdown arrives runs to completion.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            backend = self.provider.backend(),
            "sample collector started"
        );

        self.clone().pass().await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.clone().pass().await;
                }
                _ = shutdown.changed() => {
                    info!("sample collector shutting down");
                    break;
                }
            }
        }
    }

    async fn pass(self: Arc<Self>) {
        match tokio::task::spawn_blocking(move || self.collect_once()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "collection pass failed"),
            Err(e) => error!(error = %e, "collection pass panicked"),
        }
    }
}

fn elapsed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Publish the pass counter, replacing one left by an earlier collector over
/// the same registry.
fn publish_counter(registry: &MetricRegistry, counter: &IntCounter) -> RegistryResult<()> {
    let exposition = registry.exposition();
    match exposition.register(Box::new(counter.clone())) {
        Ok(()) => Ok(()),
        Err(prometheus::Error::AlreadyReg) => {
            exposition.unregister(Box::new(counter.clone()))?;
            exposition.register(Box::new(counter.clone()))?;
            warn!(metric = PROCESSED_OPS_METRIC, "replaced previously published pass counter");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpumon_core::{LabelSet, MetricSchema, Unit};
    use gpumon_device::{register_builtin, Capability, SimulatedDevice, SimulatedProvider};

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn builtin_accessors() -> Arc<AccessorRegistry<dyn Device>> {
        let accessors: Arc<AccessorRegistry<dyn Device>> = Arc::new(AccessorRegistry::new());
        register_builtin(&accessors);
        accessors
    }

    fn collector(
        devices: Vec<SimulatedDevice>,
        schemas: &[MetricSchema],
        accessors: Arc<AccessorRegistry<dyn Device>>,
    ) -> (SampleCollector, Arc<MetricRegistry>) {
        let registry = Arc::new(MetricRegistry::new());
        registry.load_all(schemas).unwrap();
        let provider = Arc::new(SimulatedProvider::new(devices));
        let collector = SampleCollector::new(
            provider,
            registry.clone(),
            accessors,
            Duration::from_secs(5),
        )
        .unwrap();
        (collector, registry)
    }

    fn temperature_schema() -> MetricSchema {
        MetricSchema::gauge(
            "gpu_temperature",
            "Temperature of the GPU in degrees Celsius.",
            ["gpu_id", "gpu_name"],
        )
    }

    #[test]
    fn temperature_sample_carries_identity_labels() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4").with_temperature(65)],
            &[temperature_schema()],
            builtin_accessors(),
        );

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary, PassSummary { devices: 1, written: 1, skipped: 0 });

        let observable = registry.lookup("gpu_temperature").unwrap();
        let value = observable.value(&labels(&[("gpu_id", "0"), ("gpu_name", "Tesla-T4")]));
        assert_eq!(value, Some(65.0));
    }

    #[test]
    fn missing_accessor_writes_sentinel_label() {
        let accessors = Arc::new(AccessorRegistry::<dyn Device>::new());
        accessors.add_accessor("gpu_id", gpumon_device::accessors::GpuIndex);

        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4").with_temperature(65)],
            &[
                temperature_schema(),
                MetricSchema::gauge("gpu_power_usage", "Power in watts.", ["gpu_id"]),
            ],
            accessors,
        );

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary.written, 2);

        let temperature = registry.lookup("gpu_temperature").unwrap();
        assert_eq!(
            temperature.value(&labels(&[("gpu_id", "0"), ("gpu_name", "")])),
            Some(65.0)
        );
        let power = registry.lookup("gpu_power_usage").unwrap();
        assert_eq!(power.value(&labels(&[("gpu_id", "0")])), Some(70.0));
    }

    #[test]
    fn acquisition_failure_skips_only_that_pair() {
        let (collector, registry) = collector(
            vec![
                SimulatedDevice::new(0, "Tesla-T4"),
                SimulatedDevice::new(1, "Tesla-T4").failing(Capability::PowerUsage),
            ],
            &[
                MetricSchema::gauge("gpu_power_usage", "Power in watts.", ["gpu_id"]),
                MetricSchema::gauge("gpu_temperature", "Temperature.", ["gpu_id"]),
            ],
            builtin_accessors(),
        );

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary, PassSummary { devices: 2, written: 3, skipped: 1 });

        let power = registry.lookup("gpu_power_usage").unwrap();
        assert_eq!(power.value(&labels(&[("gpu_id", "0")])), Some(70.0));
        assert_eq!(power.value(&labels(&[("gpu_id", "1")])), None);

        let temperature = registry.lookup("gpu_temperature").unwrap();
        assert_eq!(temperature.value(&labels(&[("gpu_id", "1")])), Some(65.0));
    }

    #[test]
    fn undeclared_metrics_never_touch_the_device() {
        let device = SimulatedDevice::new(0, "Tesla-T4")
            .failing(Capability::PowerUsage)
            .failing(Capability::Utilization)
            .failing(Capability::MemoryInfo)
            .failing(Capability::Clock)
            .failing(Capability::EccErrors)
            .failing(Capability::PerformanceState)
            .failing(Capability::RunningProcesses);

        let (collector, _registry) =
            collector(vec![device], &[temperature_schema()], builtin_accessors());

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary, PassSummary { devices: 1, written: 1, skipped: 0 });
    }

    #[test]
    fn elapsed_deadline_skips_remaining_samples() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4"), SimulatedDevice::new(1, "Tesla-T4")],
            &[temperature_schema()],
            builtin_accessors(),
        );
        let collector = collector.with_pass_timeout(Duration::ZERO);

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(registry.lookup("gpu_temperature").unwrap().series_count(), 0);
    }

    #[test]
    fn declared_unit_scales_memory() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4")],
            &[
                MetricSchema::gauge("gpu_memory_total", "Total memory.", ["gpu_id"])
                    .with_unit(Unit::GiB),
                MetricSchema::gauge("gpu_memory_used", "Used memory.", ["gpu_id"]),
            ],
            builtin_accessors(),
        );

        collector.collect_once().unwrap();

        let set = labels(&[("gpu_id", "0")]);
        let total = registry.lookup("gpu_memory_total").unwrap();
        assert_eq!(total.value(&set), Some(16.0));
        let used = registry.lookup("gpu_memory_used").unwrap();
        assert_eq!(used.value(&set), Some((4u64 * 1024 * 1024 * 1024) as f64));
    }

    #[test]
    fn uncatalogued_declaration_is_ignored() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4")],
            &[
                temperature_schema(),
                MetricSchema::gauge("gpu_peak_flops", "Peak FLOPS.", ["gpu_id"]),
            ],
            builtin_accessors(),
        );

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(registry.lookup("gpu_peak_flops").unwrap().series_count(), 0);
    }

    #[test]
    fn pass_counter_increments_and_is_exposed() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4")],
            &[temperature_schema()],
            builtin_accessors(),
        );

        collector.collect_once().unwrap();
        collector.collect_once().unwrap();
        assert_eq!(collector.processed_ops(), 2);

        let output = crate::render_prometheus(&registry).unwrap();
        assert!(output.contains("gpu_metrics_processed_ops_total 2"));
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let (collector, registry) = collector(
            vec![SimulatedDevice::new(0, "Tesla-T4")],
            &[temperature_schema()],
            builtin_accessors(),
        );
        let collector = collector.with_pass_timeout(Duration::MAX);

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary, PassSummary { devices: 1, written: 1, skipped: 0 });
        assert_eq!(registry.lookup("gpu_temperature").unwrap().series_count(), 1);
    }

    #[test]
    fn second_collector_over_same_registry_replaces_counter() {
        let registry = Arc::new(MetricRegistry::new());
        registry.load_all(&[temperature_schema()]).unwrap();
        let provider = Arc::new(SimulatedProvider::uniform(1, "Tesla-T4"));

        let first = SampleCollector::new(
            provider.clone(),
            registry.clone(),
            builtin_accessors(),
            Duration::from_secs(5),
        )
        .unwrap();
        first.collect_once().unwrap();

        let second = SampleCollector::new(
            provider,
            registry.clone(),
            builtin_accessors(),
            Duration::from_secs(5),
        )
        .unwrap();
        second.collect_once().unwrap();
        second.collect_once().unwrap();

        let output = crate::render_prometheus(&registry).unwrap();
        assert!(output.contains("gpu_metrics_processed_ops_total 2"));
    }

    #[test]
    fn empty_provider_completes_pass() {
        let (collector, _registry) = collector(vec![], &[temperature_schema()], builtin_accessors());

        let summary = collector.collect_once().unwrap();
        assert_eq!(summary, PassSummary::default());
        assert_eq!(collector.processed_ops(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let registry = Arc::new(MetricRegistry::new());
        registry.load_all(&[temperature_schema()]).unwrap();
        let collector = Arc::new(
            SampleCollector::new(
                Arc::new(SimulatedProvider::uniform(2, "Tesla-T4")),
                registry.clone(),
                builtin_accessors(),
                Duration::from_millis(10),
            )
            .unwrap(),
        );

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(collector.clone().run(rx));

        tokio::time::timeout(Duration::from_secs(5), async {
            while collector.processed_ops() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("collector should complete passes");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("collector should stop")
            .unwrap();

        let observable = registry.lookup("gpu_temperature").unwrap();
        assert_eq!(observable.series_count(), 2);
    }
}
