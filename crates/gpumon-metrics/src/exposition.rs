//! Prometheus text exposition format.

use prometheus::{Encoder, TextEncoder};

use gpumon_registry::MetricRegistry;

/// Content type of [`render_prometheus`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Render every family published to the registry's exposition registry.
///
/// Families with no samples yet are left out.
pub fn render_prometheus(registry: &MetricRegistry) -> anyhow::Result<String> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
