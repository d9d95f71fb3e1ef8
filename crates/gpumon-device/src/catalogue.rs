//! The GPU metric catalogue.
//!
//! Maps each well-known metric name to the device reading that feeds it.
//! A metric is only sampled when a declaration with the same name has been
//! registered; the catalogue itself carries no help text or labels.

use std::fmt;

use crate::device::{ClockKind, Device, EccKind};
use crate::error::DeviceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuMetric {
    IdMetric,
    GpuUtilization,
    MemUtilization,
    PowerUsage,
    RunningProcess,
    Temperature,
    MemoryUsed,
    MemoryTotal,
    MemoryFree,
    PState,
    SmClock,
    GraphicsClock,
    VideoClock,
    MemoryClock,
    EccCorrectedErrors,
    EccUncorrectedErrors,
}

impl GpuMetric {
    /// Every catalogue entry, in collection order.
    pub const ALL: [GpuMetric; 16] = [
        GpuMetric::IdMetric,
        GpuMetric::GpuUtilization,
        GpuMetric::MemUtilization,
        GpuMetric::PowerUsage,
        GpuMetric::RunningProcess,
        GpuMetric::Temperature,
        GpuMetric::MemoryUsed,
        GpuMetric::MemoryTotal,
        GpuMetric::MemoryFree,
        GpuMetric::PState,
        GpuMetric::SmClock,
        GpuMetric::GraphicsClock,
        GpuMetric::VideoClock,
        GpuMetric::MemoryClock,
        GpuMetric::EccCorrectedErrors,
        GpuMetric::EccUncorrectedErrors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GpuMetric::IdMetric => "gpu_id_metric",
            GpuMetric::GpuUtilization => "gpu_gpu_utilization",
            GpuMetric::MemUtilization => "gpu_mem_utilization",
            GpuMetric::PowerUsage => "gpu_power_usage",
            GpuMetric::RunningProcess => "gpu_running_process",
            GpuMetric::Temperature => "gpu_temperature",
            GpuMetric::MemoryUsed => "gpu_memory_used",
            GpuMetric::MemoryTotal => "gpu_memory_total",
            GpuMetric::MemoryFree => "gpu_memory_free",
            GpuMetric::PState => "gpu_p_state",
            GpuMetric::SmClock => "gpu_sm_clock",
            GpuMetric::GraphicsClock => "gpu_graphics_clock",
            GpuMetric::VideoClock => "gpu_video_clock",
            GpuMetric::MemoryClock => "gpu_memory_clock",
            GpuMetric::EccCorrectedErrors => "gpu_ecc_corrected_errors",
            GpuMetric::EccUncorrectedErrors => "gpu_ecc_uncorrected_errors",
        }
    }

    pub fn from_name(name: &str) -> Option<GpuMetric> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Whether the raw reading is a byte count, so a declared unit applies.
    pub fn is_byte_valued(&self) -> bool {
        matches!(
            self,
            GpuMetric::MemoryUsed | GpuMetric::MemoryTotal | GpuMetric::MemoryFree
        )
    }

    /// Read this metric's current value from a device.
    pub fn acquire(&self, device: &dyn Device) -> DeviceResult<f64> {
        let value = match self {
            GpuMetric::IdMetric => device.index() as f64,
            GpuMetric::GpuUtilization => device.utilization()?.gpu as f64,
            GpuMetric::MemUtilization => device.utilization()?.memory as f64,
            // Milliwatts to watts.
            GpuMetric::PowerUsage => device.power_usage_mw()? as f64 / 1000.0,
            GpuMetric::RunningProcess => device.running_processes()? as f64,
            GpuMetric::Temperature => device.temperature()? as f64,
            GpuMetric::MemoryUsed => device.memory_info()?.used as f64,
            GpuMetric::MemoryTotal => device.memory_info()?.total as f64,
            GpuMetric::MemoryFree => device.memory_info()?.free as f64,
            GpuMetric::PState => device.performance_state()? as f64,
            GpuMetric::SmClock => device.clock_mhz(ClockKind::Sm)? as f64,
            GpuMetric::GraphicsClock => device.clock_mhz(ClockKind::Graphics)? as f64,
            GpuMetric::VideoClock => device.clock_mhz(ClockKind::Video)? as f64,
            GpuMetric::MemoryClock => device.clock_mhz(ClockKind::Memory)? as f64,
            GpuMetric::EccCorrectedErrors => device.ecc_errors(EccKind::Corrected)? as f64,
            GpuMetric::EccUncorrectedErrors => device.ecc_errors(EccKind::Uncorrected)? as f64,
        };
        Ok(value)
    }
}

impl fmt::Display for GpuMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
