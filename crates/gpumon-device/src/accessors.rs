//! Built-in label accessors for GPUs.

use gpumon_core::LabelValue;
use gpumon_registry::{Accessor, AccessorRegistry};

use crate::device::{ClockKind, Device};

pub const GPU_ID: &str = "gpu_id";
pub const GPU_NAME: &str = "gpu_name";
pub const GPU_UUID: &str = "gpu_uuid";
pub const GPU_TEMPERATURE_THRESHOLD: &str = "gpu_temperature_threshold";
pub const GPU_MEMORY_CLOCK_MAX: &str = "gpu_memory_clock_max";
pub const GPU_CORES: &str = "gpu_cores";
pub const GPU_DRIVER_VERSION: &str = "gpu_driver_version";
pub const GPU_CUDA_VERSION: &str = "gpu_cuda_version";

/// Device index.
pub struct GpuIndex;

impl Accessor<dyn Device> for GpuIndex {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.index().into())
    }
}

/// Product name, e.g. `Tesla-T4`.
pub struct GpuName;

impl Accessor<dyn Device> for GpuName {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.name()?.into())
    }
}

pub struct GpuUuid;

impl Accessor<dyn Device> for GpuUuid {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.uuid()?.into())
    }
}

pub struct TemperatureThreshold;

impl Accessor<dyn Device> for TemperatureThreshold {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.temperature_threshold()?.into())
    }
}

pub struct MemoryClockMax;

impl Accessor<dyn Device> for MemoryClockMax {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.max_clock_mhz(ClockKind::Memory)?.into())
    }
}

pub struct GpuCores;

impl Accessor<dyn Device> for GpuCores {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.num_cores()?.into())
    }
}

pub struct DriverVersion;

impl Accessor<dyn Device> for DriverVersion {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.driver_version()?.into())
    }
}

pub struct CudaVersion;

impl Accessor<dyn Device> for CudaVersion {
    fn resolve(&self, device: &dyn Device) -> anyhow::Result<LabelValue> {
        Ok(device.cuda_version()?.into())
    }
}

/// Install every built-in accessor.
pub fn register_builtin(registry: &AccessorRegistry<dyn Device>) {
    registry.add_accessor(GPU_ID, GpuIndex);
    registry.add_accessor(GPU_NAME, GpuName);
    registry.add_accessor(GPU_UUID, GpuUuid);
    registry.add_accessor(GPU_TEMPERATURE_THRESHOLD, TemperatureThreshold);
    registry.add_accessor(GPU_MEMORY_CLOCK_MAX, MemoryClockMax);
    registry.add_accessor(GPU_CORES, GpuCores);
    registry.add_accessor(GPU_DRIVER_VERSION, DriverVersion);
    registry.add_accessor(GPU_CUDA_VERSION, CudaVersion);
}
