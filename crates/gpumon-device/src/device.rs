//! Device capability traits.
//!
//! A [`Device`] is the entity handle every accessor and metric acquisition
//! receives. Backends implement it over whatever they talk to; the collector
//! only ever holds `Arc<dyn Device>`.

use std::fmt;
use std::sync::Arc;

use crate::error::{DeviceError, DeviceResult};

/// A single queryable property of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Name,
    Uuid,
    Temperature,
    TemperatureThreshold,
    Utilization,
    PowerUsage,
    RunningProcesses,
    MemoryInfo,
    PerformanceState,
    Clock,
    MaxClock,
    EccErrors,
    Cores,
    DriverVersion,
    CudaVersion,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Name => "name",
            Capability::Uuid => "uuid",
            Capability::Temperature => "temperature",
            Capability::TemperatureThreshold => "temperature threshold",
            Capability::Utilization => "utilization",
            Capability::PowerUsage => "power usage",
            Capability::RunningProcesses => "running processes",
            Capability::MemoryInfo => "memory info",
            Capability::PerformanceState => "performance state",
            Capability::Clock => "clock",
            Capability::MaxClock => "max clock",
            Capability::EccErrors => "ECC errors",
            Capability::Cores => "core count",
            Capability::DriverVersion => "driver version",
            Capability::CudaVersion => "CUDA version",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPU and memory-controller utilization, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utilization {
    pub gpu: u32,
    pub memory: u32,
}

/// Framebuffer memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryInfo {
    pub used: u64,
    pub total: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockKind {
    Graphics,
    Sm,
    Memory,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccKind {
    Corrected,
    Uncorrected,
}

/// One observed GPU.
///
/// Every query may fail independently. Optional capabilities default to
/// [`DeviceError::NotSupported`].
pub trait Device: Send + Sync {
    /// Position of the device in its provider's enumeration.
    fn index(&self) -> u32;

    fn name(&self) -> DeviceResult<String>;

    /// Current GPU temperature in degrees Celsius.
    fn temperature(&self) -> DeviceResult<u32>;

    fn utilization(&self) -> DeviceResult<Utilization>;

    /// Current board power draw in milliwatts.
    fn power_usage_mw(&self) -> DeviceResult<u32>;

    /// Number of compute processes running on the device.
    fn running_processes(&self) -> DeviceResult<u32>;

    fn memory_info(&self) -> DeviceResult<MemoryInfo>;

    /// Performance state, 0 (maximum) to 15 (minimum).
    fn performance_state(&self) -> DeviceResult<u32>;

    /// Current clock speed in MHz.
    fn clock_mhz(&self, clock: ClockKind) -> DeviceResult<u32>;

    /// Volatile ECC error total since the last driver load.
    fn ecc_errors(&self, kind: EccKind) -> DeviceResult<u64>;

    fn uuid(&self) -> DeviceResult<String> {
        Err(DeviceError::NotSupported(Capability::Uuid))
    }

    /// Slowdown temperature threshold in degrees Celsius.
    fn temperature_threshold(&self) -> DeviceResult<u32> {
        Err(DeviceError::NotSupported(Capability::TemperatureThreshold))
    }

    fn max_clock_mhz(&self, _clock: ClockKind) -> DeviceResult<u32> {
        Err(DeviceError::NotSupported(Capability::MaxClock))
    }

    fn num_cores(&self) -> DeviceResult<u32> {
        Err(DeviceError::NotSupported(Capability::Cores))
    }

    fn driver_version(&self) -> DeviceResult<String> {
        Err(DeviceError::NotSupported(Capability::DriverVersion))
    }

    /// CUDA driver API version as `major.minor`.
    fn cuda_version(&self) -> DeviceResult<String> {
        Err(DeviceError::NotSupported(Capability::CudaVersion))
    }
}

/// Enumerates devices.
pub trait DeviceProvider: Send + Sync {
    fn device_count(&self) -> DeviceResult<u32>;

    fn device(&self, index: u32) -> DeviceResult<Arc<dyn Device>>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
