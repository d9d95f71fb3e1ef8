//! gpumon-device: the hardware side of the exporter.
//!
//! The registry crates never see a concrete GPU. They work against the
//! [`Device`] capability trait, which this crate defines together with:
//!
//! - [`GpuMetric`], the catalogue mapping metric names to device readings
//! - built-in label accessors (`gpu_id`, `gpu_name`, `gpu_uuid`, ...)
//! - [`SimulatedProvider`], an in-memory backend with failure injection
//! - `NvmlProvider` (feature `nvml`), real NVIDIA devices via NVML

pub mod accessors;
pub mod catalogue;
pub mod device;
pub mod error;
#[cfg(feature = "nvml")]
pub mod nvml;
pub mod simulated;

pub use accessors::register_builtin;
pub use catalogue::GpuMetric;
pub use device::{Capability, ClockKind, Device, DeviceProvider, EccKind, MemoryInfo, Utilization};
pub use error::{DeviceError, DeviceResult};
#[cfg(feature = "nvml")]
pub use nvml::NvmlProvider;
pub use simulated::{SimulatedDevice, SimulatedProvider, SimulatedReadings};
