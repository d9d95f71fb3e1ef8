//! NVIDIA devices via NVML.

use std::sync::Arc;

use nvml_wrapper::Nvml;
use nvml_wrapper::enum_wrappers::device::{
    Clock, EccCounter, MemoryError, PerformanceState, TemperatureSensor, TemperatureThreshold,
};
use nvml_wrapper::error::NvmlError;
use tracing::info;

use crate::device::{
    Capability, ClockKind, Device, DeviceProvider, EccKind, MemoryInfo, Utilization,
};
use crate::error::{DeviceError, DeviceResult};

fn query_error(capability: Capability) -> impl FnOnce(NvmlError) -> DeviceError {
    move |e| match e {
        NvmlError::NotSupported => DeviceError::NotSupported(capability),
        NvmlError::Timeout => DeviceError::Timeout,
        other => DeviceError::Query {
            capability,
            message: other.to_string(),
        },
    }
}

fn clock(kind: ClockKind) -> Clock {
    match kind {
        ClockKind::Graphics => Clock::Graphics,
        ClockKind::Sm => Clock::SM,
        ClockKind::Memory => Clock::Memory,
        ClockKind::Video => Clock::Video,
    }
}

fn pstate_number(state: PerformanceState) -> Option<u32> {
    let n = match state {
        PerformanceState::Zero => 0,
        PerformanceState::One => 1,
        PerformanceState::Two => 2,
        PerformanceState::Three => 3,
        PerformanceState::Four => 4,
        PerformanceState::Five => 5,
        PerformanceState::Six => 6,
        PerformanceState::Seven => 7,
        PerformanceState::Eight => 8,
        PerformanceState::Nine => 9,
        PerformanceState::Ten => 10,
        PerformanceState::Eleven => 11,
        PerformanceState::Twelve => 12,
        PerformanceState::Thirteen => 13,
        PerformanceState::Fourteen => 14,
        PerformanceState::Fifteen => 15,
        PerformanceState::Unknown => return None,
    };
    Some(n)
}

/// NVML encodes CUDA versions as `1000 * major + 10 * minor`.
fn cuda_version_string(version: i32) -> String {
    format!("{}.{}", version / 1000, (version % 1000) / 10)
}

/// Provider backed by the NVML library. The library is initialised once and
/// shut down when the last handle is dropped.
pub struct NvmlProvider {
    nvml: Arc<Nvml>,
}

impl NvmlProvider {
    pub fn init() -> DeviceResult<Self> {
        let nvml = Nvml::init().map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        let driver = nvml
            .sys_driver_version()
            .unwrap_or_else(|_| "unknown".to_string());
        info!(%driver, "NVML initialised");
        Ok(Self {
            nvml: Arc::new(nvml),
        })
    }
}

impl DeviceProvider for NvmlProvider {
    fn device_count(&self) -> DeviceResult<u32> {
        self.nvml
            .device_count()
            .map_err(|e| DeviceError::Unavailable(e.to_string()))
    }

    fn device(&self, index: u32) -> DeviceResult<Arc<dyn Device>> {
        self.nvml.device_by_index(index).map_err(|e| match e {
            NvmlError::InvalidArg => DeviceError::NotFound(index),
            other => DeviceError::Unavailable(other.to_string()),
        })?;
        Ok(Arc::new(NvmlDevice {
            nvml: self.nvml.clone(),
            index,
        }))
    }

    fn backend(&self) -> &'static str {
        "nvml"
    }
}

/// NVML device handles borrow the library, so each query reacquires the
/// handle by index.
struct NvmlDevice {
    nvml: Arc<Nvml>,
    index: u32,
}

impl NvmlDevice {
    fn with_handle<T>(
        &self,
        capability: Capability,
        query: impl FnOnce(&nvml_wrapper::Device<'_>) -> Result<T, NvmlError>,
    ) -> DeviceResult<T> {
        let handle = self
            .nvml
            .device_by_index(self.index)
            .map_err(query_error(capability))?;
        query(&handle).map_err(query_error(capability))
    }
}

impl Device for NvmlDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> DeviceResult<String> {
        self.with_handle(Capability::Name, |d| d.name())
    }

    fn temperature(&self) -> DeviceResult<u32> {
        self.with_handle(Capability::Temperature, |d| {
            d.temperature(TemperatureSensor::Gpu)
        })
    }

    fn utilization(&self) -> DeviceResult<Utilization> {
        let rates = self.with_handle(Capability::Utilization, |d| d.utilization_rates())?;
        Ok(Utilization {
            gpu: rates.gpu,
            memory: rates.memory,
        })
    }

    fn power_usage_mw(&self) -> DeviceResult<u32> {
        self.with_handle(Capability::PowerUsage, |d| d.power_usage())
    }

    fn running_processes(&self) -> DeviceResult<u32> {
        let processes = self.with_handle(Capability::RunningProcesses, |d| {
            d.running_compute_processes()
        })?;
        Ok(processes.len() as u32)
    }

    fn memory_info(&self) -> DeviceResult<MemoryInfo> {
        let info = self.with_handle(Capability::MemoryInfo, |d| d.memory_info())?;
        Ok(MemoryInfo {
            used: info.used,
            total: info.total,
            free: info.free,
        })
    }

    fn performance_state(&self) -> DeviceResult<u32> {
        let state = self.with_handle(Capability::PerformanceState, |d| d.performance_state())?;
        pstate_number(state).ok_or(DeviceError::NotSupported(Capability::PerformanceState))
    }

    fn clock_mhz(&self, kind: ClockKind) -> DeviceResult<u32> {
        self.with_handle(Capability::Clock, |d| d.clock_info(clock(kind)))
    }

    fn ecc_errors(&self, kind: EccKind) -> DeviceResult<u64> {
        let error_type = match kind {
            EccKind::Corrected => MemoryError::Corrected,
            EccKind::Uncorrected => MemoryError::Uncorrected,
        };
        self.with_handle(Capability::EccErrors, |d| {
            d.total_ecc_errors(error_type, EccCounter::Volatile)
        })
    }

    fn uuid(&self) -> DeviceResult<String> {
        self.with_handle(Capability::Uuid, |d| d.uuid())
    }

    fn temperature_threshold(&self) -> DeviceResult<u32> {
        self.with_handle(Capability::TemperatureThreshold, |d| {
            d.temperature_threshold(TemperatureThreshold::Slowdown)
        })
    }

    fn max_clock_mhz(&self, kind: ClockKind) -> DeviceResult<u32> {
        self.with_handle(Capability::MaxClock, |d| d.max_clock_info(clock(kind)))
    }

    fn num_cores(&self) -> DeviceResult<u32> {
        self.with_handle(Capability::Cores, |d| d.num_cores())
    }

    fn driver_version(&self) -> DeviceResult<String> {
        self.nvml
            .sys_driver_version()
            .map_err(query_error(Capability::DriverVersion))
    }

    fn cuda_version(&self) -> DeviceResult<String> {
        let version = self
            .nvml
            .sys_cuda_driver_version()
            .map_err(query_error(Capability::CudaVersion))?;
        Ok(cuda_version_string(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pstate_maps_to_number() {
        assert_eq!(pstate_number(PerformanceState::Zero), Some(0));
        assert_eq!(pstate_number(PerformanceState::Eight), Some(8));
        assert_eq!(pstate_number(PerformanceState::Unknown), None);
    }

    #[test]
    fn cuda_version_is_major_minor() {
        assert_eq!(cuda_version_string(12040), "12.4");
        assert_eq!(cuda_version_string(11080), "11.8");
    }

    #[test]
    fn nvml_errors_map_to_device_errors() {
        assert!(query_error(Capability::Uuid)(NvmlError::NotSupported).is_not_supported());
        assert!(matches!(
            query_error(Capability::Clock)(NvmlError::Timeout),
            DeviceError::Timeout
        ));
    }

    // Requires an NVIDIA driver.
    #[test]
    #[ignore]
    fn enumerates_real_devices() {
        let provider = NvmlProvider::init().unwrap();
        let count = provider.device_count().unwrap();
        for index in 0..count {
            let device = provider.device(index).unwrap();
            assert!(!device.name().unwrap().is_empty());
        }
    }
}
