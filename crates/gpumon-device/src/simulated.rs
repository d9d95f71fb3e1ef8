//! In-memory device backend.
//!
//! Devices report fixed readings and can be told to fail individual
//! capabilities, either as a query error or as "not supported".

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::{
    Capability, ClockKind, Device, DeviceProvider, EccKind, MemoryInfo, Utilization,
};
use crate::error::{DeviceError, DeviceResult};

const GIB: u64 = 1024 * 1024 * 1024;

/// Readings a simulated device reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedReadings {
    pub temperature: u32,
    pub temperature_threshold: u32,
    pub utilization: Utilization,
    pub power_usage_mw: u32,
    pub running_processes: u32,
    pub memory: MemoryInfo,
    pub performance_state: u32,
    pub graphics_clock: u32,
    pub sm_clock: u32,
    pub memory_clock: u32,
    pub video_clock: u32,
    pub max_memory_clock: u32,
    pub ecc_corrected: u64,
    pub ecc_uncorrected: u64,
    pub cores: u32,
    pub driver_version: String,
    pub cuda_version: String,
}

impl Default for SimulatedReadings {
    fn default() -> Self {
        Self {
            temperature: 65,
            temperature_threshold: 92,
            utilization: Utilization { gpu: 40, memory: 25 },
            power_usage_mw: 70_000,
            running_processes: 2,
            memory: MemoryInfo {
                used: 4 * GIB,
                total: 16 * GIB,
                free: 12 * GIB,
            },
            performance_state: 0,
            graphics_clock: 1590,
            sm_clock: 1590,
            memory_clock: 5001,
            video_clock: 1470,
            max_memory_clock: 5001,
            ecc_corrected: 0,
            ecc_uncorrected: 0,
            cores: 2560,
            driver_version: "550.54.15".to_string(),
            cuda_version: "12.4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Query,
    NotSupported,
}

#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    index: u32,
    name: String,
    readings: SimulatedReadings,
    failures: HashMap<Capability, Failure>,
}

impl SimulatedDevice {
    pub fn new(index: u32, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            readings: SimulatedReadings::default(),
            failures: HashMap::new(),
        }
    }

    pub fn with_readings(mut self, readings: SimulatedReadings) -> Self {
        self.readings = readings;
        self
    }

    pub fn with_temperature(mut self, celsius: u32) -> Self {
        self.readings.temperature = celsius;
        self
    }

    /// Make every query of `capability` fail with a query error.
    pub fn failing(mut self, capability: Capability) -> Self {
        self.failures.insert(capability, Failure::Query);
        self
    }

    /// Make `capability` report as not supported.
    pub fn unsupported(mut self, capability: Capability) -> Self {
        self.failures.insert(capability, Failure::NotSupported);
        self
    }

    fn check(&self, capability: Capability) -> DeviceResult<()> {
        match self.failures.get(&capability) {
            None => Ok(()),
            Some(Failure::NotSupported) => Err(DeviceError::NotSupported(capability)),
            Some(Failure::Query) => Err(DeviceError::Query {
                capability,
                message: "injected failure".to_string(),
            }),
        }
    }
}

impl Device for SimulatedDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> DeviceResult<String> {
        self.check(Capability::Name)?;
        Ok(self.name.clone())
    }

    fn temperature(&self) -> DeviceResult<u32> {
        self.check(Capability::Temperature)?;
        Ok(self.readings.temperature)
    }

    fn utilization(&self) -> DeviceResult<Utilization> {
        self.check(Capability::Utilization)?;
        Ok(self.readings.utilization)
    }

    fn power_usage_mw(&self) -> DeviceResult<u32> {
        self.check(Capability::PowerUsage)?;
        Ok(self.readings.power_usage_mw)
    }

    fn running_processes(&self) -> DeviceResult<u32> {
        self.check(Capability::RunningProcesses)?;
        Ok(self.readings.running_processes)
    }

    fn memory_info(&self) -> DeviceResult<MemoryInfo> {
        self.check(Capability::MemoryInfo)?;
        Ok(self.readings.memory)
    }

    fn performance_state(&self) -> DeviceResult<u32> {
        self.check(Capability::PerformanceState)?;
        Ok(self.readings.performance_state)
    }

    fn clock_mhz(&self, clock: ClockKind) -> DeviceResult<u32> {
        self.check(Capability::Clock)?;
        Ok(match clock {
            ClockKind::Graphics => self.readings.graphics_clock,
            ClockKind::Sm => self.readings.sm_clock,
            ClockKind::Memory => self.readings.memory_clock,
            ClockKind::Video => self.readings.video_clock,
        })
    }

    fn ecc_errors(&self, kind: EccKind) -> DeviceResult<u64> {
        self.check(Capability::EccErrors)?;
        Ok(match kind {
            EccKind::Corrected => self.readings.ecc_corrected,
            EccKind::Uncorrected => self.readings.ecc_uncorrected,
        })
    }

    fn uuid(&self) -> DeviceResult<String> {
        self.check(Capability::Uuid)?;
        Ok(format!("GPU-00000000-0000-0000-0000-{:012x}", self.index))
    }

    fn temperature_threshold(&self) -> DeviceResult<u32> {
        self.check(Capability::TemperatureThreshold)?;
        Ok(self.readings.temperature_threshold)
    }

    fn max_clock_mhz(&self, clock: ClockKind) -> DeviceResult<u32> {
        self.check(Capability::MaxClock)?;
        match clock {
            ClockKind::Memory => Ok(self.readings.max_memory_clock),
            _ => Err(DeviceError::NotSupported(Capability::MaxClock)),
        }
    }

    fn num_cores(&self) -> DeviceResult<u32> {
        self.check(Capability::Cores)?;
        Ok(self.readings.cores)
    }

    fn driver_version(&self) -> DeviceResult<String> {
        self.check(Capability::DriverVersion)?;
        Ok(self.readings.driver_version.clone())
    }

    fn cuda_version(&self) -> DeviceResult<String> {
        self.check(Capability::CudaVersion)?;
        Ok(self.readings.cuda_version.clone())
    }
}

/// A fixed set of simulated devices.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    devices: Vec<Arc<SimulatedDevice>>,
}

impl SimulatedProvider {
    pub fn new(devices: Vec<SimulatedDevice>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
        }
    }

    /// `count` identical devices with default readings.
    pub fn uniform(count: u32, name: &str) -> Self {
        Self::new((0..count).map(|i| SimulatedDevice::new(i, name)).collect())
    }
}

impl DeviceProvider for SimulatedProvider {
    fn device_count(&self) -> DeviceResult<u32> {
        Ok(self.devices.len() as u32)
    }

    fn device(&self, index: u32) -> DeviceResult<Arc<dyn Device>> {
        let device = self
            .devices
            .get(index as usize)
            .ok_or(DeviceError::NotFound(index))?;
        Ok(device.clone())
    }

    fn backend(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_enumerates_devices() {
        let provider = SimulatedProvider::uniform(3, "Tesla-T4");
        assert_eq!(provider.device_count().unwrap(), 3);

        let device = provider.device(2).unwrap();
        assert_eq!(device.index(), 2);
        assert_eq!(device.name().unwrap(), "Tesla-T4");
        assert!(matches!(provider.device(3), Err(DeviceError::NotFound(3))));
    }

    #[test]
    fn injected_failures_are_per_capability() {
        let device = SimulatedDevice::new(0, "A100")
            .failing(Capability::Temperature)
            .unsupported(Capability::Uuid);

        assert!(matches!(
            device.temperature(),
            Err(DeviceError::Query { capability: Capability::Temperature, .. })
        ));
        assert!(device.uuid().unwrap_err().is_not_supported());
        assert_eq!(device.power_usage_mw().unwrap(), 70_000);
    }

    #[test]
    fn uuid_is_derived_from_index() {
        let device = SimulatedDevice::new(10, "A100");
        assert_eq!(device.uuid().unwrap(), "GPU-00000000-0000-0000-0000-00000000000a");
    }

    #[test]
    fn max_clock_only_for_memory() {
        let device = SimulatedDevice::new(0, "A100");
        assert_eq!(device.max_clock_mhz(ClockKind::Memory).unwrap(), 5001);
        assert!(device.max_clock_mhz(ClockKind::Sm).unwrap_err().is_not_supported());
    }
}
