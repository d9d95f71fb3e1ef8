use thiserror::Error;

use gpumon_device::DeviceError;
use gpumon_registry::RegistryError;

/// Failure of one (metric, device) sample or of a whole pass.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("acquiring {metric} on device {device} failed: {source}")]
    Acquisition {
        device: u32,
        metric: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("device enumeration failed: {0}")]
    Enumeration(#[source] DeviceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SampleError {
    /// The device permanently lacks the capability behind this sample.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, SampleError::Acquisition { source, .. } if source.is_not_supported())
    }
}
