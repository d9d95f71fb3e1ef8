use thiserror::Error;

use crate::device::Capability;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{0} is not supported by this device")]
    NotSupported(Capability),

    #[error("collection deadline elapsed")]
    Timeout,

    #[error("no device at index {0}")]
    NotFound(u32),

    #[error("{capability} query failed: {message}")]
    Query {
        capability: Capability,
        message: String,
    },

    #[error("device backend unavailable: {0}")]
    Unavailable(String),
}

impl DeviceError {
    /// Whether the failure is a permanent property of the device rather than
    /// a transient query error.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DeviceError::NotSupported(_))
    }
}
