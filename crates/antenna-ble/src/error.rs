//! Error types for the btleplug backend

use antenna_core::PlatformError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while bringing the backend up
#[derive(Error, Debug)]
pub enum BleBackendError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerUnavailable(String),

    #[error("No BLE adapters available")]
    AdapterNotAvailable,

    #[error("Invalid backend configuration: {0}")]
    InvalidConfiguration(String),
}

/// Map a btleplug failure onto the session's platform taxonomy
pub(crate) fn platform_error(err: btleplug::Error) -> PlatformError {
    match err {
        btleplug::Error::NotConnected => PlatformError::LinkLost("not connected".to_string()),
        btleplug::Error::DeviceNotFound => {
            PlatformError::DeviceNotFound("device not found".to_string())
        }
        btleplug::Error::NoSuchCharacteristic => {
            PlatformError::CharacteristicNotFound("no such characteristic".to_string())
        }
        btleplug::Error::TimedOut(duration) => PlatformError::Timeout {
            duration_ms: duration.as_millis() as u64,
        },
        btleplug::Error::PermissionDenied => {
            PlatformError::AdapterUnavailable("permission denied".to_string())
        }
        other => PlatformError::Other(other.to_string()),
    }
}
