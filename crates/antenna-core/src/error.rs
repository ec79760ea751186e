//! Error types for the antenna session core

use thiserror::Error;

use crate::types::ConnectionState;

// ----------------------------------------------------------------------------
// Platform Errors
// ----------------------------------------------------------------------------

/// Failures reported by the platform BLE collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected: {0}")]
    LinkLost(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("BLE adapter not available: {0}")]
    AdapterUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Whether the failure means the physical link is already gone
    pub fn is_link_lost(&self) -> bool {
        match self {
            PlatformError::LinkLost(_) => true,
            PlatformError::Other(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("disconnected") || message.contains("not connected")
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Decode Errors
// ----------------------------------------------------------------------------

/// Failures turning a characteristic value back into text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Failures surfaced by session operations; none of them are fatal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Bluetooth permissions were denied")]
    PermissionDenied,

    #[error("Bluetooth adapter is not powered on")]
    AdapterNotReady,

    #[error("Failed to establish link: {0}")]
    LinkEstablishFailed(PlatformError),

    #[error("Failed to discover services: {0}")]
    DiscoveryFailed(PlatformError),

    #[error("Failed to subscribe to notifications: {0}")]
    SubscribeFailed(PlatformError),

    #[error("Peripheral dropped the connection")]
    UnexpectedDrop,

    #[error("No active connection")]
    NotConnected,

    #[error("Failed to write message: {0}")]
    WriteFailed(PlatformError),

    #[error("Failed to start scan: {0}")]
    ScanFailed(PlatformError),

    #[error("Operation not allowed while {actual}")]
    InvalidState { actual: ConnectionState },

    #[error("Session task is no longer running")]
    SessionClosed,
}

/// Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration validation error: {0}")]
    Validation(String),
}
