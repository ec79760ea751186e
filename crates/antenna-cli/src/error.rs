//! Error handling for the antenna CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Session error: {0}")]
    Session(#[from] antenna_core::SessionError),

    #[error("Session configuration error: {0}")]
    SessionConfig(#[from] antenna_core::ConfigError),

    #[error("BLE backend error: {0}")]
    Backend(#[from] antenna_ble::BleBackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown antenna: {0}")]
    UnknownAntenna(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
