//! btleplug backend configuration

use std::time::Duration;

use antenna_core::ANTENNA_SERVICE_UUID;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BleBackendError;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleBackendConfig {
    /// Maximum time to wait for a link to come up
    pub connection_timeout_secs: u64,
    /// Maximum time to wait for GATT service discovery
    pub discovery_timeout_secs: u64,
    /// Maximum time to wait for a write acknowledgement
    pub write_timeout_secs: u64,
    /// Only report peripherals advertising the antenna service
    pub filter_by_service: bool,
    /// How often adapter power is polled
    pub adapter_poll_ms: u64,
    /// Treat the permission gate as granted without probing the adapter
    pub assume_permission: bool,
    /// Service used as scan filter when `filter_by_service` is set
    pub service_uuid: Uuid,
}

impl Default for BleBackendConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 10,
            discovery_timeout_secs: 15,
            write_timeout_secs: 5,
            filter_by_service: false,
            adapter_poll_ms: 1_000,
            assume_permission: false,
            service_uuid: ANTENNA_SERVICE_UUID,
        }
    }
}

impl BleBackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_secs = timeout.as_secs();
        self
    }

    /// Set write acknowledgement timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_secs = timeout.as_secs();
        self
    }

    /// Enable or disable service filtering during scans
    pub fn with_service_filter(mut self, enabled: bool) -> Self {
        self.filter_by_service = enabled;
        self
    }

    /// Set adapter power polling interval
    pub fn with_adapter_poll(mut self, interval: Duration) -> Self {
        self.adapter_poll_ms = interval.as_millis() as u64;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn adapter_poll(&self) -> Duration {
        Duration::from_millis(self.adapter_poll_ms)
    }

    pub fn validate(&self) -> Result<(), BleBackendError> {
        if self.connection_timeout_secs == 0
            || self.discovery_timeout_secs == 0
            || self.write_timeout_secs == 0
        {
            return Err(BleBackendError::InvalidConfiguration(
                "Connection, discovery and write timeouts must be greater than 0".to_string(),
            ));
        }
        if self.adapter_poll_ms == 0 {
            return Err(BleBackendError::InvalidConfiguration(
                "Adapter poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
