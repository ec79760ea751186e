//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::protocol::{
    ANTENNA_NOTIFY_CHARACTERISTIC_UUID, ANTENNA_SERVICE_UUID, ANTENNA_WRITE_CHARACTERISTIC_UUID,
    EMERGENCY_PHRASE,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for an antenna session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Scan auto-stops after this many seconds
    pub scan_timeout_secs: u64,
    /// How long a consumed echo keeps absorbing repeats of the same payload
    pub echo_grace_ms: u64,
    /// How long an unanswered sent message waits for its echo
    pub echo_expiry_ms: u64,
    /// Upper bound on one acknowledged write before it counts as failed
    pub write_timeout_ms: u64,
    /// Capacity of the UI command channel
    pub command_buffer_size: usize,
    /// Capacity of the platform event channel
    pub event_buffer_size: usize,
    /// Capacity of the session notice broadcast
    pub notice_buffer_size: usize,
    /// GATT service carrying the message channel
    pub service_uuid: Uuid,
    /// Characteristic written with outgoing messages
    pub write_characteristic_uuid: Uuid,
    /// Characteristic notifying incoming messages
    pub notify_characteristic_uuid: Uuid,
    /// Incoming messages containing this phrase are flagged as emergencies
    pub emergency_phrase: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 15,
            echo_grace_ms: 500,
            echo_expiry_ms: 5_000,
            write_timeout_ms: 10_000,
            command_buffer_size: 16,
            event_buffer_size: 64,
            notice_buffer_size: 64,
            service_uuid: ANTENNA_SERVICE_UUID,
            write_characteristic_uuid: ANTENNA_WRITE_CHARACTERISTIC_UUID,
            notify_characteristic_uuid: ANTENNA_NOTIFY_CHARACTERISTIC_UUID,
            emergency_phrase: EMERGENCY_PHRASE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout_secs = timeout.as_secs();
        self
    }

    /// Set echo grace window
    pub fn with_echo_grace(mut self, grace: Duration) -> Self {
        self.echo_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set how long a sent message waits for its echo
    pub fn with_echo_expiry(mut self, expiry: Duration) -> Self {
        self.echo_expiry_ms = expiry.as_millis() as u64;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the GATT service and characteristics of the message channel
    pub fn with_channel(mut self, service: Uuid, write: Uuid, notify: Uuid) -> Self {
        self.service_uuid = service;
        self.write_characteristic_uuid = write;
        self.notify_characteristic_uuid = notify;
        self
    }

    /// Set the emergency phrase
    pub fn with_emergency_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.emergency_phrase = phrase.into();
        self
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn echo_grace(&self) -> Duration {
        Duration::from_millis(self.echo_grace_ms)
    }

    pub fn echo_expiry(&self) -> Duration {
        Duration::from_millis(self.echo_expiry_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Scan timeout must be greater than 0".to_string(),
            ));
        }

        if self.echo_grace_ms == 0 {
            return Err(ConfigError::Validation(
                "Echo grace window must be greater than 0".to_string(),
            ));
        }

        if self.echo_expiry_ms < self.echo_grace_ms {
            return Err(ConfigError::Validation(format!(
                "Echo expiry ({}ms) must not be shorter than the grace window ({}ms)",
                self.echo_expiry_ms, self.echo_grace_ms
            )));
        }

        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Write timeout must be greater than 0".to_string(),
            ));
        }

        if self.command_buffer_size == 0
            || self.event_buffer_size == 0
            || self.notice_buffer_size == 0
        {
            return Err(ConfigError::Validation(
                "Channel buffer sizes must be greater than 0".to_string(),
            ));
        }

        if self.write_characteristic_uuid == self.notify_characteristic_uuid {
            return Err(ConfigError::Validation(
                "Write and notify characteristics must differ".to_string(),
            ));
        }

        Ok(())
    }
}
