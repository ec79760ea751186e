//! Scan start/stop and the scan-duration timer

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::platform::{AdapterState, BlePlatform, EventSender};

/// Drives the platform discovery feed and owns the scan timeout
pub struct ScanController<P: BlePlatform> {
    platform: Arc<P>,
    timeout: Duration,
    deadline: Option<Instant>,
    active: bool,
}

impl<P: BlePlatform> ScanController<P> {
    pub fn new(platform: Arc<P>, timeout: Duration) -> Self {
        Self {
            platform,
            timeout,
            deadline: None,
            active: false,
        }
    }

    /// Check the permission gate and adapter power before scanning
    pub async fn preflight(&self) -> SessionResult<()> {
        if !self.platform.request_permission().await {
            return Err(SessionError::PermissionDenied);
        }
        match self.platform.adapter_state().await {
            AdapterState::PoweredOn => Ok(()),
            state => {
                debug!("Adapter not ready for scanning: {}", state);
                Err(SessionError::AdapterNotReady)
            }
        }
    }

    /// Start the discovery feed and arm the timeout
    pub async fn begin(&mut self, events: EventSender, now: Instant) -> SessionResult<()> {
        self.platform
            .start_scan(events)
            .await
            .map_err(SessionError::ScanFailed)?;
        self.active = true;
        self.deadline = Some(now + self.timeout);
        Ok(())
    }

    /// Cancel the timer and halt the feed. Safe to call when idle.
    ///
    /// Returns whether a scan was actually running.
    pub async fn halt(&mut self) -> bool {
        self.deadline = None;
        if !self.active {
            return false;
        }
        self.active = false;
        if let Err(e) = self.platform.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the running scan times out
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
