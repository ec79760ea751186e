//! Capability interface to the platform BLE stack
//!
//! The session never talks to a radio directly. A [`BlePlatform`] turns each
//! request into a platform call, and every asynchronous platform callback
//! (scan results, notifications, link loss, adapter power) is delivered as a
//! [`PlatformEvent`] on the bounded channel handed over with the request, in
//! the order the platform produced it.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::types::{Peripheral, PeripheralId};

/// Sender half of the session's platform event channel
pub type EventSender = mpsc::Sender<PlatformEvent>;

// ----------------------------------------------------------------------------
// Handles and Events
// ----------------------------------------------------------------------------

/// Radio power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unknown,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::PoweredOn => f.write_str("PoweredOn"),
            AdapterState::PoweredOff => f.write_str("PoweredOff"),
            AdapterState::Unauthorized => f.write_str("Unauthorized"),
            AdapterState::Unknown => f.write_str("Unknown"),
        }
    }
}

/// An established physical link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHandle {
    pub peripheral: PeripheralId,
}

/// Identifies one notification subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live notification subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub peripheral: PeripheralId,
    pub characteristic: Uuid,
}

/// Callbacks from the platform, serialized onto one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Scan result; the same peripheral may be reported many times
    Discovered(Peripheral),
    /// The discovery feed failed and stopped
    ScanFailed(String),
    /// A characteristic value arrived on a subscription
    Notification {
        subscription: SubscriptionId,
        value: Vec<u8>,
    },
    /// The subscription reported an error instead of a value
    NotificationError {
        subscription: SubscriptionId,
        message: String,
    },
    /// The physical link to a peripheral went away
    LinkLost(PeripheralId),
    AdapterStateChanged(AdapterState),
}

// ----------------------------------------------------------------------------
// Platform Trait
// ----------------------------------------------------------------------------

/// Narrow view of the platform BLE stack used by the session
#[async_trait]
pub trait BlePlatform: Send + Sync + 'static {
    /// Ask for (or confirm) the permissions needed to scan and connect
    async fn request_permission(&self) -> bool;

    async fn adapter_state(&self) -> AdapterState;

    /// Begin the discovery feed; results arrive as [`PlatformEvent::Discovered`]
    async fn start_scan(&self, events: EventSender) -> Result<(), PlatformError>;

    async fn stop_scan(&self) -> Result<(), PlatformError>;

    async fn connect(&self, peripheral: &PeripheralId) -> Result<LinkHandle, PlatformError>;

    async fn discover_services(&self, link: &LinkHandle) -> Result<(), PlatformError>;

    /// Subscribe to notifications of one characteristic
    async fn subscribe(
        &self,
        link: &LinkHandle,
        service: Uuid,
        characteristic: Uuid,
        events: EventSender,
    ) -> Result<SubscriptionHandle, PlatformError>;

    /// Release a subscription; releasing an unknown or released one is a no-op
    async fn unsubscribe(&self, subscription: &SubscriptionHandle);

    /// Acknowledged write of one characteristic value
    async fn write(
        &self,
        link: &LinkHandle,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), PlatformError>;

    /// Terminate the physical link, also cancelling a pending connection
    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), PlatformError>;

    /// Report [`PlatformEvent::LinkLost`] when the link drops
    async fn watch_link(&self, link: &LinkHandle, events: EventSender)
        -> Result<(), PlatformError>;

    /// Report [`PlatformEvent::AdapterStateChanged`] for as long as `events`
    /// is open, independent of any scan or link
    async fn watch_adapter(&self, events: EventSender) -> Result<(), PlatformError>;
}
