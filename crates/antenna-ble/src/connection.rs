//! Link setup, notification forwarding and link-loss watching

use std::time::Duration;

use antenna_core::{EventSender, PeripheralId, PlatformError, PlatformEvent, SubscriptionId};
use btleplug::api::{
    CentralEvent, Characteristic, Peripheral as _, ValueNotification, WriteType,
};
use btleplug::platform::Peripheral as BtlePeripheral;
use futures::stream::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::discovery::CentralEvents;
use crate::error::platform_error;

// ----------------------------------------------------------------------------
// Link Setup
// ----------------------------------------------------------------------------

pub(crate) async fn connect_with_timeout(
    peripheral: &BtlePeripheral,
    limit: Duration,
) -> Result<(), PlatformError> {
    match timeout(limit, peripheral.connect()).await {
        Ok(result) => result.map_err(platform_error),
        Err(_) => Err(PlatformError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }),
    }
}

pub(crate) async fn discover_with_timeout(
    peripheral: &BtlePeripheral,
    limit: Duration,
) -> Result<(), PlatformError> {
    match timeout(limit, peripheral.discover_services()).await {
        Ok(result) => result.map_err(platform_error),
        Err(_) => Err(PlatformError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }),
    }
}

/// Acknowledged write that gives up after `limit`
pub(crate) async fn write_with_timeout(
    peripheral: &BtlePeripheral,
    characteristic: &Characteristic,
    value: &[u8],
    limit: Duration,
) -> Result<(), PlatformError> {
    let write = peripheral.write(characteristic, value, WriteType::WithResponse);
    match timeout(limit, write).await {
        Ok(result) => result.map_err(platform_error),
        Err(_) => Err(PlatformError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }),
    }
}

/// Look up a discovered characteristic of the given service
pub(crate) fn find_characteristic(
    characteristics: impl IntoIterator<Item = Characteristic>,
    service: Uuid,
    characteristic: Uuid,
) -> Result<Characteristic, PlatformError> {
    characteristics
        .into_iter()
        .find(|c| c.uuid == characteristic && c.service_uuid == service)
        .ok_or_else(|| PlatformError::CharacteristicNotFound(characteristic.to_string()))
}

// ----------------------------------------------------------------------------
// Background Tasks
// ----------------------------------------------------------------------------

/// Forward values of one characteristic as notifications of `subscription`
pub(crate) fn spawn_notification_pump(
    mut notifications: impl Stream<Item = ValueNotification> + Send + Unpin + 'static,
    characteristic: Uuid,
    subscription: SubscriptionId,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = notifications.next().await {
            if notification.uuid != characteristic {
                continue;
            }
            let event = PlatformEvent::Notification {
                subscription,
                value: notification.value,
            };
            if events.send(event).await.is_err() {
                return;
            }
        }

        debug!("Notification stream of {:?} ended", subscription);
        let _ = events
            .send(PlatformEvent::NotificationError {
                subscription,
                message: "notification stream closed".to_string(),
            })
            .await;
    })
}

/// Report link loss of one peripheral until aborted
pub(crate) fn spawn_link_watcher(
    mut stream: CentralEvents,
    peripheral: BtlePeripheral,
    id: PeripheralId,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let platform_id = peripheral.id();

        while let Some(event) = stream.next().await {
            if let CentralEvent::DeviceDisconnected(lost) = event {
                if lost == platform_id {
                    info!("Link to {} dropped", id);
                    let _ = events.send(PlatformEvent::LinkLost(id.clone())).await;
                    return;
                }
            }
        }
        debug!("Adapter event stream ended while watching {}", id);
    })
}
