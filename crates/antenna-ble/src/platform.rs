//! [`BlePlatform`] implemented on a btleplug central adapter

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use antenna_core::{
    AdapterState, BlePlatform, EventSender, LinkHandle, PeripheralId, PlatformError,
    SubscriptionHandle, SubscriptionId,
};
use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral as BtlePeripheral};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BleBackendConfig;
use crate::connection::{
    connect_with_timeout, discover_with_timeout, find_characteristic, spawn_link_watcher,
    spawn_notification_pump, write_with_timeout,
};
use crate::discovery::{
    initialize_adapter, read_adapter_state, spawn_power_watcher, spawn_scan_pump,
    KnownPeripherals,
};
use crate::error::{platform_error, BleBackendError};

struct ActiveSubscription {
    peripheral: BtlePeripheral,
    characteristic: Characteristic,
    pump: JoinHandle<()>,
}

// ----------------------------------------------------------------------------
// btleplug Platform
// ----------------------------------------------------------------------------

/// Desktop BLE central backed by btleplug
pub struct BtleplugPlatform {
    adapter: Adapter,
    config: BleBackendConfig,
    known: KnownPeripherals,
    scan_task: Mutex<Option<JoinHandle<()>>>,
    power_task: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<HashMap<SubscriptionId, ActiveSubscription>>,
    link_watchers: Mutex<HashMap<PeripheralId, JoinHandle<()>>>,
    next_subscription: AtomicU64,
}

impl BtleplugPlatform {
    /// Open the first adapter of the host
    pub async fn new(config: BleBackendConfig) -> Result<Self, BleBackendError> {
        config.validate()?;
        let adapter = initialize_adapter().await?;
        Ok(Self::with_adapter(adapter, config))
    }

    /// Use an already opened adapter
    pub fn with_adapter(adapter: Adapter, config: BleBackendConfig) -> Self {
        Self {
            adapter,
            config,
            known: Arc::new(RwLock::new(HashMap::new())),
            scan_task: Mutex::new(None),
            power_task: Mutex::new(None),
            subscriptions: Mutex::new(HashMap::new()),
            link_watchers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Resolve a session id to the platform peripheral
    async fn peripheral(&self, id: &PeripheralId) -> Result<BtlePeripheral, PlatformError> {
        if let Some(peripheral) = self.known.read().await.get(id) {
            return Ok(peripheral.clone());
        }

        let peripheral = self
            .adapter
            .peripherals()
            .await
            .map_err(platform_error)?
            .into_iter()
            .find(|p| p.id().to_string() == id.as_str())
            .ok_or_else(|| PlatformError::DeviceNotFound(id.to_string()))?;

        self.known
            .write()
            .await
            .insert(id.clone(), peripheral.clone());
        Ok(peripheral)
    }

    async fn abort_scan_pump(&self) {
        if let Some(task) = self.scan_task.lock().await.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl BlePlatform for BtleplugPlatform {
    async fn request_permission(&self) -> bool {
        if self.config.assume_permission {
            return true;
        }
        !matches!(
            self.adapter.adapter_state().await,
            Err(btleplug::Error::PermissionDenied)
        )
    }

    async fn adapter_state(&self) -> AdapterState {
        read_adapter_state(&self.adapter).await
    }

    async fn start_scan(&self, events: EventSender) -> Result<(), PlatformError> {
        self.abort_scan_pump().await;

        let filter = if self.config.filter_by_service {
            ScanFilter {
                services: vec![self.config.service_uuid],
            }
        } else {
            ScanFilter::default()
        };

        let stream = self.adapter.events().await.map_err(platform_error)?;
        self.adapter
            .start_scan(filter)
            .await
            .map_err(platform_error)?;

        let pump = spawn_scan_pump(
            self.adapter.clone(),
            stream,
            self.known.clone(),
            events,
        );
        *self.scan_task.lock().await = Some(pump);
        info!("Started BLE scanning");
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), PlatformError> {
        self.abort_scan_pump().await;
        self.adapter.stop_scan().await.map_err(platform_error)?;
        info!("Stopped BLE scanning");
        Ok(())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<LinkHandle, PlatformError> {
        let peripheral = self.peripheral(id).await?;
        connect_with_timeout(&peripheral, self.config.connection_timeout()).await?;
        info!("Connected to {}", id);
        Ok(LinkHandle {
            peripheral: id.clone(),
        })
    }

    async fn discover_services(&self, link: &LinkHandle) -> Result<(), PlatformError> {
        let peripheral = self.peripheral(&link.peripheral).await?;
        discover_with_timeout(&peripheral, self.config.discovery_timeout()).await?;
        debug!(
            "Discovered {} characteristics on {}",
            peripheral.characteristics().len(),
            link.peripheral
        );
        Ok(())
    }

    async fn subscribe(
        &self,
        link: &LinkHandle,
        service: Uuid,
        characteristic: Uuid,
        events: EventSender,
    ) -> Result<SubscriptionHandle, PlatformError> {
        let peripheral = self.peripheral(&link.peripheral).await?;
        let target = find_characteristic(peripheral.characteristics(), service, characteristic)?;

        peripheral.subscribe(&target).await.map_err(platform_error)?;
        let notifications = peripheral.notifications().await.map_err(platform_error)?;

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let pump = spawn_notification_pump(notifications, characteristic, id, events);
        self.subscriptions.lock().await.insert(
            id,
            ActiveSubscription {
                peripheral,
                characteristic: target,
                pump,
            },
        );

        debug!("Subscribed to {} on {}", characteristic, link.peripheral);
        Ok(SubscriptionHandle {
            id,
            peripheral: link.peripheral.clone(),
            characteristic,
        })
    }

    async fn unsubscribe(&self, subscription: &SubscriptionHandle) {
        let Some(active) = self.subscriptions.lock().await.remove(&subscription.id) else {
            return;
        };
        active.pump.abort();
        if let Err(e) = active.peripheral.unsubscribe(&active.characteristic).await {
            debug!("Unsubscribe from {} failed: {}", subscription.peripheral, e);
        }
    }

    async fn write(
        &self,
        link: &LinkHandle,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), PlatformError> {
        let peripheral = self.peripheral(&link.peripheral).await?;
        let target = find_characteristic(peripheral.characteristics(), service, characteristic)?;
        write_with_timeout(&peripheral, &target, value, self.config.write_timeout()).await?;
        debug!("Sent {} bytes to {}", value.len(), link.peripheral);
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<(), PlatformError> {
        if let Some(watcher) = self.link_watchers.lock().await.remove(id) {
            watcher.abort();
        }

        let peripheral = self.peripheral(id).await?;
        if !peripheral.is_connected().await.unwrap_or(true) {
            debug!("{} already disconnected", id);
            return Ok(());
        }
        peripheral.disconnect().await.map_err(platform_error)?;
        info!("Disconnected from {}", id);
        Ok(())
    }

    async fn watch_link(&self, link: &LinkHandle, events: EventSender) -> Result<(), PlatformError> {
        let peripheral = self.peripheral(&link.peripheral).await?;
        let stream = self.adapter.events().await.map_err(platform_error)?;

        let watcher = spawn_link_watcher(stream, peripheral, link.peripheral.clone(), events);
        if let Some(previous) = self
            .link_watchers
            .lock()
            .await
            .insert(link.peripheral.clone(), watcher)
        {
            warn!("Replacing link watcher of {}", link.peripheral);
            previous.abort();
        }
        Ok(())
    }

    async fn watch_adapter(&self, events: EventSender) -> Result<(), PlatformError> {
        let watcher = spawn_power_watcher(self.adapter.clone(), events, self.config.adapter_poll());
        if let Some(previous) = self.power_task.lock().await.replace(watcher) {
            previous.abort();
        }
        debug!("Watching adapter power every {:?}", self.config.adapter_poll());
        Ok(())
    }
}
