//! Adapter setup, scanning and adapter power watching

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use antenna_core::{AdapterState, EventSender, Peripheral, PeripheralId, PlatformEvent};
use btleplug::api::{Central, CentralEvent, CentralState, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral as BtlePeripheral};
use futures::stream::{Stream, StreamExt};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BleBackendError;

/// Adapter event stream as handed out by btleplug
pub(crate) type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Platform peripherals seen so far, keyed by their session id
pub(crate) type KnownPeripherals = Arc<RwLock<HashMap<PeripheralId, BtlePeripheral>>>;

// ----------------------------------------------------------------------------
// Adapter
// ----------------------------------------------------------------------------

/// Open the first BLE adapter of the host
pub async fn initialize_adapter() -> Result<Adapter, BleBackendError> {
    let manager = Manager::new()
        .await
        .map_err(|e| BleBackendError::ManagerUnavailable(e.to_string()))?;

    let adapter = manager
        .adapters()
        .await
        .map_err(|e| BleBackendError::ManagerUnavailable(e.to_string()))?
        .into_iter()
        .next()
        .ok_or(BleBackendError::AdapterNotAvailable)?;

    info!("BLE adapter initialized");
    Ok(adapter)
}

pub(crate) fn adapter_state_from(state: CentralState) -> AdapterState {
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        _ => AdapterState::Unknown,
    }
}

pub(crate) async fn read_adapter_state(adapter: &Adapter) -> AdapterState {
    match adapter.adapter_state().await {
        Ok(state) => adapter_state_from(state),
        Err(btleplug::Error::PermissionDenied) => AdapterState::Unauthorized,
        Err(e) => {
            debug!("Cannot read adapter state: {}", e);
            AdapterState::Unknown
        }
    }
}

/// Tracks adapter power between polls
#[derive(Debug)]
pub(crate) struct PowerMonitor {
    last: AdapterState,
}

impl PowerMonitor {
    pub(crate) fn new(initial: AdapterState) -> Self {
        Self { last: initial }
    }

    /// The new state if it differs from the previous observation
    pub(crate) fn observe(&mut self, state: AdapterState) -> Option<AdapterState> {
        if state == self.last {
            return None;
        }
        info!("Adapter state changed: {} -> {}", self.last, state);
        self.last = state;
        Some(state)
    }
}

/// Poll adapter power for as long as the session listens
pub(crate) fn spawn_power_watcher(
    adapter: Adapter,
    events: EventSender,
    poll: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut power = PowerMonitor::new(read_adapter_state(&adapter).await);
        let mut ticker = tokio::time::interval(poll);

        loop {
            tokio::select! {
                _ = events.closed() => break,
                _ = ticker.tick() => {
                    let Some(state) = power.observe(read_adapter_state(&adapter).await) else {
                        continue;
                    };
                    if events.send(PlatformEvent::AdapterStateChanged(state)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Adapter power watcher stopped");
    })
}

// ----------------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------------

/// Session view of an advertisement; blank names count as absent
pub(crate) fn sighting(id: String, local_name: Option<String>, rssi: Option<i16>) -> Peripheral {
    let mut peripheral = Peripheral::new(id);
    peripheral.display_name = local_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    peripheral.signal_strength = rssi;
    peripheral
}

/// Forward discoveries from the adapter event stream until aborted
pub(crate) fn spawn_scan_pump(
    adapter: Adapter,
    mut stream: CentralEvents,
    known: KnownPeripherals,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let id = match stream.next().await {
                Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => id,
                Some(_) => continue,
                None => {
                    warn!("Adapter event stream ended during scan");
                    let _ = events
                        .send(PlatformEvent::ScanFailed("adapter event stream ended".to_string()))
                        .await;
                    break;
                }
            };

            let Ok(peripheral) = adapter.peripheral(&id).await else {
                debug!("Discovered peripheral {:?} vanished", id);
                continue;
            };
            let properties = peripheral.properties().await.ok().flatten();
            let (name, rssi) = properties
                .map(|p| (p.local_name, p.rssi))
                .unwrap_or_default();

            let found = sighting(peripheral.id().to_string(), name, rssi);
            known.write().await.insert(found.id.clone(), peripheral);
            if events.send(PlatformEvent::Discovered(found)).await.is_err() {
                break;
            }
        }
        debug!("Scan pump stopped");
    })
}
