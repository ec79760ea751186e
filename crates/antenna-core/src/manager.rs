//! Connection manager: the session state machine and its dispatcher loop
//!
//! All state transitions happen inside [`ConnectionManager::run`]. UI commands
//! and platform events arrive on two channels and are handled one at a time,
//! so a connect, disconnect or scan stop is never interleaved with another.
//! Queued platform events are always drained before the next command.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::conversation::ConversationLog;
use crate::echo::{Classification, EchoSuppressor};
use crate::error::{SessionError, SessionResult};
use crate::platform::{
    AdapterState, BlePlatform, EventSender, LinkHandle, PlatformEvent, SubscriptionHandle,
    SubscriptionId,
};
use crate::protocol::is_emergency_text;
use crate::registry::{PeripheralRegistry, Sighting};
use crate::scan::ScanController;
use crate::session::{Command, SessionEvent, SessionSnapshot};
use crate::transport::{MessageTransport, OutboundText};
use crate::types::{
    ConnectionState, DisconnectReason, Origin, Peripheral, PeripheralId, StopReason,
};

// ----------------------------------------------------------------------------
// Session Phase
// ----------------------------------------------------------------------------

/// The live connection; exists only while connected
#[derive(Debug, Clone)]
pub struct ActiveLink {
    pub peripheral: Peripheral,
    pub link: LinkHandle,
    pub subscription: SubscriptionHandle,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Scanning,
    Connecting,
    Connected(ActiveLink),
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Phase::Idle => ConnectionState::Disconnected,
            Phase::Scanning => ConnectionState::Scanning,
            Phase::Connecting => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
        }
    }
}

/// Observable outputs of the manager
pub(crate) struct Outputs {
    pub state: watch::Sender<ConnectionState>,
    pub peripherals: watch::Sender<Vec<Peripheral>>,
    pub last_error: watch::Sender<Option<String>>,
    pub notices: broadcast::Sender<SessionEvent>,
    pub log: ConversationLog,
}

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

pub(crate) struct ConnectionManager<P: BlePlatform> {
    platform: Arc<P>,
    config: SessionConfig,
    phase: Phase,
    scanner: ScanController<P>,
    transport: MessageTransport<P>,
    echo: EchoSuppressor,
    registry: PeripheralRegistry,
    outputs: Outputs,
    events_tx: EventSender,
}

impl<P: BlePlatform> ConnectionManager<P> {
    pub(crate) fn new(
        platform: Arc<P>,
        config: SessionConfig,
        outputs: Outputs,
        events_tx: EventSender,
    ) -> Self {
        Self {
            scanner: ScanController::new(platform.clone(), config.scan_timeout()),
            transport: MessageTransport::new(platform.clone(), &config),
            echo: EchoSuppressor::new(config.echo_grace(), config.echo_expiry()),
            registry: PeripheralRegistry::new(),
            phase: Phase::Idle,
            platform,
            config,
            outputs,
            events_tx,
        }
    }

    /// Dispatcher loop; returns after shutdown or when every handle is gone
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<PlatformEvent>,
    ) {
        info!("Antenna session started");
        if let Err(e) = self.platform.watch_adapter(self.events_tx.clone()).await {
            warn!("Cannot watch adapter power: {}", e);
        }

        loop {
            let scan_deadline = self.scanner.deadline();
            let echo_deadline = self.echo.deadline();

            tokio::select! {
                biased;

                Some(event) = events.recv() => {
                    self.handle_event(event).await;
                }

                _ = sleep_until(scan_deadline) => {
                    self.on_scan_timeout().await;
                }

                _ = sleep_until(echo_deadline) => {
                    self.echo.expire(Instant::now());
                }

                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All session handles dropped");
                        self.shutdown().await;
                        break;
                    }
                }
            }
        }

        self.outputs.log.close();
        info!("Antenna session stopped");
    }

    /// Returns false once the dispatcher should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::StartScan(reply) => {
                let result = self.start_scan().await;
                let _ = reply.send(result);
            }
            Command::StopScan(reply) => {
                self.stop_scan(StopReason::Manual).await;
                let _ = reply.send(Ok(()));
            }
            Command::Connect(peripheral, reply) => {
                let result = self.connect(peripheral).await;
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.teardown(DisconnectReason::User).await;
                let _ = reply.send(Ok(()));
            }
            Command::Send {
                text,
                is_emergency,
                reply,
            } => {
                let result = self.send(&text, is_emergency).await;
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(reply) => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn handle_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Discovered(peripheral) => self.on_discovered(peripheral),
            PlatformEvent::ScanFailed(message) => self.on_scan_failed(message).await,
            PlatformEvent::Notification {
                subscription,
                value,
            } => self.on_notification(subscription, &value),
            PlatformEvent::NotificationError {
                subscription,
                message,
            } => {
                if self.is_active_subscription(subscription) {
                    self.outputs
                        .log
                        .system(format!("Notification error: {}", message));
                }
            }
            PlatformEvent::LinkLost(peripheral) => {
                if self.connected_to(&peripheral) {
                    self.teardown(DisconnectReason::Peripheral).await;
                } else {
                    debug!("Ignoring link loss of inactive peripheral {}", peripheral);
                }
            }
            PlatformEvent::AdapterStateChanged(state) => self.on_adapter_state(state).await,
        }
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    async fn start_scan(&mut self) -> SessionResult<()> {
        match self.phase {
            Phase::Idle => {}
            Phase::Scanning => {
                debug!("Scan already running");
                return Ok(());
            }
            Phase::Connecting | Phase::Connected(_) => {
                return Err(SessionError::InvalidState {
                    actual: self.state(),
                });
            }
        }

        if let Err(e) = self.scanner.preflight().await {
            match e {
                SessionError::PermissionDenied => {
                    self.set_error("Bluetooth permissions denied. Cannot scan.");
                    self.outputs.log.system("Bluetooth permissions denied.");
                }
                SessionError::AdapterNotReady => {
                    self.outputs
                        .log
                        .system("Bluetooth is not powered on. Please turn it on.");
                    self.alert("Bluetooth required", "Please turn on Bluetooth to scan.");
                }
                _ => {}
            }
            return Err(e);
        }

        self.registry.clear();
        self.publish_peripherals();
        self.outputs.last_error.send_replace(None);
        self.enter(Phase::Scanning);
        self.outputs.log.system("Starting device scan...");

        if let Err(e) = self
            .scanner
            .begin(self.events_tx.clone(), Instant::now())
            .await
        {
            self.outputs.log.system(format!("Error during scan: {}", e));
            self.set_error(format!("Error during scan: {}", e));
            self.fail_to_idle();
            return Err(e);
        }
        Ok(())
    }

    /// Stop the running scan; returns whether one was running
    async fn stop_scan(&mut self, reason: StopReason) -> bool {
        if !self.scanner.halt().await {
            return false;
        }

        let message = match reason {
            StopReason::Manual => "Scan stopped by user.",
            StopReason::Timeout => "Scan stopped after timeout.",
            StopReason::Error => "Scan stopped after an error.",
            StopReason::Connecting => "Scan stopped to begin connecting.",
        };
        self.outputs.log.system(message);

        match reason {
            StopReason::Manual | StopReason::Timeout => self.enter(Phase::Idle),
            StopReason::Error => self.fail_to_idle(),
            // The caller moves straight on to Connecting
            StopReason::Connecting => {}
        }
        let _ = self.outputs.notices.send(SessionEvent::ScanEnded { reason });
        true
    }

    async fn on_scan_timeout(&mut self) {
        if self.stop_scan(StopReason::Timeout).await {
            self.set_error("Scan ended. Start a new scan to retry.");
        }
    }

    async fn on_scan_failed(&mut self, message: String) {
        if !self.scanner.is_active() {
            debug!("Ignoring scan failure outside a scan: {}", message);
            return;
        }
        self.outputs
            .log
            .system(format!("Error during scan: {}", message));
        self.set_error(format!("Error during scan: {}", message));
        self.stop_scan(StopReason::Error).await;
    }

    fn on_discovered(&mut self, peripheral: Peripheral) {
        if !matches!(self.phase, Phase::Scanning) {
            debug!("Ignoring sighting of {} outside a scan", peripheral.id);
            return;
        }
        let label = peripheral.label().to_string();
        if self.registry.upsert(peripheral) == Sighting::New {
            self.outputs.log.system(format!("Antenna found: {}", label));
        }
        self.publish_peripherals();
    }

    // ------------------------------------------------------------------------
    // Connection Lifecycle
    // ------------------------------------------------------------------------

    async fn connect(&mut self, id: PeripheralId) -> SessionResult<()> {
        if !matches!(self.phase, Phase::Idle | Phase::Scanning) {
            return Err(SessionError::InvalidState {
                actual: self.state(),
            });
        }

        let peripheral = self
            .registry
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Peripheral::new(id.clone()));

        self.stop_scan(StopReason::Connecting).await;
        self.enter(Phase::Connecting);
        self.outputs
            .log
            .system(format!("Connecting to {}...", peripheral.label()));

        match self.establish(&peripheral).await {
            Ok(active) => {
                self.enter(Phase::Connected(active));
                self.outputs.log.system("Notifications enabled. Ready!");
                let _ = self
                    .outputs
                    .notices
                    .send(SessionEvent::SessionOpened { peripheral });
                Ok(())
            }
            Err(e) => {
                self.set_error(format!("Connection failed: {}", e));
                self.outputs.log.system(format!("Connection error: {}", e));
                self.release_link(&id).await;
                self.fail_to_idle();
                Err(e)
            }
        }
    }

    /// Link, discover, then subscribe; each step must succeed in turn
    async fn establish(&self, peripheral: &Peripheral) -> SessionResult<ActiveLink> {
        let link = self
            .platform
            .connect(&peripheral.id)
            .await
            .map_err(SessionError::LinkEstablishFailed)?;

        self.platform
            .discover_services(&link)
            .await
            .map_err(SessionError::DiscoveryFailed)?;
        self.outputs
            .log
            .system("Link established. Services discovered.");

        if let Err(e) = self
            .platform
            .watch_link(&link, self.events_tx.clone())
            .await
        {
            warn!("Cannot watch link to {} for drops: {}", peripheral.id, e);
        }

        let subscription = self
            .transport
            .open(&link, self.events_tx.clone())
            .await
            .map_err(SessionError::SubscribeFailed)?;

        Ok(ActiveLink {
            peripheral: peripheral.clone(),
            link,
            subscription,
        })
    }

    /// Release the active link. Returns false, with no side effects, if there
    /// is none.
    async fn teardown(&mut self, reason: DisconnectReason) -> bool {
        let active = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connected(active) => active,
            other => {
                self.phase = other;
                debug!("Disconnect ({:?}) without an active link", reason);
                return false;
            }
        };

        let name = active.peripheral.label().to_string();
        if reason == DisconnectReason::Peripheral {
            self.set_error(format!("{} ({})", SessionError::UnexpectedDrop, name));
            self.outputs
                .log
                .system(format!("Device {} disconnected unexpectedly.", name));
            self.alert("Disconnected", format!("{} has been disconnected.", name));
        }
        self.outputs
            .log
            .system(format!("Disconnecting from {}...", name));

        self.platform.unsubscribe(&active.subscription).await;
        self.release_link(&active.peripheral.id).await;
        self.echo.clear();

        match reason {
            DisconnectReason::Peripheral => self.fail_to_idle(),
            DisconnectReason::User | DisconnectReason::Forced => self.enter(Phase::Idle),
        }
        self.outputs.log.system("Disconnected.");
        let _ = self.outputs.notices.send(SessionEvent::ReturnToScanner);
        true
    }

    async fn release_link(&self, peripheral: &PeripheralId) {
        if let Err(e) = self.platform.disconnect(peripheral).await {
            // The link may already be gone
            debug!("Error during disconnect from {}: {}", peripheral, e);
        }
    }

    async fn on_adapter_state(&mut self, state: AdapterState) {
        if state == AdapterState::PoweredOn {
            self.outputs
                .log
                .system("Bluetooth powered on. Ready to scan.");
            return;
        }

        self.outputs.log.system(format!(
            "Bluetooth state: {}. Please turn on Bluetooth.",
            state
        ));
        if matches!(state, AdapterState::PoweredOff | AdapterState::Unauthorized) {
            self.alert(
                "Bluetooth required",
                "Please turn on Bluetooth or grant the Bluetooth permissions.",
            );
        }
        self.stop_scan(StopReason::Error).await;
        self.teardown(DisconnectReason::Forced).await;
    }

    async fn shutdown(&mut self) {
        self.stop_scan(StopReason::Manual).await;
        self.teardown(DisconnectReason::User).await;
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    async fn send(&mut self, text: &str, is_emergency: bool) -> SessionResult<()> {
        let Some(text) = OutboundText::new(text) else {
            debug!("Ignoring blank message");
            return Ok(());
        };
        let Phase::Connected(active) = &self.phase else {
            self.outputs
                .log
                .system("Error: no active connection to send data.");
            self.alert(
                "Connection error",
                "There is no active connection to send data.",
            );
            return Err(SessionError::NotConnected);
        };
        let link = active.link.clone();

        self.outputs
            .log
            .append(Origin::Local, text.as_str(), is_emergency);
        self.echo.arm(text.as_str(), Instant::now());

        match self.transport.send(&link, &text).await {
            Ok(()) => {
                self.outputs.log.system("Message sent.");
                Ok(())
            }
            Err(e) => {
                self.echo.clear();
                self.outputs.log.system(format!("Write error: {}", e));
                self.set_error(format!("Write error: {}", e));
                self.alert("Send error", format!("Failed to send message: {}", e));
                if e.is_link_lost() {
                    self.teardown(DisconnectReason::Forced).await;
                }
                Err(SessionError::WriteFailed(e))
            }
        }
    }

    fn on_notification(&mut self, subscription: SubscriptionId, value: &[u8]) {
        if !self.is_active_subscription(subscription) {
            debug!("Dropping notification from stale subscription {:?}", subscription);
            return;
        }

        let text = match self.transport.decode(value) {
            Ok(text) => text,
            Err(e) => {
                warn!("Discarding undecodable notification ({} bytes): {}", value.len(), e);
                self.outputs
                    .log
                    .system(format!("Could not decode incoming message: {}", e));
                return;
            }
        };
        if text.is_empty() {
            debug!("Ignoring blank notification");
            return;
        }

        match self.echo.classify(&text, Instant::now()) {
            Classification::Echo | Classification::Duplicate => {}
            Classification::Peer => {
                let is_emergency = is_emergency_text(&text, &self.config.emergency_phrase);
                self.outputs.log.append(Origin::Peer, text, is_emergency);
            }
        }
    }

    // ------------------------------------------------------------------------
    // State Publication
    // ------------------------------------------------------------------------

    fn state(&self) -> ConnectionState {
        *self.outputs.state.borrow()
    }

    fn enter(&mut self, phase: Phase) {
        let next = phase.state();
        self.phase = phase;
        self.publish(next);
    }

    /// Pass through `Error` and settle in `Disconnected`
    fn fail_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.publish(ConnectionState::Error);
        self.publish(ConnectionState::Disconnected);
    }

    fn publish(&self, next: ConnectionState) {
        let previous = self.state();
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!("Unexpected state transition {} -> {}", previous, next);
        }
        info!("Connection state: {} -> {}", previous, next);
        self.outputs.state.send_replace(next);
        let _ = self.outputs.notices.send(SessionEvent::StateChanged {
            from: previous,
            to: next,
        });
    }

    fn publish_peripherals(&self) {
        self.outputs.peripherals.send_replace(self.registry.snapshot());
    }

    fn set_error(&self, message: impl Into<String>) {
        self.outputs.last_error.send_replace(Some(message.into()));
    }

    fn alert(&self, title: &str, message: impl Into<String>) {
        let _ = self.outputs.notices.send(SessionEvent::Alert {
            title: title.to_string(),
            message: message.into(),
        });
    }

    fn connected_to(&self, peripheral: &PeripheralId) -> bool {
        matches!(&self.phase, Phase::Connected(active) if &active.peripheral.id == peripheral)
    }

    fn is_active_subscription(&self, subscription: SubscriptionId) -> bool {
        matches!(&self.phase, Phase::Connected(active) if active.subscription.id == subscription)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let connected = match &self.phase {
            Phase::Connected(active) => Some(active.peripheral.clone()),
            Phase::Idle | Phase::Scanning | Phase::Connecting => None,
        };
        SessionSnapshot {
            state: self.state(),
            peripherals: self.registry.snapshot(),
            connected,
            conversation_len: self.outputs.log.len(),
            last_error: self.outputs.last_error.borrow().clone(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
