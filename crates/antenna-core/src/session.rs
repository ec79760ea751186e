//! Session handle: the UI-facing surface of the antenna session

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SessionConfig;
use crate::conversation::ConversationLog;
use crate::error::{ConfigError, SessionError, SessionResult};
use crate::manager::{ConnectionManager, Outputs};
use crate::platform::BlePlatform;
use crate::types::{ConnectionState, Peripheral, PeripheralId, StopReason};

// ----------------------------------------------------------------------------
// Notices and Snapshots
// ----------------------------------------------------------------------------

/// One-shot notices for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A connection completed; the UI should show the chat view
    SessionOpened { peripheral: Peripheral },
    /// The link was released; the UI should show the scanner view
    ReturnToScanner,
    ScanEnded { reason: StopReason },
    /// Something the user has to be told about
    Alert { title: String, message: String },
}

/// Consistent view of the session at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub peripherals: Vec<Peripheral>,
    pub connected: Option<Peripheral>,
    pub conversation_len: usize,
    pub last_error: Option<String>,
}

type Reply<T> = oneshot::Sender<SessionResult<T>>;

#[derive(Debug)]
pub(crate) enum Command {
    StartScan(Reply<()>),
    StopScan(Reply<()>),
    Connect(PeripheralId, Reply<()>),
    Disconnect(Reply<()>),
    Send {
        text: String,
        is_emergency: bool,
        reply: Reply<()>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Entry point for running an antenna session on a platform
pub struct Session;

impl Session {
    /// Validate the configuration and spawn the session task.
    ///
    /// The task runs until [`SessionHandle::shutdown`] is called or every
    /// handle is dropped. Must be called from within a tokio runtime.
    pub fn spawn<P: BlePlatform>(
        platform: Arc<P>,
        config: SessionConfig,
    ) -> Result<(SessionHandle, JoinHandle<()>), ConfigError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer_size);
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer_size);
        let (notices, _) = broadcast::channel(config.notice_buffer_size);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (peripherals_tx, peripherals_rx) = watch::channel(Vec::new());
        let (error_tx, error_rx) = watch::channel(None);
        let log = ConversationLog::new();

        let handle = SessionHandle {
            commands: commands_tx,
            state: state_rx,
            peripherals: peripherals_rx,
            last_error: error_rx,
            notices: notices.clone(),
            log: log.clone(),
        };

        let outputs = Outputs {
            state: state_tx,
            peripherals: peripherals_tx,
            last_error: error_tx,
            notices,
            log,
        };
        let manager = ConnectionManager::new(platform, config, outputs, events_tx);
        let task = tokio::spawn(manager.run(commands_rx, events_rx));

        Ok((handle, task))
    }
}

/// Cloneable handle onto a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    peripherals: watch::Receiver<Vec<Peripheral>>,
    last_error: watch::Receiver<Option<String>>,
    notices: broadcast::Sender<SessionEvent>,
    log: ConversationLog,
}

impl SessionHandle {
    /// Clear the registry and scan for antennas until timeout or stop
    pub async fn start_scan(&self) -> SessionResult<()> {
        self.request(Command::StartScan).await
    }

    /// Stop scanning; a no-op when no scan is running
    pub async fn stop_scan(&self) -> SessionResult<()> {
        self.request(Command::StopScan).await
    }

    /// Connect, discover services and subscribe to incoming messages
    pub async fn connect(&self, peripheral: impl Into<PeripheralId>) -> SessionResult<()> {
        let peripheral = peripheral.into();
        self.request(|reply| Command::Connect(peripheral, reply))
            .await
    }

    /// Release the active link; a no-op when not connected
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.request(Command::Disconnect).await
    }

    /// Send a message to the connected antenna. Blank text is ignored.
    pub async fn send(&self, text: impl Into<String>) -> SessionResult<()> {
        self.send_message(text.into(), false).await
    }

    /// Send the emergency phrase
    pub async fn send_emergency(&self, phrase: impl Into<String>) -> SessionResult<()> {
        self.send_message(phrase.into(), true).await
    }

    async fn send_message(&self, text: String, is_emergency: bool) -> SessionResult<()> {
        self.request(|reply| Command::Send {
            text,
            is_emergency,
            reply,
        })
        .await
    }

    /// Snapshot taken after every platform event queued so far was handled
    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Stop scanning, release any link and end the session task
    pub async fn shutdown(&self) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).await.is_err() {
            debug!("Session already stopped");
            return Ok(());
        }
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every published state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Peripherals seen by the current (or last) scan, in discovery order
    pub fn peripherals(&self) -> Vec<Peripheral> {
        self.peripherals.borrow().clone()
    }

    pub fn watch_peripherals(&self) -> watch::Receiver<Vec<Peripheral>> {
        self.peripherals.clone()
    }

    /// The most recent user-facing error banner
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    /// Subscribe to session notices from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notices.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> SessionResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }
}
