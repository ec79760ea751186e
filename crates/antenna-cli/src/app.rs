//! Terminal front-end driving an antenna session

use std::sync::Arc;
use std::time::UNIX_EPOCH;

use antenna_ble::BtleplugPlatform;
use antenna_core::{
    ConnectionState, ConversationEntry, LogCursor, Origin, Peripheral, PeripheralId, Session,
    SessionError, SessionEvent, SessionHandle, SessionResult,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Chat Commands
// ----------------------------------------------------------------------------

/// One line of chat-mode input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Scan,
    Stop,
    Devices,
    Connect(String),
    Disconnect,
    Sos,
    Status,
    Help,
    Quit,
    Message(String),
    Unknown(String),
}

impl ChatCommand {
    /// Parse a line; `None` for blank input
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(ChatCommand::Message(line.to_string()));
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim).unwrap_or_default();

        Some(match name {
            "scan" => ChatCommand::Scan,
            "stop" => ChatCommand::Stop,
            "devices" | "ls" => ChatCommand::Devices,
            "connect" | "c" if !argument.is_empty() => ChatCommand::Connect(argument.to_string()),
            "disconnect" => ChatCommand::Disconnect,
            "sos" => ChatCommand::Sos,
            "status" => ChatCommand::Status,
            "help" | "?" => ChatCommand::Help,
            "quit" | "exit" | "q" => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        })
    }
}

const HELP: &str = "\
Commands:
  /scan               scan for antennas
  /stop               stop scanning
  /devices            list antennas found by the last scan
  /connect <n|id>     connect to an antenna by list number or identifier
  /disconnect         drop the current connection
  /sos                send the emergency message
  /status             show the connection state
  /help               show this help
  /quit               leave
Any other line is sent as a message.";

/// Resolve a 1-based list number or a literal identifier
pub fn resolve_target(target: &str, peripherals: &[Peripheral]) -> Result<PeripheralId> {
    match target.parse::<usize>() {
        Ok(number) => number
            .checked_sub(1)
            .and_then(|index| peripherals.get(index))
            .map(|peripheral| peripheral.id.clone())
            .ok_or_else(|| CliError::UnknownAntenna(target.to_string())),
        Err(_) => Ok(PeripheralId::new(target)),
    }
}

/// Render a conversation entry as one terminal line
pub fn format_entry(entry: &ConversationEntry, show_timestamps: bool) -> String {
    let speaker = match entry.origin {
        Origin::System => "*",
        Origin::Local => "me",
        Origin::Peer => "antenna",
    };
    let marker = if entry.is_emergency { "[SOS] " } else { "" };

    if show_timestamps {
        let seconds = entry
            .recorded_at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        format!(
            "{:02}:{:02}:{:02} {}> {}{}",
            (seconds / 3600) % 24,
            (seconds / 60) % 60,
            seconds % 60,
            speaker,
            marker,
            entry.text
        )
    } else {
        format!("{}> {}{}", speaker, marker, entry.text)
    }
}

pub fn format_devices(peripherals: &[Peripheral]) -> String {
    if peripherals.is_empty() {
        return "No antennas found. Use /scan to search.".to_string();
    }
    peripherals
        .iter()
        .enumerate()
        .map(|(index, peripheral)| {
            let signal = peripheral
                .signal_strength
                .map(|rssi| format!(" ({} dBm)", rssi))
                .unwrap_or_default();
            format!("{:>3}. {} [{}]{}", index + 1, peripheral.label(), peripheral.id, signal)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Running session plus the terminal settings
pub struct AntennaApp {
    config: AppConfig,
    session: SessionHandle,
    task: JoinHandle<()>,
}

impl AntennaApp {
    /// Open the BLE adapter and start the session
    pub async fn start(config: AppConfig) -> Result<Self> {
        let platform = BtleplugPlatform::new(config.ble.clone()).await?;
        let (session, task) = Session::spawn(Arc::new(platform), config.session.clone())?;
        info!("Antenna session ready");
        Ok(Self {
            config,
            session,
            task,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Interactive chat until `/quit` or end of input
    pub async fn run_chat(&self, scan_now: bool) -> Result<()> {
        let printer = spawn_printer(
            self.session.conversation().cursor(),
            self.config.cli.show_timestamps,
        );
        let notices = spawn_notice_printer(self.session.subscribe());

        println!("{}", HELP);
        if scan_now {
            self.report(self.session.start_scan().await);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt(&self.config.cli.prompt).await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(command) = ChatCommand::parse(&line) else {
                continue;
            };
            if !self.execute(command).await {
                break;
            }
        }

        notices.abort();
        self.shutdown().await;
        let _ = printer.await;
        Ok(())
    }

    /// Returns false when the user asked to leave
    async fn execute(&self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::Scan => self.report(self.session.start_scan().await),
            ChatCommand::Stop => self.report(self.session.stop_scan().await),
            ChatCommand::Devices => println!("{}", format_devices(&self.session.peripherals())),
            ChatCommand::Connect(target) => {
                match resolve_target(&target, &self.session.peripherals()) {
                    Ok(id) => self.report(self.session.connect(id).await),
                    Err(e) => println!("{}", e),
                }
            }
            ChatCommand::Disconnect => self.report(self.session.disconnect().await),
            ChatCommand::Sos => {
                let phrase = self.config.session.emergency_phrase.clone();
                self.report(self.session.send_emergency(phrase).await);
            }
            ChatCommand::Status => self.print_status().await,
            ChatCommand::Help => println!("{}", HELP),
            ChatCommand::Quit => return false,
            ChatCommand::Message(text) => self.report(self.session.send(text).await),
            ChatCommand::Unknown(line) => println!("Unknown command: {} (try /help)", line),
        }
        true
    }

    async fn print_status(&self) {
        match self.session.snapshot().await {
            Ok(snapshot) => {
                let peer = snapshot
                    .connected
                    .map(|p| format!(" to {}", p.label()))
                    .unwrap_or_default();
                println!(
                    "State: {}{} | antennas: {} | messages: {}",
                    snapshot.state,
                    peer,
                    snapshot.peripherals.len(),
                    snapshot.conversation_len
                );
                if let Some(error) = snapshot.last_error {
                    println!("Last error: {}", error);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    /// Most failures already reached the conversation log
    fn report(&self, result: SessionResult<()>) {
        match result {
            Ok(()) => {}
            Err(e @ (SessionError::InvalidState { .. } | SessionError::SessionClosed)) => {
                println!("{}", e)
            }
            Err(e) => debug!("Command failed: {}", e),
        }
    }

    /// One scan pass; prints the antennas found
    pub async fn run_scan(&self) -> Result<Vec<Peripheral>> {
        let mut state = self.session.watch_state();
        self.session.start_scan().await?;
        println!(
            "Scanning for {} seconds...",
            self.config.session.scan_timeout_secs
        );

        while *state.borrow_and_update() == ConnectionState::Scanning {
            if state.changed().await.is_err() {
                break;
            }
        }

        let peripherals = self.session.peripherals();
        println!("{}", format_devices(&peripherals));
        Ok(peripherals)
    }

    /// Release the link, stop scanning and wait for the session task
    pub async fn shutdown(&self) {
        if let Err(e) = self.session.shutdown().await {
            warn!("Session shutdown failed: {}", e);
        }
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Session task ended abnormally: {}", e);
        }
    }
}

fn spawn_printer(mut cursor: LogCursor, show_timestamps: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(entry) = cursor.next().await {
            println!("\r{}", format_entry(&entry, show_timestamps));
        }
    })
}

fn spawn_notice_printer(mut notices: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(SessionEvent::Alert { title, message }) => {
                    println!("\r!! {}: {}", title, message);
                }
                Ok(SessionEvent::SessionOpened { peripheral }) => {
                    println!("\r== Chatting with {} ==", peripheral.label());
                }
                Ok(SessionEvent::ReturnToScanner) => {
                    println!("\r== Back to scanner. Use /scan to search again. ==");
                }
                Ok(SessionEvent::StateChanged { .. }) | Ok(SessionEvent::ScanEnded { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("Missed {} session notices", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn prompt(text: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
