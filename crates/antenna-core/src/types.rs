//! Core data model shared by every session component

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Peripheral Identity
// ----------------------------------------------------------------------------

/// Opaque, stable identifier of a peripheral as reported by the platform
/// (a MAC address on Android/Linux, a UUID on Apple platforms)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A peripheral seen during a scan pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    pub id: PeripheralId,
    pub display_name: Option<String>,
    /// RSSI in dBm
    pub signal_strength: Option<i16>,
}

impl Peripheral {
    pub fn new(id: impl Into<PeripheralId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            signal_strength: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_signal_strength(mut self, rssi: i16) -> Self {
        self.signal_strength = Some(rssi);
        self
    }

    /// Name for user-facing text, falling back to the identifier
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Process-wide state of the single antenna session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Disconnected, Scanning) | (Disconnected, Connecting) => true,
            (Scanning, Disconnected) | (Scanning, Connecting) | (Scanning, Error) => true,
            (Connecting, Connected) | (Connecting, Disconnected) | (Connecting, Error) => true,
            (Connected, Disconnected) | (Connected, Error) => true,
            (Error, Disconnected) => true,
            (Disconnected, _) | (Scanning, _) | (Connecting, _) | (Connected, _) | (Error, _) => {
                false
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Scanning => "Scanning",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a scan pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Manual,
    Timeout,
    Error,
    /// Stopped so a connection attempt can start
    Connecting,
}

/// Who initiated a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    User,
    Peripheral,
    Forced,
}

// ----------------------------------------------------------------------------
// Conversation Entries
// ----------------------------------------------------------------------------

/// Author of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Sent by this client
    #[serde(rename = "self")]
    Local,
    /// Received from the antenna
    Peer,
    /// Narration of state transitions and errors
    System,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => f.write_str("self"),
            Origin::Peer => f.write_str("peer"),
            Origin::System => f.write_str("system"),
        }
    }
}

/// One immutable line of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Monotonic sequence number, starting at 1
    pub id: u64,
    pub origin: Origin,
    pub text: String,
    pub is_emergency: bool,
    pub recorded_at: SystemTime,
}
