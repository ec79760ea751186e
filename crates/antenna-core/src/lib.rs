//! Session core for a single-purpose BLE antenna
//!
//! This crate holds everything about talking to an antenna that does not depend
//! on a particular Bluetooth stack. The platform is reached through the
//! [`BlePlatform`] trait; `antenna-ble` implements it on top of btleplug.
//!
//! ## Architecture
//!
//! - [`registry`] - Peripherals seen by the current scan
//! - [`scan`] - Scan start/stop and the scan timeout
//! - [`manager`] - Connection state machine and its dispatcher task
//! - [`transport`] - Base64 message encoding over the write/notify pair
//! - [`echo`] - Suppression of the antenna echoing our own messages
//! - [`conversation`] - Append-only log shown by the UI
//! - [`session`] - The [`SessionHandle`] used by the UI layer
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use antenna_core::{BlePlatform, Session, SessionConfig};
//!
//! # async fn example<P: BlePlatform>(platform: P) -> Result<(), Box<dyn std::error::Error>> {
//! let (session, _task) = Session::spawn(Arc::new(platform), SessionConfig::default())?;
//!
//! session.start_scan().await?;
//! if let Some(antenna) = session.peripherals().first() {
//!     session.connect(antenna.id.clone()).await?;
//!     session.send("hola").await?;
//! }
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod conversation;
pub mod echo;
pub mod error;
pub mod manager;
pub mod platform;
pub mod protocol;
pub mod registry;
pub mod scan;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::SessionConfig;
pub use conversation::{ConversationLog, LogCursor};
pub use echo::{Classification, EchoSuppressor};
pub use error::{ConfigError, DecodeError, PlatformError, SessionError, SessionResult};
pub use manager::ActiveLink;
pub use platform::{
    AdapterState, BlePlatform, EventSender, LinkHandle, PlatformEvent, SubscriptionHandle,
    SubscriptionId,
};
pub use protocol::{
    ANTENNA_NOTIFY_CHARACTERISTIC_UUID, ANTENNA_SERVICE_UUID, ANTENNA_WRITE_CHARACTERISTIC_UUID,
    EMERGENCY_PHRASE,
};
pub use registry::{PeripheralRegistry, Sighting};
pub use session::{Session, SessionEvent, SessionHandle, SessionSnapshot};
pub use types::{
    ConnectionState, ConversationEntry, DisconnectReason, Origin, Peripheral, PeripheralId,
    StopReason,
};
