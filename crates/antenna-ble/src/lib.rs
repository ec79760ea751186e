//! Bluetooth Low Energy platform for the antenna session, built on btleplug
//!
//! This crate provides [`BtleplugPlatform`], an implementation of the
//! `BlePlatform` trait from `antenna-core` for desktop BLE centrals
//! (BlueZ on Linux, CoreBluetooth on macOS, WinRT on Windows).
//!
//! ## Architecture
//!
//! - [`config`] - Backend configuration and timeouts
//! - [`error`] - Backend errors and the btleplug error mapping
//! - [`discovery`] - Adapter setup, scan event pump, session-long adapter power watcher
//! - [`connection`] - Connect/discover with timeouts, notification and link-loss tasks
//! - [`platform`] - The `BlePlatform` implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use antenna_ble::{BleBackendConfig, BtleplugPlatform};
//! use antenna_core::{Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = BtleplugPlatform::new(BleBackendConfig::new()).await?;
//! let (session, _task) = Session::spawn(Arc::new(platform), SessionConfig::default())?;
//! session.start_scan().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod discovery;
mod error;
mod platform;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::BleBackendConfig;
pub use discovery::initialize_adapter;
pub use error::BleBackendError;
pub use platform::BtleplugPlatform;
