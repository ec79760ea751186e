//! Antenna CLI library
//!
//! Terminal front-end for an antenna session: configuration loading, the
//! interactive chat loop and the one-shot scan command.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{AntennaApp, ChatCommand};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
