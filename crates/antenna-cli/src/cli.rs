//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start interactive chat mode
    Chat {
        /// Start scanning right away
        #[arg(short, long)]
        scan: bool,
    },
    /// Run one scan pass and list the antennas found
    Scan {
        /// Scan duration in seconds (overrides the configuration)
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Print an example configuration file
    Config,
}
