//! Antenna CLI entry point

use clap::Parser;
use tracing::{error, info};

use antenna_cli::{
    app::AntennaApp,
    cli::{Cli, Commands},
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        println!("{}", AppConfig::example_config());
        return Ok(());
    }

    let mut config = load_configuration(&cli)?;

    // Chat mode prints the conversation itself; keep INFO lines out of it
    let interactive = matches!(cli.command, Commands::Chat { .. });
    setup_logging(cli.verbose || config.cli.verbose, interactive);

    if let Commands::Scan {
        timeout: Some(seconds),
    } = cli.command
    {
        config.session.scan_timeout_secs = seconds;
        config.validate()?;
    }

    let app = match AntennaApp::start(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start the antenna session: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Commands::Chat { scan } => app.run_chat(scan).await,
        Commands::Scan { .. } => {
            let result = app.run_scan().await.map(|_| ());
            app.shutdown().await;
            result
        }
        Commands::Config => Ok(()),
    };
    app.join().await;

    if let Err(e) = outcome {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("Antenna CLI exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool, interactive: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else if interactive {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or the standard sources
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let config = if let Some(config_path) = &cli.config {
        AppConfig::load_from_file(config_path)?
    } else {
        AppConfig::load()?
    };
    Ok(config)
}
