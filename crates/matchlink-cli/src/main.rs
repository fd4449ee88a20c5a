//! Matchlink CLI entry point

use clap::Parser;
use tracing::{error, info};

use matchlink_cli::{cli::Cli, config::AppConfig, demo};

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load configuration: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = demo::run(&cli, config) {
        error!("Demo failed: {err:#}");
        std::process::exit(1);
    }
    info!("matchlink exited successfully");
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            AppConfig::load_from_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}
