//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

/// Drive a full matchlink session and player-data flow against the
/// scripted in-memory platform
#[derive(Debug, Parser)]
#[command(name = "matchlink", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Simulated frame time in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,

    /// Maximum ticks to wait for any one phase to settle
    #[arg(long, default_value_t = 600)]
    pub max_ticks: u32,

    /// How many polls the scripted platform takes to complete an operation
    #[arg(long, default_value_t = 3)]
    pub latency_polls: u32,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
