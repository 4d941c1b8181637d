//! CLI interface for coin-ticker
//!
//! Provides subcommands for:
//! - `run`: Start the pipeline and act as its host
//! - `snapshot`: Fetch and print one ranked snapshot
//! - `config`: Show the effective configuration

mod run;
mod snapshot;

pub use run::{parse_host_command, RunArgs};
pub use snapshot::SnapshotArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coin-ticker")]
#[command(about = "Live top-N crypto prices from ranked snapshots and a Binance trade stream")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the price-feed pipeline
    Run(RunArgs),
    /// Fetch one snapshot and exit
    Snapshot(SnapshotArgs),
    /// Show configuration
    Config,
}
