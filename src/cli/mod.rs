//! CLI module for the hazard relay
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `simulate` - Run the relay over a simulated road network
//! - `config` - Configuration utilities (init, validate)
//!
//! # Example
//!
//! ```bash
//! # Run the default scenario for 30 seconds
//! hazard simulate --duration 30
//!
//! # Run over real UDP sockets and print a JSON summary
//! hazard simulate --transport udp --json
//!
//! # Write a starter configuration
//! hazard config init
//! ```

pub mod config;
pub mod output;
pub mod simulate;

pub use config::{handle_config_init, handle_config_validate};

use crate::config::TransportKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Hazard relay - roadside stop detection and lane-change advisories
#[derive(Parser, Debug)]
#[command(
    name = "hazard",
    version,
    about = "Detects stopped vehicles and steers upstream traffic away from them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation
    Simulate(SimulateArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "hazard.toml")]
    pub config: PathBuf,

    /// Override run length in seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Override transport (loopback, udp)
    #[arg(short, long)]
    pub transport: Option<TransportKind>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "HAZARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub prometheus: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
    /// Check a configuration file without running it
    Validate(ConfigValidateArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "hazard.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "hazard.toml")]
    pub config: PathBuf,
}
