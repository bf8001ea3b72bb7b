//! Stevedore CLI - offline inspection for the hot deployer.
//!
//! Reads the same configuration as the deployer and reports on its
//! activation ledger, on units that may embed descriptors, and on
//! descriptor artifacts dropped for hot deploy.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stevedore_config::{Config, ResolvedConfig};
use stevedore_deployer::DeployerSettings;

mod commands;
pub mod config_bridge;

use commands::{check, config, ledger, scan};

/// Stevedore - reference-counted hot deployment of shared capabilities
#[derive(Parser)]
#[command(name = "stevedore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra configuration file, applied over system and user config
    #[arg(short, long, global = true, env = "STEVEDORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the activation ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },

    /// Show the descriptor the deployer would find in an exploded unit
    Scan {
        /// Unit root directory
        path: PathBuf,
        /// Unit id (defaults to the directory name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Check whether a file is a hot-deployable descriptor artifact
    Check {
        /// Artifact path
        path: PathBuf,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// List claims and totals
    Show {
        /// Directory holding the ledger (overrides configuration)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Check that every total matches its claims
    Verify {
        /// Directory holding the ledger (overrides configuration)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only a specific section (deployer or logging)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the current configuration
    Validate,
    /// Show config file paths being checked
    Paths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = Config::load(cli.config.as_deref());
    setup_logging(resolved.as_ref().ok(), cli.verbose);

    match cli.command {
        Commands::Ledger { command } => {
            let resolved = resolved?;
            match command {
                LedgerCommands::Show { data_dir } => {
                    ledger::show_ledger(&settings(&resolved, data_dir))?;
                },
                LedgerCommands::Verify { data_dir } => {
                    ledger::verify_ledger(&settings(&resolved, data_dir))?;
                },
            }
        },
        Commands::Scan { path, id } => {
            scan::scan_unit(&settings(&resolved?, None), &path, id.as_deref())?;
        },
        Commands::Check { path } => {
            check::check_artifact(&settings(&resolved?, None), &path)?;
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                config::show_config(&resolved?, &format, section.as_deref())?;
            },
            ConfigCommands::Validate => config::validate_config(&resolved?),
            ConfigCommands::Paths => config::show_paths(),
        },
    }

    Ok(())
}

/// Deployer settings from config, with an optional data dir override.
fn settings(resolved: &ResolvedConfig, data_dir: Option<PathBuf>) -> DeployerSettings {
    let mut settings = config_bridge::to_deployer_settings(&resolved.config);
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    settings
}

/// Set up logging from config, with `--verbose` forcing debug.
fn setup_logging(resolved: Option<&ResolvedConfig>, verbose: bool) {
    let mut log_config = resolved
        .and_then(|r| config_bridge::to_log_config(&r.config).ok())
        .unwrap_or_else(|| {
            stevedore_telemetry::LogConfig::new("warn")
                .with_format(stevedore_telemetry::LogFormat::Compact)
        });
    if verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = stevedore_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}
