//! # CLI Interface
//!
//! Defines the command-line argument structure for `portal-node` using
//! `clap` derive. Supports three subcommands: `run`, `init` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Tranche portal scenario runner.
///
/// Builds a fresh portal over an in-memory voting token, replays a JSON
/// script of operations against it, and reports per-step outcomes together
/// with the final ledger state and invariant checks.
#[derive(Parser, Debug)]
#[command(
    name = "portal-node",
    about = "Tranche portal scenario runner",
    version,
    propagate_version = true
)]
pub struct PortalNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the portal node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario script against a fresh ledger.
    Run(RunArgs),
    /// Write a default portal configuration file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the scenario script (JSON).
    #[arg(long, short = 's', env = "PORTAL_SCRIPT")]
    pub script: PathBuf,

    /// Path to a portal configuration file (JSON).
    ///
    /// Overrides the settings embedded in the script. Its asset address must
    /// match the script's token.
    #[arg(long, short = 'c', env = "PORTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, env = "PORTAL_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Write the final ledger snapshot (JSON) to this file.
    #[arg(long)]
    pub state_out: Option<PathBuf>,

    /// Print Prometheus metrics in text format after the report.
    #[arg(long)]
    pub metrics: bool,

    /// Exit with an error if any step failed.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the configuration.
    #[arg(long, short = 'o', default_value = "portal.json")]
    pub out: PathBuf,

    /// Maturity height.
    #[arg(long, default_value_t = 100)]
    pub cliff: u64,

    /// Symbol of the base asset; its address is derived from it.
    #[arg(long, default_value = "NOFEE")]
    pub symbol: String,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
