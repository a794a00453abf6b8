// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Portal Node
//!
//! Entry point for the `portal-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and replays scenario scripts against a
//! fresh tranche portal.
//!
//! The binary supports three subcommands:
//!
//! - `run`:     replay a script and print the JSON report
//! - `init`:    write a default portal configuration
//! - `version`: print build version information

mod cli;
mod logging;
mod metrics;
mod script;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use tracing::{info, warn};

use portal_protocol::config::PortalConfig;
use portal_protocol::identity::Address;

use cli::{Commands, InitArgs, PortalNodeCli, RunArgs};
use metrics::RunMetrics;
use script::{RunReport, Runner, Script};

fn main() -> Result<()> {
    let cli = PortalNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Init(args) => init(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Replays the script and prints the report (and metrics) to stdout.
fn run(args: RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format)?;

    let output = execute(&args)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output.report).context("failed to render report")?
    );
    if let Some(text) = &output.metrics {
        print!("{text}");
    }

    let summary = &output.report.summary;
    if !summary.all_hold() {
        warn!(checks = ?summary.checks, "ledger invariants violated");
    }
    if args.strict {
        if output.report.failed > 0 {
            bail!("{} step(s) failed", output.report.failed);
        }
        if !summary.all_hold() {
            bail!("ledger invariants violated");
        }
    }
    Ok(())
}

/// Everything a run produces.
struct RunOutput {
    report: RunReport,
    metrics: Option<String>,
}

fn execute(args: &RunArgs) -> Result<RunOutput> {
    let raw = fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let script = Script::from_json_str(&raw)
        .with_context(|| format!("failed to load script {}", args.script.display()))?;

    let config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config = PortalConfig::from_json_str(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?;
            Some(config)
        }
        None => None,
    };

    let metrics = RunMetrics::new().context("failed to register metrics")?;
    let mut runner = Runner::new(&script, config)?;

    info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        "replaying scenario"
    );
    let steps = runner.run(&script.steps, &metrics);
    let report = runner.report(steps)?;
    info!(
        failed = report.failed,
        height = report.summary.height,
        total_assets = report.summary.total_assets,
        total_supply = report.summary.total_supply,
        "scenario complete"
    );

    if let Some(path) = &args.state_out {
        fs::write(path, runner.snapshot()?)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!(path = %path.display(), "ledger snapshot written");
    }

    let metrics = if args.metrics {
        Some(metrics.encode().context("failed to encode metrics")?)
    } else {
        None
    };

    Ok(RunOutput { report, metrics })
}

/// Writes a default configuration file.
fn init(args: InitArgs) -> Result<()> {
    let config = write_default_config(&args)?;
    println!(
        "wrote portal configuration to {} (asset {}, cliff {})",
        args.out.display(),
        config.asset,
        config.cliff
    );
    Ok(())
}

fn write_default_config(args: &InitArgs) -> Result<PortalConfig> {
    if args.out.exists() && !args.force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            args.out.display()
        );
    }

    let config = PortalConfig::new(args.cliff, Address::from_label(&args.symbol));
    config.validate().context("invalid configuration")?;
    let json = config.to_json_pretty()?;
    fs::write(&args.out, json)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    Ok(config)
}

/// Prints version information to stdout.
fn print_version() {
    println!("portal-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", portal_protocol::config::PROTOCOL_VERSION);
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
