//! Log setup for `portal-node run`.
//!
//! Step and ledger events go to stderr, leaving stdout to the run report
//! and the metrics dump. `RUST_LOG` replaces [`DEFAULT_FILTER`] when set.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Node and portal events at info, protocol primitives at warn.
pub const DEFAULT_FILTER: &str = "portal_node=info,portal_contracts=info,portal_protocol=warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One line per event with its source location, for reading a replay.
    Pretty,
    /// JSON lines, for diffing two replays or shipping them elsewhere.
    Json,
}

fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the process-wide subscriber for a replay.
pub fn init_logging(fallback: &str, format: LogFormat) -> Result<()> {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter(fallback));

    match format {
        LogFormat::Pretty => registry
            .with(layer.with_file(true).with_line_number(true))
            .try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
    .context("a tracing subscriber is already installed")?;

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
