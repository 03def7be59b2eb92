//! bach-statetest binary
//!
//! Runs the built-in scenario suite and any JSON fixtures on the selected
//! forks. Exits non-zero if any scenario fails.

mod cli;

use anyhow::{Context, Result};
use bach_harness::{fixture, scenarios, HarnessConfig, Runner};
use cli::Cli;
use std::fs::File;
use std::io::BufWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let mut suite = Vec::new();
    if config.builtin {
        suite.extend(scenarios::builtin());
    }
    for path in &config.fixtures {
        let loaded = fixture::load_file(path)
            .with_context(|| format!("loading fixture {}", path.display()))?;
        suite.extend(loaded);
    }
    tracing::info!(scenarios = suite.len(), forks = config.forks.len(), "starting run");

    let summary = Runner::new(&config).run(&suite)?;
    summary.stats.print_summary();

    if let Some(path) = &cli.report {
        let file = File::create(path)
            .with_context(|| format!("creating report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary.reports)?;
    }

    if !summary.stats.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
