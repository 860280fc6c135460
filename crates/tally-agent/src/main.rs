//! # tally-agent
//!
//! Binary entry point for the tally counter engine. Two modes:
//!
//! - `--check` validates the settings file and exits, surfacing
//!   configuration errors before any scheduler exists.
//! - `--scenario <file>` replays a scripted scenario against the in-memory
//!   directory and prints the final counter names — the end-to-end harness
//!   for the engine. A live deployment embeds `tally-engine` behind a real
//!   `Directory` implementation instead.

#![deny(unsafe_code)]

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tally_core::ids::{CounterId, GroupId};
use tally_engine::Engine;
use tally_settings::TallySettings;
use tracing::info;

use crate::scenario::Scenario;

/// Tally counter engine.
#[derive(Parser, Debug)]
#[command(name = "tally-agent", about = "Keeps counter labels in sync with group membership")]
struct Cli {
    /// Path to the settings file (default: ~/.tally/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Replay a scenario file against the in-memory directory.
    #[arg(long)]
    scenario: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => tally_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => tally_settings::load_settings().context("failed to load settings")?,
    };
    settings.validate().context("invalid configuration")?;

    if cli.check {
        println!(
            "configuration ok: {} mapping(s), sweep every {}s, {} concurrent, {}ms timeout",
            settings.mappings.len(),
            settings.scheduler.sweep_interval_secs,
            settings.scheduler.max_concurrent,
            settings.scheduler.call_timeout_ms,
        );
        return Ok(());
    }

    let Some(scenario_path) = &cli.scenario else {
        bail!(
            "nothing to do: pass --check to validate configuration, or \
             --scenario <file> to replay against the in-memory directory"
        );
    };

    let scenario = Scenario::load(scenario_path)?;
    replay(&settings, &scenario).await;
    Ok(())
}

/// Run the engine over a seeded in-memory directory and print the result.
async fn replay(settings: &TallySettings, scenario: &Scenario) {
    let dir = Arc::new(scenario.seed());
    let events = dir.subscribe();
    let engine = Engine::start(dir.clone(), settings, events);
    engine.scheduler().wait_idle().await;

    info!(steps = scenario.script.len(), "replaying scenario");
    for step in &scenario.script {
        if step.after_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
        }
        step.action.apply(&dir);
    }

    // Let the dispatcher drain the event stream, then wait out the passes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.scheduler().wait_idle().await;

    for mapping in &settings.mappings {
        let group = GroupId::from(mapping.group_id.as_str());
        let counter = CounterId::from(mapping.counter_id.as_str());
        match dir.counter_name(&counter) {
            Some(name) => println!("{group} -> {name}"),
            None => println!("{group} -> (counter {counter} not found)"),
        }
    }

    engine.shutdown(Some(Duration::from_secs(5))).await;
}
