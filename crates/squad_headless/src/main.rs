//! Headless squad simulation runner.
//!
//! # Usage
//!
//! ```bash
//! # Run one scenario, JSON summary on stdout
//! squad_headless run --scenario skirmish.ron --ticks 1200 --seed 7
//!
//! # Sweep seeds
//! squad_headless batch --scenario skirmish.ron --count 200 --output results/batch.json
//!
//! # Verify that one seed always produces the same final hash
//! squad_headless verify --scenario skirmish.ron --seed 12345 --runs 5
//!
//! # Validate an archetype
//! squad_headless validate --config troop.ron
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use squad_core::data::AgentConfig;
use squad_headless::{
    batch::{run_batch, BatchConfig},
    runner::{run_scenario, RunOptions},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "squad_headless")]
#[command(about = "Headless squad simulation runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario once and print a JSON summary
    Run {
        /// Scenario file (RON); the built-in skirmish when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Tick limit (overrides the scenario)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Random seed (overrides the scenario)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a scenario across consecutive seeds
    Batch {
        /// Scenario file (RON); the built-in skirmish when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "16")]
        count: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit (overrides the scenario)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Write full results here instead of printing the summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file (RON); the built-in skirmish when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick limit (overrides the scenario)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Parse and validate an agent archetype
    Validate {
        /// Archetype file (RON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            seed,
        } => cmd_run(scenario.as_deref(), RunOptions { ticks, seed }),
        Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            ticks,
            output,
        } => cmd_batch(
            scenario.as_deref(),
            BatchConfig {
                count,
                seed_start: seed,
                ticks,
                parallel,
            },
            output.as_deref(),
        ),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(scenario.as_deref(), seed, runs, ticks),
        Commands::Validate { config } => cmd_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<&Path>) -> Result<Scenario, String> {
    match path {
        Some(path) => Scenario::load(path).map_err(|e| e.to_string()),
        None => {
            info!("No scenario given, using the built-in skirmish");
            Ok(Scenario::skirmish())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

/// Run a scenario once
fn cmd_run(scenario: Option<&Path>, options: RunOptions) -> Result<(), String> {
    let scenario = load_scenario(scenario)?;
    let summary = run_scenario(&scenario, options).map_err(|e| e.to_string())?;
    print_json(&summary)
}

/// Sweep seeds
fn cmd_batch(
    scenario: Option<&Path>,
    config: BatchConfig,
    output: Option<&Path>,
) -> Result<(), String> {
    let scenario = load_scenario(scenario)?;
    let results = run_batch(&scenario, config);
    match output {
        Some(path) => {
            results
                .save(path)
                .map_err(|e| format!("Failed to save results: {e}"))?;
            info!("Results saved to {}", path.display());
            Ok(())
        }
        None => print_json(&results.summary),
    }
}

/// Same seed, several runs, one hash
fn cmd_verify(
    scenario: Option<&Path>,
    seed: u64,
    runs: u32,
    ticks: Option<u64>,
) -> Result<(), String> {
    let scenario = load_scenario(scenario)?;
    let options = RunOptions {
        ticks,
        seed: Some(seed),
    };

    let mut hashes = Vec::with_capacity(runs as usize);
    for i in 0..runs {
        let summary = run_scenario(&scenario, options).map_err(|e| e.to_string())?;
        info!("Run {}: hash {:016x}", i + 1, summary.final_state_hash);
        hashes.push(summary.final_state_hash);
    }

    if hashes.windows(2).all(|w| w[0] == w[1]) {
        info!("Determinism verified: {} identical runs", hashes.len());
        Ok(())
    } else {
        Err(format!("Determinism check failed: hashes differ {hashes:016x?}"))
    }
}

/// Parse and validate an archetype
fn cmd_validate(path: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let source = path.display().to_string();
    let config = AgentConfig::from_ron(&source, &text).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    info!(
        "{}: archetype '{}' is valid ({} behaviors)",
        source,
        config.name,
        config.behaviors.len()
    );
    Ok(())
}
