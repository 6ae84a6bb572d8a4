//! Batch runner for seed sweeps.
//!
//! Runs one scenario across consecutive seeds in parallel using rayon and
//! aggregates the outcomes.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{run_scenario, RunOptions, RunSummary};
use crate::scenario::Scenario;

/// Batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of runs.
    pub count: u32,
    /// Seed of the first run; run `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Tick limit override.
    pub ticks: Option<u64>,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 16,
            seed_start: 0,
            ticks: None,
            parallel: 0,
        }
    }
}

/// Error during batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate over all successful runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Successful runs.
    pub runs: usize,
    /// Wins per faction.
    pub wins: BTreeMap<String, usize>,
    /// Runs with no single winner.
    pub draws: usize,
    /// Mean ticks per run.
    pub mean_ticks: f64,
    /// Mean deaths per run.
    pub mean_deaths: f64,
    /// Mean damage per run.
    pub mean_damage: f64,
}

impl BatchSummary {
    /// Aggregate run summaries.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(runs: &[RunSummary]) -> Self {
        let mut summary = Self {
            runs: runs.len(),
            ..Self::default()
        };
        if runs.is_empty() {
            return summary;
        }
        for run in runs {
            match &run.winner {
                Some(w) => *summary.wins.entry(w.clone()).or_default() += 1,
                None => summary.draws += 1,
            }
        }
        let n = runs.len() as f64;
        summary.mean_ticks = runs.iter().map(|r| r.ticks as f64).sum::<f64>() / n;
        summary.mean_deaths = runs.iter().map(|r| r.deaths as f64).sum::<f64>() / n;
        summary.mean_damage = runs.iter().map(|r| r.total_damage).sum::<f64>() / n;
        summary
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual runs, in seed order.
    pub runs: Vec<RunSummary>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run a scenario across a range of seeds.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} runs of '{}'",
        config.count, scenario.name
    );

    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunSummary, BatchError>> = (0..config.count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            run_scenario(
                scenario,
                RunOptions {
                    ticks: config.ticks,
                    seed: Some(seed),
                },
            )
            .map_err(|e| {
                warn!("Run with seed {} failed: {}", seed, e);
                BatchError {
                    seed,
                    message: e.to_string(),
                }
            })
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunSummary> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} runs in {:.1}s ({} errors)",
        runs.len(),
        duration_seconds,
        errors.len()
    );

    BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    }
}
