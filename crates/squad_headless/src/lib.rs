//! Headless scenario runner for the squad simulation.
//!
//! Loads a RON [`Scenario`], drives the deterministic core without any
//! presentation layer and reports the outcome as JSON. Used for CI
//! determinism checks and for sweeping seeds when tuning archetypes.
//!
//! # Example
//!
//! ```bash
//! # Run a scenario and print the summary
//! cargo run -p squad_headless -- run --scenario scenarios/skirmish.ron
//!
//! # Sweep 100 seeds in parallel
//! cargo run -p squad_headless -- batch --scenario scenarios/skirmish.ron --count 100
//!
//! # Check an archetype file
//! cargo run -p squad_headless -- validate --config troop.ron
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults, BatchSummary};
pub use runner::{run_scenario, RunOptions, RunSummary};
pub use scenario::{Scenario, ScenarioError};
