//! # Squad Core
//!
//! Deterministic combat-AI and movement core for a squad tactical sim.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (one seeded stream owned by the simulation)
//! - No floating-point math (uses fixed-point)
//!
//! Presentation is reached through the [`presentation::PresentationSink`]
//! trait, so the same simulation drives a game client, a headless runner
//! or a test recorder.
//!
//! ## Crate Structure
//!
//! - [`math`] - Fixed-point vectors and deterministic trigonometry
//! - [`kinematics`] - Force to velocity, position and facing
//! - [`steering`] - Weighted force generators (Seek, Flee, Arrival, ...)
//! - [`fsm`] - Troop state machine
//! - [`targeting`] - Nearest-hostile search and approach directions
//! - [`squad`] / [`formation`] - Squads, slot layouts and reflow
//! - [`placement`] - Macro placement grid
//! - [`scheduler`] - Deferred continuations (attack hits, despawns, reflows)
//! - [`simulation`] - The orchestrator and tick loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod components;
pub mod data;
pub mod error;
pub mod formation;
pub mod fsm;
pub mod kinematics;
pub mod math;
pub mod placement;
pub mod presentation;
pub mod rng;
pub mod scheduler;
pub mod simulation;
pub mod snapshot;
pub mod spatial;
pub mod squad;
pub mod steering;
pub mod targeting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentSpawn};
    pub use crate::components::*;
    pub use crate::data::{
        AgentConfig, AgentStats, BehaviorKind, BehaviorParams, BehaviorTemplate, ConfigId,
        ControllerPolicy, SimulationSettings, TargetingStrategy,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::formation::FormationType;
    pub use crate::fsm::TroopState;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::placement::{GridCoord, PlacementGrid};
    pub use crate::presentation::{NullSink, PresentationSink};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::spatial::{LinearScan, SpatialHash, SpatialQuery};
}
