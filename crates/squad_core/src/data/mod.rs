//! Data structures for agent and simulation configuration.
//!
//! Pure data types designed to be deserialized from RON. This module
//! contains no IO: callers hand in text and get validated records back.

mod agent_config;
mod policy;
mod registry;
mod settings;

pub use agent_config::{AgentConfig, AgentStats, BehaviorKind, BehaviorParams, BehaviorTemplate};
pub use policy::{ControllerPolicy, TargetingStrategy};
pub use registry::{ConfigId, ConfigRegistry};
pub use settings::SimulationSettings;
