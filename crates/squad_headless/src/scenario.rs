//! Scenario loading and configuration.
//!
//! Scenarios define the initial world for headless runs: settings, an
//! optional placement grid, archetypes, squads, lone agents and a script of
//! timed commands.
//!
//! ```ron
//! Scenario(
//!     name: "Bridge Hold",
//!     ticks: 600,
//!     configs: [AgentConfig(name: "troop")],
//!     squads: [
//!         SquadSetup(config: "troop", faction: Defenders, position: (0.0, 0.0), count: 9),
//!     ],
//!     commands: [
//!         ScriptedCommand(tick: 40, command: MoveSquad(squad: 0, to: (10.0, 0.0))),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use squad_core::agent::AgentSpawn;
use squad_core::components::{Faction, SquadId};
use squad_core::data::{AgentConfig, ControllerPolicy, SimulationSettings};
use squad_core::error::GameError;
use squad_core::formation::FormationType;
use squad_core::math::{fixed_decimal, vec2_decimal, Fixed, Vec2Fixed};
use squad_core::placement::PlacementGrid;
use squad_core::simulation::Simulation;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A squad or agent names an archetype the scenario does not define.
    #[error("Unknown archetype '{0}'")]
    UnknownConfig(String),
    /// A command refers to a squad index past the end of `squads`.
    #[error("Command at tick {tick} refers to missing squad {index}")]
    UnknownSquad {
        /// Tick of the offending command.
        tick: u64,
        /// Squad index used.
        index: usize,
    },
    /// The simulation rejected part of the setup.
    #[error("Invalid scenario: {0}")]
    Simulation(#[from] GameError),
}

/// Placement grid setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSetup {
    /// Centre of the play area.
    #[serde(with = "vec2_decimal")]
    pub center: Vec2Fixed,
    /// Play radius.
    #[serde(with = "fixed_decimal")]
    pub radius: Fixed,
    /// Cells across.
    pub width: u32,
    /// Cells deep.
    pub height: u32,
}

/// A squad to create at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadSetup {
    /// Archetype name.
    pub config: String,
    /// Side.
    pub faction: Faction,
    /// Anchor position.
    #[serde(with = "vec2_decimal")]
    pub position: Vec2Fixed,
    /// Layout.
    #[serde(default)]
    pub formation: FormationType,
    /// Members to spawn.
    pub count: usize,
}

/// A lone agent to spawn at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSetup {
    /// Archetype name.
    pub config: String,
    /// Side.
    pub faction: Faction,
    /// Spawn position.
    #[serde(with = "vec2_decimal")]
    pub position: Vec2Fixed,
    /// Policy override; the faction default otherwise.
    #[serde(default)]
    pub policy: Option<ControllerPolicy>,
}

/// A command the script issues. Squads are referenced by their index in
/// [`Scenario::squads`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioCommand {
    /// Move a squad's formation.
    MoveSquad {
        /// Squad index.
        squad: usize,
        /// Destination.
        #[serde(with = "vec2_decimal")]
        to: Vec2Fixed,
    },
    /// Change a squad's layout.
    SetFormation {
        /// Squad index.
        squad: usize,
        /// New layout.
        formation: FormationType,
    },
    /// Put every member of a squad on defence.
    DefendSquad {
        /// Squad index.
        squad: usize,
    },
}

impl ScenarioCommand {
    const fn squad(&self) -> usize {
        match self {
            Self::MoveSquad { squad, .. }
            | Self::SetFormation { squad, .. }
            | Self::DefendSquad { squad } => *squad,
        }
    }
}

/// A command with the tick it fires before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedCommand {
    /// Tick number.
    pub tick: u64,
    /// What to do.
    pub command: ScenarioCommand,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ticks to run unless overridden.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// End the run as soon as one side has no living agents.
    #[serde(default = "default_true")]
    pub stop_on_elimination: bool,
    /// Simulation tunables (seed included).
    #[serde(default)]
    pub settings: SimulationSettings,
    /// Placement grid for squad moves.
    #[serde(default)]
    pub grid: Option<GridSetup>,
    /// Archetypes, referenced by name.
    pub configs: Vec<AgentConfig>,
    /// Squads created at start, in order.
    #[serde(default)]
    pub squads: Vec<SquadSetup>,
    /// Lone agents spawned after the squads.
    #[serde(default)]
    pub agents: Vec<AgentSetup>,
    /// Timed commands.
    #[serde(default)]
    pub commands: Vec<ScriptedCommand>,
}

const fn default_ticks() -> u64 {
    600
}

const fn default_true() -> bool {
    true
}

/// A built scenario, ready to tick.
#[derive(Debug)]
pub struct Prepared {
    /// The simulation.
    pub sim: Simulation,
    /// Squad ids by scenario index.
    pub squads: Vec<SquadId>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        info!(name = %scenario.name, path = %path.display(), "Scenario loaded");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A stock skirmish: a square of troops against a wedge of raiders.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut troop = AgentConfig::new("troop");
        troop.behaviors = stock_behaviors();
        let mut raider = AgentConfig::new("raider");
        raider.stats.max_health = Fixed::from_num(60);
        raider.stats.move_speed = Fixed::from_num(6);
        raider.behaviors = stock_behaviors();

        Self {
            name: "Skirmish".to_string(),
            description: "Square of troops against a raider wedge".to_string(),
            ticks: 1200,
            stop_on_elimination: true,
            settings: SimulationSettings::default(),
            grid: None,
            configs: vec![troop, raider],
            squads: vec![
                SquadSetup {
                    config: "troop".to_string(),
                    faction: Faction::Defenders,
                    position: Vec2Fixed::ZERO,
                    formation: FormationType::Square,
                    count: 9,
                },
                SquadSetup {
                    config: "raider".to_string(),
                    faction: Faction::Raiders,
                    position: Vec2Fixed::from_ints(0, 14),
                    formation: FormationType::V,
                    count: 9,
                },
            ],
            agents: Vec::new(),
            commands: vec![ScriptedCommand {
                tick: 20,
                command: ScenarioCommand::MoveSquad {
                    squad: 0,
                    to: Vec2Fixed::from_ints(0, 6),
                },
            }],
        }
    }

    /// Check cross references without building anything.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let known = |name: &str| self.configs.iter().any(|c| c.name == name);
        for config in &self.configs {
            config.validate()?;
        }
        for name in self
            .squads
            .iter()
            .map(|s| &s.config)
            .chain(self.agents.iter().map(|a| &a.config))
        {
            if !known(name) {
                return Err(ScenarioError::UnknownConfig(name.clone()));
            }
        }
        for scripted in &self.commands {
            let index = scripted.command.squad();
            if index >= self.squads.len() {
                return Err(ScenarioError::UnknownSquad {
                    tick: scripted.tick,
                    index,
                });
            }
        }
        Ok(())
    }

    /// Build the simulation, optionally overriding the seed.
    pub fn build(&self, seed: Option<u64>) -> Result<Prepared, ScenarioError> {
        self.validate()?;

        let mut settings = self.settings.clone();
        if let Some(seed) = seed {
            settings.seed = seed;
        }
        let mut sim = Simulation::with_settings(settings);
        if let Some(grid) = &self.grid {
            sim = sim.with_grid(PlacementGrid::new(
                grid.center,
                grid.radius,
                grid.width,
                grid.height,
            )?);
        }

        for config in &self.configs {
            sim.register_config(config.clone())?;
        }
        let lookup = |sim: &Simulation, name: &str| {
            sim.configs()
                .id_of(name)
                .ok_or_else(|| ScenarioError::UnknownConfig(name.to_string()))
        };

        let mut squads = Vec::with_capacity(self.squads.len());
        for setup in &self.squads {
            let config = lookup(&sim, &setup.config)?;
            let id = sim.create_squad(
                setup.position,
                setup.formation,
                config,
                setup.count,
                setup.faction,
            )?;
            squads.push(id);
        }
        for setup in &self.agents {
            let config = lookup(&sim, &setup.config)?;
            let mut spawn = AgentSpawn::new(config, setup.faction, setup.position);
            spawn.policy = setup.policy;
            sim.spawn_agent(spawn)?;
        }

        debug!(
            name = %self.name,
            squads = squads.len(),
            agents = sim.agents().len(),
            "Scenario built"
        );
        Ok(Prepared { sim, squads })
    }
}

fn stock_behaviors() -> Vec<squad_core::data::BehaviorTemplate> {
    use squad_core::data::{BehaviorParams, BehaviorTemplate};
    vec![
        BehaviorTemplate::new(BehaviorParams::arrival()),
        BehaviorTemplate::new(BehaviorParams::attack()),
        BehaviorTemplate::new(BehaviorParams::separation()).with_weight(Fixed::from_num(0.6)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        Scenario(
            name: "Minimal",
            configs: [AgentConfig(name: "troop")],
            squads: [
                SquadSetup(config: "troop", faction: Defenders, position: (0.0, 0.0), count: 3),
            ],
            agents: [
                AgentSetup(config: "troop", faction: Raiders, position: (30.0, 0.5)),
            ],
            commands: [
                ScriptedCommand(tick: 5, command: SetFormation(squad: 0, formation: Line)),
            ],
        )
    "#;

    #[test]
    fn test_parse_minimal_scenario_uses_defaults() {
        let scenario = Scenario::from_ron_str(MINIMAL).unwrap();
        assert_eq!(scenario.ticks, 600);
        assert!(scenario.stop_on_elimination);
        assert_eq!(scenario.squads[0].formation, FormationType::Square);
        assert_eq!(
            scenario.agents[0].position,
            Vec2Fixed::new(Fixed::from_num(30), Fixed::from_num(0.5))
        );
    }

    #[test]
    fn test_build_creates_squads_and_agents() {
        let prepared = Scenario::from_ron_str(MINIMAL).unwrap().build(Some(4)).unwrap();
        assert_eq!(prepared.squads.len(), 1);
        assert_eq!(prepared.sim.agents().len(), 4);
        assert_eq!(prepared.sim.settings().seed, 4);
    }

    #[test]
    fn test_unknown_archetype_is_reported() {
        let mut scenario = Scenario::from_ron_str(MINIMAL).unwrap();
        scenario.agents[0].config = "ghost".to_string();
        assert!(matches!(
            scenario.build(None),
            Err(ScenarioError::UnknownConfig(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_command_for_missing_squad_is_reported() {
        let mut scenario = Scenario::from_ron_str(MINIMAL).unwrap();
        scenario.commands[0].command = ScenarioCommand::DefendSquad { squad: 3 };
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UnknownSquad { tick: 5, index: 3 })
        ));
    }

    #[test]
    fn test_oversized_squad_is_rejected() {
        let mut scenario = Scenario::from_ron_str(MINIMAL).unwrap();
        scenario.squads[0].count = 12;
        assert!(matches!(
            scenario.build(None),
            Err(ScenarioError::Simulation(GameError::CapacityExceeded { .. }))
        ));
    }

    #[test]
    fn test_stock_skirmish_is_valid() {
        assert!(Scenario::skirmish().validate().is_ok());
    }
}
