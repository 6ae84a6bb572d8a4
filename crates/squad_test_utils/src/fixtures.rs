//! Test fixtures and helpers.
//!
//! Stock archetypes and pre-built scenarios for consistent testing.

use fixed::types::I32F32;
use squad_core::agent::AgentSpawn;
use squad_core::components::{AgentId, Faction, SquadId};
use squad_core::data::{AgentConfig, ConfigId, ControllerPolicy, SimulationSettings};
use squad_core::formation::FormationType;
use squad_core::math::Vec2Fixed;
use squad_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a vector from integer coordinates.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Stock melee troop: arrival, attack, separation and a rare fear check.
pub const TROOP_RON: &str = r#"
AgentConfig(
    name: "troop",
    stats: AgentStats(
        max_health: 100.0,
        attack_power: 10.0,
        attack_range: 2.0,
        attack_speed: 1.0,
        move_speed: 5.0,
        rotation_speed: 10.0,
        max_force: 10.0,
    ),
    behaviors: [
        BehaviorTemplate(params: Arrival(arrival_radius: 1.0, slowing_radius: 5.0)),
        BehaviorTemplate(params: Attack()),
        BehaviorTemplate(weight: 0.6, params: Separation(separation_radius: 2.0)),
        BehaviorTemplate(probability: 0.01, params: Fear(duration: 2.0, hesitation_chance: 0.7)),
    ],
)
"#;

/// Stock raider: lighter, faster, no fear.
pub const RAIDER_RON: &str = r#"
AgentConfig(
    name: "raider",
    stats: AgentStats(
        max_health: 60.0,
        attack_power: 8.0,
        attack_range: 1.5,
        attack_speed: 1.25,
        move_speed: 6.0,
    ),
    behaviors: [
        BehaviorTemplate(params: Arrival(arrival_radius: 1.0, slowing_radius: 4.0)),
        BehaviorTemplate(params: Attack()),
        BehaviorTemplate(weight: 0.5, params: Separation(separation_radius: 1.5)),
    ],
)
"#;

/// The stock troop archetype.
///
/// # Panics
///
/// Panics if the embedded RON is malformed.
#[must_use]
pub fn troop_config() -> AgentConfig {
    AgentConfig::from_ron("troop", TROOP_RON).expect("stock troop RON is valid")
}

/// The stock raider archetype.
///
/// # Panics
///
/// Panics if the embedded RON is malformed.
#[must_use]
pub fn raider_config() -> AgentConfig {
    AgentConfig::from_ron("raider", RAIDER_RON).expect("stock raider RON is valid")
}

/// A simulation with both stock archetypes registered.
#[derive(Debug)]
pub struct Arena {
    /// The simulation.
    pub sim: Simulation,
    /// Stock troop archetype.
    pub troop: ConfigId,
    /// Stock raider archetype.
    pub raider: ConfigId,
}

impl Arena {
    /// Empty arena with the given seed.
    ///
    /// # Panics
    ///
    /// Panics if a stock archetype fails validation.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut sim = Simulation::with_settings(SimulationSettings::default().with_seed(seed));
        let troop = sim.register_config(troop_config()).expect("troop registers");
        let raider = sim.register_config(raider_config()).expect("raider registers");
        Self { sim, troop, raider }
    }

    /// Spawn a lone agent.
    ///
    /// # Panics
    ///
    /// Panics if the archetype is not registered.
    pub fn spawn(&mut self, config: ConfigId, faction: Faction, position: Vec2Fixed) -> AgentId {
        self.sim
            .spawn_agent(AgentSpawn::new(config, faction, position))
            .expect("fixture spawn")
    }

    /// Spawn an agent that never picks its own targets.
    ///
    /// # Panics
    ///
    /// Panics if the archetype is not registered.
    pub fn spawn_passive(&mut self, config: ConfigId, faction: Faction, position: Vec2Fixed) -> AgentId {
        self.sim
            .spawn_agent(
                AgentSpawn::new(config, faction, position).with_policy(ControllerPolicy::passive()),
            )
            .expect("fixture spawn")
    }

    /// Create a full squad.
    ///
    /// # Panics
    ///
    /// Panics if the squad cannot be created.
    pub fn squad(
        &mut self,
        config: ConfigId,
        faction: Faction,
        position: Vec2Fixed,
        formation: FormationType,
        count: usize,
    ) -> SquadId {
        self.sim
            .create_squad(position, formation, config, count, faction)
            .expect("fixture squad")
    }
}

/// Two full squads facing each other twelve units apart.
#[must_use]
pub fn skirmish(seed: u64) -> Simulation {
    let mut arena = Arena::new(seed);
    let (troop, raider) = (arena.troop, arena.raider);
    arena.squad(troop, Faction::Defenders, vec2(0, 0), FormationType::Square, 9);
    arena.squad(raider, Faction::Raiders, vec2(0, 12), FormationType::V, 9);
    arena.sim
}

/// A few free-roaming raiders around a defending squad.
#[must_use]
pub fn raid(seed: u64) -> Simulation {
    let mut arena = Arena::new(seed);
    let (troop, raider) = (arena.troop, arena.raider);
    arena.squad(troop, Faction::Defenders, vec2(0, 0), FormationType::Line, 6);
    for (x, y) in [(-15, 10), (0, 16), (15, 10), (20, -5)] {
        arena.spawn(raider, Faction::Raiders, vec2(x, y));
    }
    arena.sim
}
