//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and owns every agent, squad,
//! the placement grid, the continuation scheduler and the random source.
//! It is the orchestrator surface: spawning, orders and squad commands all
//! go through [`Simulation`].
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - One seeded random source, drawn in a fixed order
//! - Consistent iteration order (sorted agent and squad IDs)
//! - Same seed and commands always produce the same [`Simulation::state_hash`]
//!
//! # Example
//!
//! ```
//! use squad_core::agent::AgentSpawn;
//! use squad_core::components::Faction;
//! use squad_core::data::{AgentConfig, BehaviorParams, BehaviorTemplate};
//! use squad_core::math::Vec2Fixed;
//! use squad_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new();
//! let mut config = AgentConfig::new("walker");
//! config.behaviors.push(BehaviorTemplate::new(BehaviorParams::arrival()));
//! let config = sim.register_config(config).unwrap();
//!
//! let agent = sim
//!     .spawn_agent(AgentSpawn::new(config, Faction::Defenders, Vec2Fixed::ZERO))
//!     .unwrap();
//! sim.order_move(agent, Vec2Fixed::from_ints(10, 0)).unwrap();
//! sim.tick();
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::agent::{Agent, AgentSpawn};
use crate::components::{AgentId, Faction, SquadId, SquadMembership};
use crate::data::{AgentConfig, BehaviorKind, ConfigId, ConfigRegistry, SimulationSettings};
use crate::error::{GameError, Result};
use crate::formation::FormationType;
use crate::fsm::{self, change_state, FsmWorld, StateTransition, TroopState};
use crate::kinematics::integrate;
use crate::math::{fixed_serde, yaw_of, Fixed, Vec2Fixed};
use crate::placement::PlacementGrid;
use crate::presentation::{NullSink, PresentationSink};
use crate::rng::SimRng;
use crate::scheduler::{Continuation, Scheduler};
use crate::snapshot::{AgentSnapshot, SquadSnapshot, WorldSnapshot};
use crate::spatial::{LinearScan, SpatialEntry, SpatialQuery};
use crate::squad::{AnchorPacing, Squad};
use crate::steering::{self, SteeringContext};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Duration of one tick in seconds.
#[must_use]
pub fn tick_delta() -> Fixed {
    Fixed::ONE / Fixed::from_num(TICK_RATE)
}

/// Damage landed on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Agent whose attack landed; `None` for external damage.
    pub attacker: Option<AgentId>,
    /// Agent that took the damage.
    pub target: AgentId,
    /// Damage applied.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Target health afterwards.
    #[serde(with = "fixed_serde")]
    pub remaining: Fixed,
}

/// An attack windup that started this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Attacking agent.
    pub attacker: AgentId,
    /// Target at windup start.
    pub target: AgentId,
    /// When the hit is due.
    #[serde(with = "fixed_serde")]
    pub lands_at: Fixed,
}

/// Events generated during a simulation tick.
///
/// External commands issued between ticks (orders, direct damage) report
/// their events with the next tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Damage applications.
    pub damage_events: Vec<DamageEvent>,
    /// Attack windups started.
    pub attacks: Vec<AttackEvent>,
    /// Agents that died.
    pub deaths: Vec<AgentId>,
    /// Dead agents removed after their grace period.
    pub despawned: Vec<AgentId>,
    /// State machine transitions.
    pub transitions: Vec<StateTransition>,
}

impl TickEvents {
    /// Check if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damage_events.is_empty()
            && self.attacks.is_empty()
            && self.deaths.is_empty()
            && self.despawned.is_empty()
            && self.transitions.is_empty()
    }
}

/// Storage for all agents in the simulation.
///
/// Uses a `HashMap` for O(1) lookup by ID, with deterministic iteration via
/// sorted keys when processing a tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStorage {
    agents: HashMap<AgentId, Agent>,
    next_id: AgentId,
}

impl AgentStorage {
    /// Create empty agent storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Get an agent by ID.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Check if an agent exists (alive or awaiting removal).
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Number of agents, including dead ones awaiting removal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Get sorted agent IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all agents (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }
}

fn default_spatial() -> Box<dyn SpatialQuery> {
    Box::new(LinearScan::new())
}

fn default_sink() -> Box<dyn PresentationSink> {
    Box::new(NullSink)
}

/// The squad combat simulation.
///
/// # Tick Order
///
/// 1. **Continuations** - fire every scheduled effect whose deadline passed
/// 2. **Squads** - advance formation anchors, start reflows on arrival
/// 3. **Spatial index** - rebuild from living agents
/// 4. **Agents** (sorted by ID) - state machine, then steering, then
///    kinematic integration
#[derive(Debug, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    settings: SimulationSettings,
    configs: ConfigRegistry,
    agents: AgentStorage,
    squads: HashMap<SquadId, Squad>,
    next_squad_id: SquadId,
    grid: Option<PlacementGrid>,
    scheduler: Scheduler,
    rng: SimRng,
    #[serde(skip, default = "default_spatial")]
    spatial: Box<dyn SpatialQuery>,
    #[serde(skip, default = "default_sink")]
    sink: Box<dyn PresentationSink>,
    #[serde(skip)]
    pending: TickEvents,
}

impl Simulation {
    /// Create an empty simulation with default settings.
    ///
    /// ```
    /// use squad_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new();
    /// assert_eq!(sim.get_tick(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(SimulationSettings::default())
    }

    /// Create an empty simulation.
    #[must_use]
    pub fn with_settings(settings: SimulationSettings) -> Self {
        Self {
            tick: 0,
            rng: SimRng::new(settings.seed),
            settings,
            configs: ConfigRegistry::new(),
            agents: AgentStorage::new(),
            squads: HashMap::new(),
            next_squad_id: 1,
            grid: None,
            scheduler: Scheduler::new(),
            spatial: default_spatial(),
            sink: default_sink(),
            pending: TickEvents::default(),
        }
    }

    /// Replace the spatial query provider.
    #[must_use]
    pub fn with_spatial_query(mut self, spatial: Box<dyn SpatialQuery>) -> Self {
        self.spatial = spatial;
        self
    }

    /// Replace the presentation sink used by [`tick`](Self::tick) and by
    /// commands.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn PresentationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the presentation sink in place.
    pub fn set_sink(&mut self, sink: Box<dyn PresentationSink>) {
        self.sink = sink;
    }

    /// Install a placement grid for squad destinations.
    #[must_use]
    pub fn with_grid(mut self, grid: PlacementGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds at the current tick.
    #[must_use]
    pub fn now(&self) -> Fixed {
        Fixed::from_num(self.tick) / Fixed::from_num(TICK_RATE)
    }

    /// Simulation settings.
    #[must_use]
    pub const fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Registered archetypes.
    #[must_use]
    pub const fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    /// Agent storage.
    #[must_use]
    pub const fn agents(&self) -> &AgentStorage {
        &self.agents
    }

    /// Get an agent by ID.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Get a squad by ID.
    #[must_use]
    pub fn squad(&self, id: SquadId) -> Option<&Squad> {
        self.squads.get(&id)
    }

    /// Squad IDs in ascending order.
    #[must_use]
    pub fn squad_ids(&self) -> Vec<SquadId> {
        let mut ids: Vec<_> = self.squads.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Placement grid, if installed.
    #[must_use]
    pub const fn grid(&self) -> Option<&PlacementGrid> {
        self.grid.as_ref()
    }

    /// Scheduled continuations.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of living agents of a faction.
    #[must_use]
    pub fn survivors(&self, faction: Faction) -> usize {
        self.agents
            .iter()
            .filter(|a| a.faction == faction && a.is_alive())
            .count()
    }

    fn with_own_sink<R>(&mut self, f: impl FnOnce(&mut Self, &mut dyn PresentationSink) -> R) -> R {
        let mut sink = std::mem::replace(&mut self.sink, default_sink());
        let result = f(self, sink.as_mut());
        self.sink = sink;
        result
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by one tick using the installed sink.
    pub fn tick(&mut self) -> TickEvents {
        self.with_own_sink(|sim, sink| sim.tick_with(sink))
    }

    /// Advance the simulation by one tick, presenting through `sink`.
    pub fn tick_with(&mut self, sink: &mut dyn PresentationSink) -> TickEvents {
        let mut events = std::mem::take(&mut self.pending);
        let now = self.now();

        // 1. Continuations
        while let Some(continuation) = self.scheduler.pop_due(now) {
            trace!(?continuation, now = %now, "Continuation fired");
            self.fire(continuation, sink, &mut events);
        }

        // 2. Squads
        self.update_squads();

        // 3. Spatial index over living agents
        let ids = self.agents.sorted_ids();
        let entries: Vec<SpatialEntry> = ids
            .iter()
            .filter_map(|id| self.agents.get(*id))
            .filter(|a| a.is_alive())
            .map(|a| SpatialEntry {
                id: a.id,
                faction: a.faction,
                position: a.position(),
            })
            .collect();
        let living: HashMap<AgentId, Vec2Fixed> =
            entries.iter().map(|e| (e.id, e.position)).collect();
        self.spatial.rebuild(&entries);

        // 4. Agents
        for id in ids {
            self.update_agent(id, now, &living, sink, &mut events);
        }

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn update_agent(
        &mut self,
        id: AgentId,
        now: Fixed,
        living: &HashMap<AgentId, Vec2Fixed>,
        sink: &mut dyn PresentationSink,
        events: &mut TickEvents,
    ) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if !agent.is_alive() {
            return;
        }

        let world = FsmWorld {
            now,
            spatial: self.spatial.as_ref(),
            living,
            settings: &self.settings,
        };
        if let Some(transition) = fsm::update(agent, &world, &mut self.rng, sink) {
            events.transitions.push(transition);
        }

        let state = agent.state();
        let ctx = SteeringContext {
            agent: id,
            faction: agent.faction,
            position: agent.position(),
            yaw: agent.kinematics.yaw,
            velocity: agent.kinematics.velocity,
            move_speed: agent.stats.move_speed,
            attack_range: agent.stats.attack_range,
            attack_cooldown: agent.stats.attack_cooldown(),
            target_agent: agent
                .target
                .and_then(|target| living.get(&target).map(|&p| (target, p))),
            target_position: fsm::resolve_target(agent, living),
            spatial: self.spatial.as_ref(),
            now,
        };
        let output = steering::evaluate(
            &mut agent.behaviors,
            &ctx,
            |kind| state.allows(kind),
            agent.stats.max_force,
            &mut self.rng,
        );

        if let Some(target) = output.effects.attack_started {
            let windup = sink
                .on_attack(id, target)
                .unwrap_or(self.settings.attack_windup);
            let lands_at = now + windup;
            self.scheduler.schedule(
                lands_at,
                Continuation::AttackHit {
                    attacker: id,
                    target,
                },
            );
            events.attacks.push(AttackEvent {
                attacker: id,
                target,
                lands_at,
            });
        }
        if let Some(hesitating) = output.effects.fear_started {
            sink.on_fear(id, hesitating);
        }

        let limits = agent.motion_limits();
        integrate(&mut agent.kinematics, limits, output.force, tick_delta());
    }

    fn update_squads(&mut self) {
        let pacing = AnchorPacing {
            speed: self.settings.anchor_speed,
            rotation_speed: self.settings.anchor_rotation_speed,
            tolerance: self.settings.movement_tolerance,
        };
        for id in self.squad_ids() {
            let arrived = self
                .squads
                .get_mut(&id)
                .is_some_and(|squad| squad.step_anchor(pacing, tick_delta()));
            if arrived {
                debug!(squad = id, "Formation anchor arrived");
                self.schedule_reflow(id);
            }
        }
    }

    fn fire(
        &mut self,
        continuation: Continuation,
        sink: &mut dyn PresentationSink,
        events: &mut TickEvents,
    ) {
        let now = self.now();
        match continuation {
            Continuation::AttackHit { attacker, target } => {
                let Some(agent) = self.agents.get_mut(attacker).filter(|a| a.is_alive()) else {
                    trace!(attacker, "Attack cancelled, attacker gone");
                    return;
                };
                if let Some(attack) = agent.behavior_mut(BehaviorKind::Attack) {
                    attack.finish_attack();
                }
                let power = agent.stats.attack_power;
                if !self.agents.get(target).is_some_and(Agent::is_alive) {
                    trace!(attacker, target, "Attack cancelled, target gone");
                    return;
                }
                self.damage(Some(attacker), target, power, sink, events);
            }

            Continuation::Despawn { agent } => {
                if self.agents.get(agent).is_some_and(|a| !a.is_alive()) {
                    self.agents.remove(agent);
                    events.despawned.push(agent);
                    debug!(agent, "Agent despawned");
                }
            }

            Continuation::BeginReflow { squad, generation } => {
                let Some(squad_ref) = self
                    .squads
                    .get(&squad)
                    .filter(|s| s.generation() == generation)
                else {
                    return;
                };
                let stagger = self.settings.member_stagger;
                let mut delay = Fixed::ZERO;
                for &agent in squad_ref.members() {
                    self.scheduler.schedule(
                        now + delay,
                        Continuation::AssignSlot {
                            squad,
                            generation,
                            agent,
                        },
                    );
                    delay += stagger;
                }
            }

            Continuation::AssignSlot {
                squad,
                generation,
                agent,
            } => {
                let destination = self
                    .squads
                    .get(&squad)
                    .filter(|s| s.generation() == generation)
                    .and_then(|s| s.slot_of(agent).and_then(|slot| s.slot_position(slot)));
                if let Some(destination) = destination {
                    self.send_to_slot(agent, destination, sink, events);
                }
            }
        }
    }

    /// Slot orders never pull an engaged member out of a fight.
    fn send_to_slot(
        &mut self,
        id: AgentId,
        destination: Vec2Fixed,
        sink: &mut dyn PresentationSink,
        events: &mut TickEvents,
    ) {
        let now = self.now();
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if matches!(
            agent.state(),
            TroopState::Attack | TroopState::Flee | TroopState::Dead
        ) {
            return;
        }
        agent.target = None;
        agent.target_point = Some(destination);
        if let Some(transition) = change_state(agent, TroopState::Move, now, sink) {
            events.transitions.push(transition);
        }
    }

    fn damage(
        &mut self,
        attacker: Option<AgentId>,
        target: AgentId,
        amount: Fixed,
        sink: &mut dyn PresentationSink,
        events: &mut TickEvents,
    ) -> bool {
        let Some(agent) = self.agents.get_mut(target).filter(|a| a.is_alive()) else {
            return false;
        };
        let died = agent.health.apply_damage(amount);
        let remaining = agent.health.current();
        sink.on_hit(target, remaining, agent.health.max());
        events.damage_events.push(DamageEvent {
            attacker,
            target,
            amount,
            remaining,
        });
        if died {
            self.die(target, sink, events);
        }
        died
    }

    fn die(&mut self, id: AgentId, sink: &mut dyn PresentationSink, events: &mut TickEvents) {
        let now = self.now();
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        let Some(transition) = change_state(agent, TroopState::Dead, now, sink) else {
            return;
        };
        events.transitions.push(transition);
        events.deaths.push(id);

        agent.health.set(Fixed::ZERO);
        agent.kinematics.velocity = Vec2Fixed::ZERO;
        agent.target = None;
        agent.target_point = None;
        let membership = agent.squad.take();

        let grace = sink.on_death(id).unwrap_or(self.settings.death_grace);
        self.scheduler
            .schedule(now + grace, Continuation::Despawn { agent: id });
        debug!(agent = id, "Agent died");

        if let Some(membership) = membership {
            self.detach(membership.squad, id);
        }
    }

    /// Drop `agent` from a squad's member list, resync slots and reflow.
    fn detach(&mut self, squad_id: SquadId, agent: AgentId) {
        let Some(squad) = self.squads.get_mut(&squad_id) else {
            return;
        };
        let Ok(moved) = squad.remove(agent) else {
            return;
        };
        for (member, slot) in moved {
            if let Some(m) = self.agents.get_mut(member) {
                m.squad = Some(SquadMembership {
                    squad: squad_id,
                    slot,
                });
            }
        }
        self.schedule_reflow(squad_id);
    }

    fn schedule_reflow(&mut self, squad_id: SquadId) {
        let deadline = self.now() + self.settings.settle_delay;
        let Some(squad) = self.squads.get_mut(&squad_id) else {
            return;
        };
        if squad.is_empty() {
            return;
        }
        let generation = squad.next_generation();
        self.scheduler.schedule(
            deadline,
            Continuation::BeginReflow {
                squad: squad_id,
                generation,
            },
        );
        debug!(squad = squad_id, generation, "Formation reflow scheduled");
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Validate and register an archetype.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the archetype is unusable.
    pub fn register_config(&mut self, config: AgentConfig) -> Result<ConfigId> {
        self.configs.register(config)
    }

    /// Spawn an agent from a registered archetype.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigurationMissing`] if the archetype is not
    /// registered.
    pub fn spawn_agent(&mut self, spawn: AgentSpawn) -> Result<AgentId> {
        let config = match self.configs.require(spawn.config) {
            Ok(config) => config,
            Err(e) => {
                error!(config = %spawn.config, "Cannot spawn agent without a configuration");
                return Err(e);
            }
        };
        let id = self.agents.allocate_id();
        let agent = Agent::new(id, &spawn, config, self.now());
        self.agents.insert(agent);
        debug!(agent = id, config = %spawn.config, faction = ?spawn.faction, "Agent spawned");
        Ok(id)
    }

    /// Remove an agent immediately, skipping the death sequence.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if the agent does not exist.
    pub fn despawn_agent(&mut self, id: AgentId) -> Result<()> {
        let agent = self
            .agents
            .remove(id)
            .ok_or_else(|| GameError::InvalidReference(format!("agent {id}")))?;
        if let Some(membership) = agent.squad {
            self.detach(membership.squad, id);
        }
        Ok(())
    }

    /// Apply damage from outside the simulation. Returns `true` if it
    /// killed the agent.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if the agent does not exist
    /// or is already dead.
    pub fn apply_damage(&mut self, id: AgentId, amount: Fixed) -> Result<bool> {
        self.living(id)?;
        let mut events = std::mem::take(&mut self.pending);
        let died = self.with_own_sink(|sim, sink| sim.damage(None, id, amount, sink, &mut events));
        self.pending = events;
        Ok(died)
    }

    /// Kill an agent outright.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if the agent does not exist
    /// or is already dead.
    pub fn kill(&mut self, id: AgentId) -> Result<()> {
        self.living(id)?;
        let mut events = std::mem::take(&mut self.pending);
        self.with_own_sink(|sim, sink| sim.die(id, sink, &mut events));
        self.pending = events;
        Ok(())
    }

    fn living(&self, id: AgentId) -> Result<&Agent> {
        match self.agents.get(id) {
            Some(agent) if agent.is_alive() => Ok(agent),
            Some(_) => Err(GameError::InvalidReference(format!("agent {id} is dead"))),
            None => Err(GameError::InvalidReference(format!("agent {id}"))),
        }
    }

    fn order(
        &mut self,
        id: AgentId,
        to: TroopState,
        prepare: impl FnOnce(&mut Agent),
    ) -> Result<()> {
        self.living(id)?;
        let now = self.now();
        let mut events = std::mem::take(&mut self.pending);
        self.with_own_sink(|sim, sink| {
            if let Some(agent) = sim.agents.get_mut(id) {
                prepare(agent);
                if let Some(transition) = change_state(agent, to, now, sink) {
                    events.transitions.push(transition);
                }
            }
        });
        self.pending = events;
        Ok(())
    }

    /// Send an agent to a point.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] for a missing or dead agent.
    pub fn order_move(&mut self, id: AgentId, point: Vec2Fixed) -> Result<()> {
        self.order(id, TroopState::Move, |agent| {
            agent.target = None;
            agent.target_point = Some(point);
        })
    }

    /// Engage a specific agent.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if either agent is missing or
    /// dead, or an agent is ordered to attack itself.
    pub fn order_attack(&mut self, id: AgentId, target: AgentId) -> Result<()> {
        if id == target {
            return Err(GameError::InvalidReference(format!(
                "agent {id} cannot target itself"
            )));
        }
        self.living(target)?;
        self.order(id, TroopState::Attack, |agent| {
            agent.target = Some(target);
            agent.target_point = None;
        })
    }

    /// Hold the current position and engage hostiles that come close.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] for a missing or dead agent.
    pub fn order_defend(&mut self, id: AgentId) -> Result<()> {
        self.order(id, TroopState::Defend, |agent| {
            agent.target = None;
            agent.target_point = Some(agent.position());
        })
    }

    /// Run from a threat for the flee duration.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if either agent is missing
    /// or dead.
    pub fn order_flee(&mut self, id: AgentId, threat: AgentId) -> Result<()> {
        self.living(threat)?;
        self.order(id, TroopState::Flee, |agent| {
            agent.target = Some(threat);
            agent.target_point = None;
        })
    }

    // ------------------------------------------------------------------
    // Squads
    // ------------------------------------------------------------------

    /// Create a squad and spawn `count` members from an archetype in their
    /// slots around `position`.
    ///
    /// Claims the placement cell under `position` when a grid is installed
    /// and that cell is free.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigurationMissing`] for an unknown archetype
    /// and [`GameError::CapacityExceeded`] if `count` exceeds the squad
    /// capacity. Nothing is created on error.
    pub fn create_squad(
        &mut self,
        position: Vec2Fixed,
        formation: FormationType,
        config: ConfigId,
        count: usize,
        faction: Faction,
    ) -> Result<SquadId> {
        self.configs.require(config)?;
        let id = self.next_squad_id;
        let capacity = self.settings.squad_capacity;
        if count > capacity {
            warn!(squad = id, count, capacity, "Squad would exceed capacity");
            return Err(GameError::CapacityExceeded {
                squad: id,
                capacity,
            });
        }
        self.next_squad_id += 1;

        let mut squad = Squad::new(
            id,
            faction,
            formation,
            self.settings.formation_spacing,
            capacity,
            position,
        );
        if let Some(grid) = self.grid.as_mut() {
            if let Some(cell) = grid.cell_at(position) {
                if grid.cell(cell).is_some_and(|c| c.is_available()) {
                    grid.set_occupied(cell, true)?;
                    squad.set_cell(Some(cell));
                }
            }
        }

        let mut members = Vec::with_capacity(count);
        for slot in 0..count {
            let spawn_at = squad.slot_position(slot).unwrap_or(position);
            let spawn = AgentSpawn::new(config, faction, spawn_at).with_yaw(squad.anchor_yaw());
            let agent = self.spawn_agent(spawn)?;
            squad.add(agent)?;
            members.push((agent, slot));
        }
        for (agent, slot) in members {
            if let Some(a) = self.agents.get_mut(agent) {
                a.squad = Some(SquadMembership { squad: id, slot });
            }
        }

        self.squads.insert(id, squad);
        debug!(squad = id, count, ?formation, "Squad created");
        Ok(id)
    }

    fn squad_mut(&mut self, id: SquadId) -> Result<&mut Squad> {
        self.squads.get_mut(&id).ok_or_else(|| {
            warn!(squad = id, "Unknown squad");
            GameError::InvalidReference(format!("squad {id}"))
        })
    }

    /// Add a living, squadless agent to a squad and send it to its slot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CapacityExceeded`] when the squad is full and
    /// [`GameError::InvalidReference`] for an unknown squad, a missing or
    /// dead agent, or one that already belongs to a squad.
    pub fn add_to_squad(&mut self, squad_id: SquadId, agent: AgentId) -> Result<usize> {
        if self.living(agent)?.squad.is_some() {
            return Err(GameError::InvalidReference(format!(
                "agent {agent} already belongs to a squad"
            )));
        }
        let squad = self.squad_mut(squad_id)?;
        let slot = squad.add(agent).map_err(|e| {
            warn!(squad = squad_id, agent, "Squad rejected member: {e}");
            e
        })?;
        let destination = squad.slot_position(slot);

        if let Some(a) = self.agents.get_mut(agent) {
            a.squad = Some(SquadMembership {
                squad: squad_id,
                slot,
            });
        }
        if let Some(destination) = destination {
            let mut events = std::mem::take(&mut self.pending);
            self.with_own_sink(|sim, sink| sim.send_to_slot(agent, destination, sink, &mut events));
            self.pending = events;
        }
        Ok(slot)
    }

    /// Remove an agent from its squad. The remaining members close ranks.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if the agent is missing or
    /// not in a squad.
    pub fn remove_from_squad(&mut self, agent: AgentId) -> Result<()> {
        let membership = self
            .agents
            .get_mut(agent)
            .and_then(|a| a.squad.take())
            .ok_or_else(|| GameError::InvalidReference(format!("agent {agent} has no squad")))?;
        self.detach(membership.squad, agent);
        Ok(())
    }

    /// Switch a squad's formation and reflow its members.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] for an unknown squad.
    pub fn set_formation(&mut self, squad_id: SquadId, formation: FormationType) -> Result<()> {
        self.squad_mut(squad_id)?.set_formation(formation);
        self.schedule_reflow(squad_id);
        Ok(())
    }

    /// Move a squad's formation anchor toward `point`.
    ///
    /// With a placement grid the destination snaps to the nearest valid
    /// free cell, which is claimed before the previous cell is released, and
    /// the formation turns to face the grid centre. A point inside the
    /// squad's own cell keeps that cell. Without a grid the
    /// anchor heads for `point` keeping its facing. Returns the
    /// destination.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] for an unknown squad or when
    /// the grid has no free cell.
    pub fn move_squad_to(&mut self, squad_id: SquadId, point: Vec2Fixed) -> Result<Vec2Fixed> {
        let squad = self
            .squads
            .get_mut(&squad_id)
            .ok_or_else(|| GameError::InvalidReference(format!("squad {squad_id}")))?;

        let (destination, yaw) = match self.grid.as_mut() {
            Some(grid) => {
                let own_cell = squad.cell().filter(|&c| grid.cell_at(point) == Some(c));
                let Some(cell) = own_cell.or_else(|| grid.nearest_valid_free_cell(point)) else {
                    warn!(squad = squad_id, "No free placement cell");
                    return Err(GameError::InvalidReference(
                        "no free placement cell".to_string(),
                    ));
                };
                let destination = grid
                    .cell(cell)
                    .map_or(point, |c| c.position());
                let to_center = grid.center() - destination;
                let yaw = if to_center.is_zero() {
                    squad.anchor_yaw()
                } else {
                    yaw_of(to_center)
                };
                grid.set_occupied(cell, true)?;
                if let Some(previous) = squad.set_cell(Some(cell)) {
                    if previous != cell {
                        grid.set_occupied(previous, false)?;
                    }
                }
                debug!(squad = squad_id, ?cell, "Placement cell claimed");
                (destination, yaw)
            }
            None => (point, squad.anchor_yaw()),
        };
        squad.move_to(destination, yaw);

        let faction = squad.faction();
        let members = squad.members().to_vec();
        let radius_sq = self.settings.caution_radius * self.settings.caution_radius;
        let cautious = self.agents.iter().any(|a| {
            a.is_alive()
                && faction.is_hostile_to(a.faction)
                && a.position().distance_squared(destination) <= radius_sq
        });

        self.with_own_sink(|sim, sink| {
            for id in members {
                if let Some(agent) = sim.agents.get_mut(id) {
                    agent.cautious = cautious;
                    if cautious {
                        sink.on_cautious_move(id);
                    } else {
                        sink.on_move(id);
                    }
                }
            }
        });
        Ok(destination)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Calculate a deterministic hash of the simulation state.
    ///
    /// Used to verify that two runs with the same seed and commands stay
    /// in lockstep.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        let ids = self.agents.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(agent) = self.agents.get(id) {
                id.hash(&mut hasher);
                agent.kinematics.position.x.to_bits().hash(&mut hasher);
                agent.kinematics.position.y.to_bits().hash(&mut hasher);
                agent.kinematics.velocity.x.to_bits().hash(&mut hasher);
                agent.kinematics.velocity.y.to_bits().hash(&mut hasher);
                agent.kinematics.yaw.to_bits().hash(&mut hasher);
                agent.health.current().to_bits().hash(&mut hasher);
                agent.state().hash(&mut hasher);
                agent.target.hash(&mut hasher);
                agent.squad.hash(&mut hasher);
            }
        }

        for id in self.squad_ids() {
            if let Some(squad) = self.squads.get(&id) {
                id.hash(&mut hasher);
                squad.members().hash(&mut hasher);
                squad.anchor().x.to_bits().hash(&mut hasher);
                squad.anchor().y.to_bits().hash(&mut hasher);
                squad.generation().hash(&mut hasher);
            }
        }

        self.scheduler.len().hash(&mut hasher);
        hasher.finish()
    }

    /// Read-only view of the world for tools and replays.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let agents = self
            .agents
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.agents.get(id))
            .map(AgentSnapshot::from)
            .collect();
        let squads = self
            .squad_ids()
            .into_iter()
            .filter_map(|id| self.squads.get(&id))
            .map(SquadSnapshot::from)
            .collect();
        WorldSnapshot {
            tick: self.tick,
            time: self.now(),
            agents,
            squads,
            pending_continuations: self.scheduler.len(),
            state_hash: self.state_hash(),
        }
    }

    /// Serialize the full simulation state to bytes.
    ///
    /// The spatial provider and presentation sink are not saved; a
    /// restored simulation uses the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
