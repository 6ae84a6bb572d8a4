//! Troop state machine.
//!
//! Six states, exactly one active. The machine re-checks target validity
//! on every update and falls back to Idle when a reference has gone
//! stale; nothing here fails.
//!
//! | From   | To     | When                                                 |
//! |--------|--------|------------------------------------------------------|
//! | Idle   | Attack | periodic search finds a hostile (aggressiveness gate) |
//! | Idle   | Move   | wander destination picked                            |
//! | Move   | Idle   | destination within arrival tolerance, or no target   |
//! | Attack | Idle   | target gone, dead, or past the leash                 |
//! | Defend | Attack | hostile within attack range + slack                  |
//! | Flee   | Idle   | flee duration elapsed                                |
//! | any    | Dead   | health reached zero (external)                       |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Agent;
use crate::components::AgentId;
use crate::data::{BehaviorKind, SimulationSettings, TargetingStrategy};
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::presentation::PresentationSink;
use crate::rng::SimRng;
use crate::spatial::SpatialQuery;
use crate::targeting::find_nearest;

/// High-level mode of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TroopState {
    /// Waiting; searches for hostiles periodically.
    Idle,
    /// Heading for a point.
    Move,
    /// Engaging a target.
    Attack,
    /// Holding position; engages hostiles that come close.
    Defend,
    /// Running from a threat for a fixed time.
    Flee,
    /// Terminal.
    Dead,
}

impl TroopState {
    /// Check whether behaviors of `kind` run in this state.
    ///
    /// Attack suppresses Seek and Arrival (the Attack behavior drives
    /// movement); Flee also suppresses Attack; Dead runs nothing.
    #[must_use]
    pub const fn allows(self, kind: BehaviorKind) -> bool {
        match self {
            Self::Dead => false,
            Self::Attack => !matches!(kind, BehaviorKind::Seek | BehaviorKind::Arrival),
            Self::Flee => !matches!(
                kind,
                BehaviorKind::Seek | BehaviorKind::Arrival | BehaviorKind::Attack
            ),
            Self::Idle | Self::Move | Self::Defend => true,
        }
    }
}

/// Which attack intent was last presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackStance {
    /// Target beyond range plus slack.
    Closing,
    /// Target within range plus slack.
    InRange,
}

/// A state change, reported in tick events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateTransition {
    /// Agent that changed state.
    pub agent: AgentId,
    /// Previous state.
    pub from: TroopState,
    /// New state.
    pub to: TroopState,
}

/// Per-agent state machine bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateMachine {
    state: TroopState,
    #[serde(with = "fixed_serde")]
    entered_at: Fixed,
    #[serde(with = "option_fixed_serde")]
    last_search: Option<Fixed>,
    stance: Option<AttackStance>,
}

impl StateMachine {
    /// Machine in Idle, entered at `now`.
    #[must_use]
    pub const fn new(now: Fixed) -> Self {
        Self {
            state: TroopState::Idle,
            entered_at: now,
            last_search: None,
            stance: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TroopState {
        self.state
    }

    /// When the current state was entered.
    #[must_use]
    pub const fn entered_at(&self) -> Fixed {
        self.entered_at
    }

    /// Attack stance last presented, while attacking.
    #[must_use]
    pub const fn stance(&self) -> Option<AttackStance> {
        self.stance
    }

    fn search_due(&self, now: Fixed, interval: Fixed) -> bool {
        self.last_search.map_or(true, |last| now >= last + interval)
    }
}

/// Read-only world data for one state update.
#[derive(Debug, Clone, Copy)]
pub struct FsmWorld<'a> {
    /// Current simulation time.
    pub now: Fixed,
    /// Hostile search.
    pub spatial: &'a dyn SpatialQuery,
    /// Positions of living agents at the start of the tick.
    pub living: &'a HashMap<AgentId, Vec2Fixed>,
    /// Timing constants.
    pub settings: &'a SimulationSettings,
}

/// Switch `agent` into `to`, running exit and enter hooks.
///
/// Leaving Dead is refused. Re-entering the current state re-runs its
/// enter hook (a fresh move order restarts Move).
pub fn change_state(
    agent: &mut Agent,
    to: TroopState,
    now: Fixed,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    let from = agent.fsm.state;
    if from == TroopState::Dead {
        return None;
    }

    agent.fsm.state = to;
    agent.fsm.entered_at = now;
    agent.fsm.stance = None;

    match to {
        TroopState::Idle => sink.on_idle(agent.id),
        TroopState::Move => {
            if agent.cautious {
                sink.on_cautious_move(agent.id);
            } else {
                sink.on_move(agent.id);
            }
            agent.cautious = false;
        }
        TroopState::Attack => {
            agent.fsm.stance = Some(AttackStance::InRange);
            sink.on_combat_idle(agent.id);
        }
        TroopState::Defend => sink.on_defend(agent.id),
        TroopState::Flee => sink.on_flee(agent.id),
        // Death presentation needs the scheduler; the simulation owns it.
        TroopState::Dead => {}
    }

    debug!(agent = agent.id, ?from, ?to, "State transition");
    Some(StateTransition {
        agent: agent.id,
        from,
        to,
    })
}

/// Resolve where the agent is heading: the target agent if it is alive,
/// else the target point.
#[must_use]
pub fn resolve_target(agent: &Agent, living: &HashMap<AgentId, Vec2Fixed>) -> Option<Vec2Fixed> {
    agent
        .target
        .and_then(|id| living.get(&id).copied())
        .or(agent.target_point)
}

/// Advance one agent's state machine.
pub fn update(
    agent: &mut Agent,
    world: &FsmWorld<'_>,
    rng: &mut SimRng,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    match agent.fsm.state {
        TroopState::Dead => None,
        TroopState::Idle => update_idle(agent, world, rng, sink),
        TroopState::Move => update_move(agent, world, sink),
        TroopState::Attack => update_attack(agent, world, sink),
        TroopState::Defend => update_defend(agent, world, rng, sink),
        TroopState::Flee => {
            if world.now - agent.fsm.entered_at >= world.settings.flee_state_duration {
                agent.clear_target();
                return change_state(agent, TroopState::Idle, world.now, sink);
            }
            None
        }
    }
}

/// Periodic hostile search. Returns the engaged hostile, if any.
fn search(agent: &mut Agent, world: &FsmWorld<'_>, radius: Fixed, rng: &mut SimRng) -> Option<AgentId> {
    if agent.policy.targeting == TargetingStrategy::Passive {
        return None;
    }
    if !agent.fsm.search_due(world.now, agent.policy.search_interval) {
        return None;
    }
    agent.fsm.last_search = Some(world.now);

    let position = agent.position();
    let hostiles = world
        .spatial
        .query_radius(position, radius, agent.faction.hostile_mask());
    if hostiles.is_empty() || !rng.chance(agent.policy.aggressiveness) {
        return None;
    }
    find_nearest(position, radius, hostiles, |e| e.id != agent.id).map(|(e, _)| e.id)
}

fn engage(
    agent: &mut Agent,
    target: AgentId,
    now: Fixed,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    agent.target = Some(target);
    agent.target_point = None;
    change_state(agent, TroopState::Attack, now, sink)
}

fn update_idle(
    agent: &mut Agent,
    world: &FsmWorld<'_>,
    rng: &mut SimRng,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    let due = agent.fsm.search_due(world.now, agent.policy.search_interval);
    if let Some(target) = search(agent, world, agent.policy.search_radius, rng) {
        return engage(agent, target, world.now, sink);
    }

    // Free agents with a wander radius roam near home between searches.
    if let (true, None, Some(radius)) = (due, agent.squad, agent.policy.wander_radius) {
        let destination = agent.home + rng.inside_disc(radius);
        agent.target = None;
        agent.target_point = Some(destination);
        return change_state(agent, TroopState::Move, world.now, sink);
    }
    None
}

fn update_move(
    agent: &mut Agent,
    world: &FsmWorld<'_>,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    let Some(destination) = resolve_target(agent, world.living) else {
        agent.clear_target();
        return change_state(agent, TroopState::Idle, world.now, sink);
    };
    if agent.position().distance(destination) <= world.settings.arrival_tolerance {
        return change_state(agent, TroopState::Idle, world.now, sink);
    }
    None
}

fn update_attack(
    agent: &mut Agent,
    world: &FsmWorld<'_>,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    let target_pos = agent.target.and_then(|id| world.living.get(&id).copied());
    let Some(target_pos) = target_pos else {
        agent.clear_target();
        return change_state(agent, TroopState::Idle, world.now, sink);
    };

    let distance = agent.position().distance(target_pos);
    if agent.policy.leash_radius.is_some_and(|leash| distance > leash) {
        debug!(agent = agent.id, "Target beyond leash, giving up");
        agent.clear_target();
        return change_state(agent, TroopState::Idle, world.now, sink);
    }

    let stance = if distance > agent.stats.attack_range + world.settings.attack_range_slack {
        AttackStance::Closing
    } else {
        AttackStance::InRange
    };
    if agent.fsm.stance != Some(stance) {
        agent.fsm.stance = Some(stance);
        match stance {
            AttackStance::Closing => sink.on_move(agent.id),
            AttackStance::InRange => sink.on_combat_idle(agent.id),
        }
    }
    None
}

fn update_defend(
    agent: &mut Agent,
    world: &FsmWorld<'_>,
    rng: &mut SimRng,
    sink: &mut dyn PresentationSink,
) -> Option<StateTransition> {
    let reach = agent.stats.attack_range + world.settings.attack_range_slack;
    match search(agent, world, reach, rng) {
        Some(target) => engage(agent, target, world.now, sink),
        None => None,
    }
}
