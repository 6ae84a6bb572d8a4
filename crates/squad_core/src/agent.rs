//! Agents: one troop or raider each.

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, Faction, Health, Kinematics, SquadMembership};
use crate::data::{AgentConfig, AgentStats, BehaviorKind, ConfigId, ControllerPolicy};
use crate::fsm::{StateMachine, TroopState};
use crate::kinematics::MotionLimits;
use crate::math::{Fixed, Vec2Fixed};
use crate::steering::{instantiate, Behavior};

/// Everything needed to spawn an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpawn {
    /// Archetype to instantiate.
    pub config: ConfigId,
    /// Side the agent fights for.
    pub faction: Faction,
    /// Spawn position.
    pub position: Vec2Fixed,
    /// Spawn facing.
    pub yaw: Fixed,
    /// Decision policy; `None` picks the faction default.
    pub policy: Option<ControllerPolicy>,
}

impl AgentSpawn {
    /// Spawn parameters with default facing and policy.
    #[must_use]
    pub fn new(config: ConfigId, faction: Faction, position: Vec2Fixed) -> Self {
        Self {
            config,
            faction,
            position,
            yaw: Fixed::ZERO,
            policy: None,
        }
    }

    /// Set the controller policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ControllerPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the spawn facing.
    #[must_use]
    pub fn with_yaw(mut self, yaw: Fixed) -> Self {
        self.yaw = yaw;
        self
    }
}

/// A simulated unit.
///
/// Stats and behaviors are copied from the archetype at spawn; the
/// archetype itself is never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id.
    pub id: AgentId,
    /// Archetype the agent was spawned from.
    pub config: ConfigId,
    /// Side the agent fights for.
    pub faction: Faction,
    /// Pose and velocity.
    pub kinematics: Kinematics,
    /// Health pool.
    pub health: Health,
    /// Copied stat block.
    pub stats: AgentStats,
    /// Decision policy.
    pub policy: ControllerPolicy,
    /// Force generators in evaluation order.
    pub behaviors: Vec<Behavior>,
    /// Agent being attacked or fled from. Non-owning; may go stale.
    pub target: Option<AgentId>,
    /// Point being moved to.
    pub target_point: Option<Vec2Fixed>,
    /// Squad slot, when in a squad.
    pub squad: Option<SquadMembership>,
    /// High-level state.
    pub fsm: StateMachine,
    /// Where the agent spawned; wandering stays near it.
    pub home: Vec2Fixed,
    /// The next Move entry presents as a cautious move.
    pub cautious: bool,
}

impl Agent {
    /// Instantiate an agent from an archetype.
    #[must_use]
    pub fn new(id: AgentId, spawn: &AgentSpawn, config: &AgentConfig, now: Fixed) -> Self {
        let policy = spawn.policy.unwrap_or_else(|| match spawn.faction {
            Faction::Defenders => ControllerPolicy::troop(),
            Faction::Raiders => ControllerPolicy::raider(config.stats.attack_range),
        });
        Self {
            id,
            config: spawn.config,
            faction: spawn.faction,
            kinematics: Kinematics::at(spawn.position, spawn.yaw),
            health: Health::new(config.stats.max_health),
            stats: config.stats,
            policy,
            behaviors: instantiate(&config.behaviors, &config.name),
            target: None,
            target_point: None,
            squad: None,
            fsm: StateMachine::new(now),
            home: spawn.position,
            cautious: false,
        }
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.kinematics.position
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TroopState {
        self.fsm.state()
    }

    /// Check if the agent is not dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state() != TroopState::Dead
    }

    /// Limits used by kinematic integration.
    #[must_use]
    pub const fn motion_limits(&self) -> MotionLimits {
        MotionLimits {
            move_speed: self.stats.move_speed,
            rotation_speed: self.stats.rotation_speed,
        }
    }

    /// First behavior of a kind.
    #[must_use]
    pub fn behavior(&self, kind: BehaviorKind) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.kind() == kind)
    }

    /// First behavior of a kind, mutably.
    pub fn behavior_mut(&mut self, kind: BehaviorKind) -> Option<&mut Behavior> {
        self.behaviors.iter_mut().find(|b| b.kind() == kind)
    }

    /// Drop the target agent.
    pub fn clear_target(&mut self) {
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BehaviorParams, BehaviorTemplate};

    #[test]
    fn test_agent_copies_archetype() {
        let mut config = AgentConfig::new("pike");
        config.stats.max_health = Fixed::from_num(40);
        config
            .behaviors
            .push(BehaviorTemplate::new(BehaviorParams::arrival()));
        let spawn = AgentSpawn::new(ConfigId(0), Faction::Defenders, Vec2Fixed::from_ints(3, 4));
        let agent = Agent::new(7, &spawn, &config, Fixed::ZERO);

        assert_eq!(agent.health.current(), Fixed::from_num(40));
        assert_eq!(agent.position(), Vec2Fixed::from_ints(3, 4));
        assert_eq!(agent.state(), TroopState::Idle);
        assert!(agent.behavior(BehaviorKind::Arrival).is_some());
        assert_eq!(agent.policy, ControllerPolicy::troop());
    }

    #[test]
    fn test_raiders_default_to_raider_policy() {
        let config = AgentConfig::new("raider");
        let spawn = AgentSpawn::new(ConfigId(0), Faction::Raiders, Vec2Fixed::ZERO);
        let agent = Agent::new(1, &spawn, &config, Fixed::ZERO);
        assert_eq!(agent.policy, ControllerPolicy::raider(config.stats.attack_range));
    }
}
