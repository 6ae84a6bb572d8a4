//! Read-only world snapshots.
//!
//! A [`WorldSnapshot`] is a flat copy of what an observer needs: poses,
//! health, states and squad layout. Unlike [`Simulation::serialize`] it
//! cannot be resumed; tools and replays use it to inspect a run.
//!
//! [`Simulation::serialize`]: crate::simulation::Simulation::serialize

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::components::{AgentId, Faction, SquadId, SquadMembership};
use crate::data::ConfigId;
use crate::error::{GameError, Result};
use crate::formation::FormationType;
use crate::fsm::TroopState;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::squad::Squad;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One agent as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent id.
    pub id: AgentId,
    /// Archetype.
    pub config: ConfigId,
    /// Side.
    pub faction: Faction,
    /// Position.
    pub position: Vec2Fixed,
    /// Facing.
    #[serde(with = "fixed_serde")]
    pub yaw: Fixed,
    /// Velocity.
    pub velocity: Vec2Fixed,
    /// Current health.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// State machine state.
    pub state: TroopState,
    /// Target agent.
    pub target: Option<AgentId>,
    /// Squad slot.
    pub squad: Option<SquadMembership>,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            config: agent.config,
            faction: agent.faction,
            position: agent.kinematics.position,
            yaw: agent.kinematics.yaw,
            velocity: agent.kinematics.velocity,
            health: agent.health.current(),
            max_health: agent.health.max(),
            state: agent.state(),
            target: agent.target,
            squad: agent.squad,
        }
    }
}

/// One squad as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadSnapshot {
    /// Squad id.
    pub id: SquadId,
    /// Side.
    pub faction: Faction,
    /// Layout.
    pub formation: FormationType,
    /// Anchor position.
    pub anchor: Vec2Fixed,
    /// Anchor facing.
    #[serde(with = "fixed_serde")]
    pub anchor_yaw: Fixed,
    /// Members in slot order.
    pub members: Vec<AgentId>,
    /// Whether the anchor is travelling.
    pub moving: bool,
}

impl From<&Squad> for SquadSnapshot {
    fn from(squad: &Squad) -> Self {
        Self {
            id: squad.id(),
            faction: squad.faction(),
            formation: squad.formation(),
            anchor: squad.anchor(),
            anchor_yaw: squad.anchor_yaw(),
            members: squad.members().to_vec(),
            moving: squad.is_moving(),
        }
    }
}

/// The whole world at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Simulation time in seconds.
    #[serde(with = "fixed_serde")]
    pub time: Fixed,
    /// Agents by ascending id, dead ones included until despawned.
    pub agents: Vec<AgentSnapshot>,
    /// Squads by ascending id.
    pub squads: Vec<SquadSnapshot>,
    /// Continuations still waiting to fire.
    pub pending_continuations: usize,
    /// [`Simulation::state_hash`](crate::simulation::Simulation::state_hash)
    /// at this tick.
    pub state_hash: u64,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    snapshot: WorldSnapshot,
}

impl WorldSnapshot {
    /// Agents of a faction that are still alive.
    pub fn living(&self, faction: Faction) -> impl Iterator<Item = &AgentSnapshot> {
        self.agents
            .iter()
            .filter(move |a| a.faction == faction && a.state != TroopState::Dead)
    }

    /// Encode with a version header.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            snapshot: self.clone(),
        };
        bincode::serialize(&envelope)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize snapshot: {e}")))
    }

    /// Decode bytes produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are malformed or from another
    /// snapshot version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize snapshot: {e}")))?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(GameError::InvalidState(format!(
                "Snapshot version mismatch: expected {SNAPSHOT_VERSION}, got {}",
                envelope.version
            )));
        }
        Ok(envelope.snapshot)
    }
}
