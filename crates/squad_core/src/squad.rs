//! Squads: ordered groups of agents holding a formation.
//!
//! A squad owns its member list and formation anchor. Slot indices are the
//! member list positions, so they stay contiguous `0..len` through every
//! add and remove. Members keep a copy of their slot in
//! [`SquadMembership`](crate::components::SquadMembership); the simulation
//! syncs those copies from the renumbering this module reports.

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, Faction, SquadId};
use crate::error::{GameError, Result};
use crate::formation::FormationType;
use crate::math::{fixed_serde, slerp_yaw, Fixed, Vec2Fixed};
use crate::placement::GridCoord;

/// Where the formation anchor is heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorGoal {
    /// Target position.
    pub position: Vec2Fixed,
    /// Target facing.
    #[serde(with = "fixed_serde")]
    pub yaw: Fixed,
}

/// Pacing for anchor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPacing {
    /// Units per second.
    pub speed: Fixed,
    /// Rotation interpolation factor per second.
    pub rotation_speed: Fixed,
    /// Distance at which the anchor counts as arrived.
    pub tolerance: Fixed,
}

/// A fixed-capacity group of agents in formation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Squad {
    id: SquadId,
    faction: Faction,
    formation: FormationType,
    #[serde(with = "fixed_serde")]
    spacing: Fixed,
    capacity: usize,
    members: Vec<AgentId>,
    offsets: Vec<Vec2Fixed>,
    anchor: Vec2Fixed,
    #[serde(with = "fixed_serde")]
    anchor_yaw: Fixed,
    goal: Option<AnchorGoal>,
    /// Bumped on every reflow; stale slot orders compare against it.
    generation: u64,
    /// Placement cell this squad has claimed.
    cell: Option<GridCoord>,
}

impl Squad {
    /// Empty squad anchored at `position`.
    #[must_use]
    pub fn new(
        id: SquadId,
        faction: Faction,
        formation: FormationType,
        spacing: Fixed,
        capacity: usize,
        position: Vec2Fixed,
    ) -> Self {
        Self {
            id,
            faction,
            formation,
            spacing,
            capacity,
            members: Vec::with_capacity(capacity),
            offsets: formation.offsets(capacity, spacing),
            anchor: position,
            anchor_yaw: Fixed::ZERO,
            goal: None,
            generation: 0,
            cell: None,
        }
    }

    /// Squad id.
    #[must_use]
    pub const fn id(&self) -> SquadId {
        self.id
    }

    /// Side the squad fights for.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.faction
    }

    /// Current formation.
    #[must_use]
    pub const fn formation(&self) -> FormationType {
        self.formation
    }

    /// Distance between slots.
    #[must_use]
    pub const fn spacing(&self) -> Fixed {
        self.spacing
    }

    /// Maximum member count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Members in slot order.
    #[must_use]
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the squad has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if the squad is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Slot of a member.
    #[must_use]
    pub fn slot_of(&self, agent: AgentId) -> Option<usize> {
        self.members.iter().position(|&m| m == agent)
    }

    /// Local slot offsets.
    #[must_use]
    pub fn offsets(&self) -> &[Vec2Fixed] {
        &self.offsets
    }

    /// Anchor position.
    #[must_use]
    pub const fn anchor(&self) -> Vec2Fixed {
        self.anchor
    }

    /// Anchor facing.
    #[must_use]
    pub const fn anchor_yaw(&self) -> Fixed {
        self.anchor_yaw
    }

    /// Pending anchor goal while the formation is moving.
    #[must_use]
    pub const fn goal(&self) -> Option<AnchorGoal> {
        self.goal
    }

    /// Check if the anchor is travelling.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.goal.is_some()
    }

    /// Current reflow generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new reflow generation, invalidating pending slot orders.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Claimed placement cell.
    #[must_use]
    pub const fn cell(&self) -> Option<GridCoord> {
        self.cell
    }

    /// Record the claimed placement cell, returning the previous one.
    pub fn set_cell(&mut self, cell: Option<GridCoord>) -> Option<GridCoord> {
        std::mem::replace(&mut self.cell, cell)
    }

    /// Switch layout and rebuild the offset table.
    pub fn set_formation(&mut self, formation: FormationType) {
        self.formation = formation;
        self.offsets = formation.offsets(self.capacity, self.spacing);
    }

    /// Append a member; returns its slot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::CapacityExceeded`] when full and
    /// [`GameError::InvalidReference`] if the agent is already a member.
    pub fn add(&mut self, agent: AgentId) -> Result<usize> {
        if self.is_full() {
            return Err(GameError::CapacityExceeded {
                squad: self.id,
                capacity: self.capacity,
            });
        }
        if self.members.contains(&agent) {
            return Err(GameError::InvalidReference(format!(
                "agent {agent} already in squad {}",
                self.id
            )));
        }
        self.members.push(agent);
        Ok(self.members.len() - 1)
    }

    /// Remove a member, compacting the slots after it.
    ///
    /// Returns the members whose slot changed, with their new slot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidReference`] if the agent is not a member.
    pub fn remove(&mut self, agent: AgentId) -> Result<Vec<(AgentId, usize)>> {
        let removed = self.slot_of(agent).ok_or_else(|| {
            GameError::InvalidReference(format!("agent {agent} not in squad {}", self.id))
        })?;
        self.members.remove(removed);
        Ok(self.members[removed..]
            .iter()
            .enumerate()
            .map(|(i, &member)| (member, removed + i))
            .collect())
    }

    /// World position of a slot at the anchor's current pose.
    #[must_use]
    pub fn slot_position(&self, slot: usize) -> Option<Vec2Fixed> {
        self.offsets
            .get(slot)
            .map(|offset| self.anchor + offset.rotated(self.anchor_yaw))
    }

    /// Place the anchor immediately, without travel.
    pub fn teleport(&mut self, position: Vec2Fixed, yaw: Fixed) {
        self.anchor = position;
        self.anchor_yaw = yaw;
        self.goal = None;
    }

    /// Set a target pose for the anchor.
    pub fn move_to(&mut self, position: Vec2Fixed, yaw: Fixed) {
        self.goal = Some(AnchorGoal { position, yaw });
    }

    /// Advance the anchor toward its goal.
    ///
    /// Returns `true` on the step the anchor arrives.
    pub fn step_anchor(&mut self, pacing: AnchorPacing, dt: Fixed) -> bool {
        let Some(goal) = self.goal else {
            return false;
        };
        self.anchor = self.anchor.move_towards(goal.position, pacing.speed * dt);
        self.anchor_yaw = slerp_yaw(self.anchor_yaw, goal.yaw, pacing.rotation_speed * dt);
        if self.anchor.distance(goal.position) < pacing.tolerance {
            self.goal = None;
            return true;
        }
        false
    }
}
