//! Component definitions shared by agents, squads and queries.
//!
//! Components are plain data. Behavior that mutates them lives in the
//! kinematics, steering and FSM modules.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for agents.
pub type AgentId = u64;

/// Unique identifier for squads.
pub type SquadId = u32;

/// Side an agent fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Faction {
    /// Player-controlled defenders.
    #[default]
    Defenders,
    /// Hostile raiders.
    Raiders,
}

impl Faction {
    /// Layer mask containing only this faction.
    #[must_use]
    pub const fn mask(self) -> FactionMask {
        match self {
            Self::Defenders => FactionMask::DEFENDERS,
            Self::Raiders => FactionMask::RAIDERS,
        }
    }

    /// Layer mask containing every faction hostile to this one.
    #[must_use]
    pub const fn hostile_mask(self) -> FactionMask {
        match self {
            Self::Defenders => FactionMask::RAIDERS,
            Self::Raiders => FactionMask::DEFENDERS,
        }
    }

    /// Check whether `other` is an enemy of this faction.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        self.hostile_mask().contains(other)
    }
}

/// Layer mask used by radius queries to filter factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactionMask(u8);

impl FactionMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Matches defenders.
    pub const DEFENDERS: Self = Self(0b01);
    /// Matches raiders.
    pub const RAIDERS: Self = Self(0b10);
    /// Matches every faction.
    pub const ALL: Self = Self(0b11);

    const fn bit(faction: Faction) -> u8 {
        match faction {
            Faction::Defenders => 0b01,
            Faction::Raiders => 0b10,
        }
    }

    /// Check whether a faction passes this mask.
    #[must_use]
    pub const fn contains(self, faction: Faction) -> bool {
        self.0 & Self::bit(faction) != 0
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Health pool, always clamped to `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    #[serde(with = "fixed_serde")]
    current: Fixed,
    #[serde(with = "fixed_serde")]
    max: Fixed,
}

impl Health {
    /// Full health pool. A negative maximum is treated as zero.
    #[must_use]
    pub fn new(max: Fixed) -> Self {
        let max = max.max(Fixed::ZERO);
        Self { current: max, max }
    }

    /// Current health points.
    #[must_use]
    pub const fn current(&self) -> Fixed {
        self.current
    }

    /// Maximum health points.
    #[must_use]
    pub const fn max(&self) -> Fixed {
        self.max
    }

    /// Set health, clamping into `[0, max]`.
    pub fn set(&mut self, value: Fixed) {
        self.current = value.clamp(Fixed::ZERO, self.max);
    }

    /// Subtract damage. Returns `true` if this application emptied the pool.
    pub fn apply_damage(&mut self, amount: Fixed) -> bool {
        if self.is_depleted() {
            return false;
        }
        self.set(self.current - amount.max(Fixed::ZERO));
        self.is_depleted()
    }

    /// Check if health has reached zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current == Fixed::ZERO
    }

    /// Current health as a fraction of max (0 when max is 0).
    #[must_use]
    pub fn fraction(&self) -> Fixed {
        if self.max == Fixed::ZERO {
            Fixed::ZERO
        } else {
            self.current / self.max
        }
    }
}

/// Pose and velocity of an agent, owned exclusively by that agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Kinematics {
    /// World position.
    pub position: Vec2Fixed,
    /// Facing in radians (0 = `+y`).
    #[serde(with = "fixed_serde")]
    pub yaw: Fixed,
    /// Velocity in units per second.
    pub velocity: Vec2Fixed,
}

impl Kinematics {
    /// Stationary pose at a position.
    #[must_use]
    pub const fn at(position: Vec2Fixed, yaw: Fixed) -> Self {
        Self {
            position,
            yaw,
            velocity: Vec2Fixed::ZERO,
        }
    }
}

/// An agent's place in a squad. Only meaningful while set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SquadMembership {
    /// Owning squad.
    pub squad: SquadId,
    /// Slot index inside the squad's member list.
    pub slot: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_larger_than_health_clamps_to_zero() {
        let mut health = Health::new(Fixed::from_num(30));
        let died = health.apply_damage(Fixed::from_num(50));
        assert!(died);
        assert_eq!(health.current(), Fixed::ZERO);
    }

    #[test]
    fn test_dead_pool_does_not_die_twice() {
        let mut health = Health::new(Fixed::from_num(10));
        assert!(health.apply_damage(Fixed::from_num(10)));
        assert!(!health.apply_damage(Fixed::from_num(10)));
    }

    #[test]
    fn test_negative_damage_does_not_heal() {
        let mut health = Health::new(Fixed::from_num(10));
        health.apply_damage(Fixed::from_num(4));
        health.apply_damage(Fixed::from_num(-100));
        assert_eq!(health.current(), Fixed::from_num(6));
    }

    #[test]
    fn test_set_clamps_above_max() {
        let mut health = Health::new(Fixed::from_num(10));
        health.set(Fixed::from_num(99));
        assert_eq!(health.current(), Fixed::from_num(10));
    }

    #[test]
    fn test_faction_masks() {
        assert!(Faction::Defenders.is_hostile_to(Faction::Raiders));
        assert!(!Faction::Raiders.is_hostile_to(Faction::Raiders));
        assert!(FactionMask::ALL.contains(Faction::Defenders));
        assert!(!FactionMask::NONE.contains(Faction::Raiders));
        assert_eq!(
            FactionMask::DEFENDERS.union(FactionMask::RAIDERS),
            FactionMask::ALL
        );
    }
}
