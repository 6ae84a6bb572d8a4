//! Controller policies.
//!
//! Player troops and raiders run the same state machine; what differs is
//! how eagerly and how far they look for a fight. A [`ControllerPolicy`]
//! captures that difference as data.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, option_fixed_decimal, Fixed};

/// How an agent chooses a target from the hostiles it can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetingStrategy {
    /// Engage the nearest hostile inside the search radius.
    #[default]
    Nearest,
    /// Never search; only explicit attack orders set a target.
    Passive,
}

/// Per-agent decision parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerPolicy {
    /// Target selection rule.
    #[serde(default)]
    pub targeting: TargetingStrategy,
    /// Chance that a search which sees a hostile actually engages it.
    #[serde(with = "fixed_decimal")]
    pub aggressiveness: Fixed,
    /// Radius of the periodic hostile search.
    #[serde(with = "fixed_decimal")]
    pub search_radius: Fixed,
    /// Seconds between searches.
    #[serde(with = "fixed_decimal")]
    pub search_interval: Fixed,
    /// Idle agents outside a squad roam this far from home.
    #[serde(default, with = "option_fixed_decimal")]
    pub wander_radius: Option<Fixed>,
    /// Attacking agents drop targets farther away than this.
    #[serde(default, with = "option_fixed_decimal")]
    pub leash_radius: Option<Fixed>,
}

impl ControllerPolicy {
    /// Player troop: always engages, searches 10 units every 2 seconds.
    #[must_use]
    pub fn troop() -> Self {
        Self {
            targeting: TargetingStrategy::Nearest,
            aggressiveness: Fixed::ONE,
            search_radius: Fixed::from_num(10),
            search_interval: Fixed::from_num(2),
            wander_radius: None,
            leash_radius: None,
        }
    }

    /// Raider: engages 70% of the time within three attack ranges, looks
    /// every second, wanders when idle and gives up chases past one and a
    /// half aggro radii.
    #[must_use]
    pub fn raider(attack_range: Fixed) -> Self {
        let aggro = attack_range * Fixed::from_num(3);
        Self {
            targeting: TargetingStrategy::Nearest,
            aggressiveness: Fixed::from_num(0.7),
            search_radius: aggro,
            search_interval: Fixed::ONE,
            wander_radius: Some(Fixed::from_num(10)),
            leash_radius: Some(aggro * Fixed::from_num(1.5)),
        }
    }

    /// A policy that never looks for targets on its own.
    #[must_use]
    pub fn passive() -> Self {
        Self {
            targeting: TargetingStrategy::Passive,
            ..Self::troop()
        }
    }
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self::troop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raider_preset_scales_with_range() {
        let policy = ControllerPolicy::raider(Fixed::from_num(2));
        assert_eq!(policy.search_radius, Fixed::from_num(6));
        assert_eq!(policy.leash_radius, Some(Fixed::from_num(9)));
        assert_eq!(policy.search_interval, Fixed::ONE);
    }

    #[test]
    fn test_troop_preset() {
        let policy = ControllerPolicy::troop();
        assert_eq!(policy.aggressiveness, Fixed::ONE);
        assert!(policy.wander_radius.is_none());
    }
}
