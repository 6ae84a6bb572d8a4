//! Simulation-wide timing and pacing constants.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, Fixed};

/// Tunables shared by every agent and squad in one simulation.
///
/// All durations are in seconds of simulation time. Any field may be
/// omitted from RON to keep its default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Seed for the simulation's random source.
    pub seed: u64,

    /// Attack windup when the presentation layer reports no duration.
    #[serde(with = "fixed_decimal")]
    pub attack_windup: Fixed,
    /// Time a dead agent lingers before it is removed.
    #[serde(with = "fixed_decimal")]
    pub death_grace: Fixed,

    /// Distance at which a Move order counts as reached.
    #[serde(with = "fixed_decimal")]
    pub arrival_tolerance: Fixed,
    /// Extra distance beyond attack range before the attack stance
    /// switches back to moving.
    #[serde(with = "fixed_decimal")]
    pub attack_range_slack: Fixed,
    /// How long the Flee state lasts before returning to Idle.
    #[serde(with = "fixed_decimal")]
    pub flee_state_duration: Fixed,
    /// Radius around a squad destination checked for hostiles when
    /// choosing between a cautious and a normal move.
    #[serde(with = "fixed_decimal")]
    pub caution_radius: Fixed,

    /// Default squad capacity.
    pub squad_capacity: usize,
    /// Default distance between formation slots.
    #[serde(with = "fixed_decimal")]
    pub formation_spacing: Fixed,
    /// Formation anchor speed in units per second.
    #[serde(with = "fixed_decimal")]
    pub anchor_speed: Fixed,
    /// Formation anchor turn rate (interpolation factor per second).
    #[serde(with = "fixed_decimal")]
    pub anchor_rotation_speed: Fixed,
    /// Distance at which the anchor counts as arrived.
    #[serde(with = "fixed_decimal")]
    pub movement_tolerance: Fixed,
    /// Delay between a reflow trigger and the first slot order.
    #[serde(with = "fixed_decimal")]
    pub settle_delay: Fixed,
    /// Delay between consecutive members' slot orders.
    #[serde(with = "fixed_decimal")]
    pub member_stagger: Fixed,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            attack_windup: Fixed::ONE,
            death_grace: Fixed::from_num(2),
            arrival_tolerance: Fixed::from_num(0.5),
            attack_range_slack: Fixed::from_num(0.5),
            flee_state_duration: Fixed::from_num(3),
            caution_radius: Fixed::from_num(10),
            squad_capacity: 9,
            formation_spacing: Fixed::from_num(2),
            anchor_speed: Fixed::from_num(5),
            anchor_rotation_speed: Fixed::from_num(5),
            movement_tolerance: Fixed::from_num(0.5),
            settle_delay: Fixed::ONE,
            member_stagger: Fixed::from_num(0.1),
        }
    }
}

impl SimulationSettings {
    /// Parse settings from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed input.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Same settings with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let settings =
            SimulationSettings::from_ron("inline", "(seed: 9, settle_delay: 0.5)").unwrap();
        assert_eq!(settings.seed, 9);
        assert_eq!(settings.settle_delay, Fixed::from_num(0.5));
        assert_eq!(settings.squad_capacity, 9);
        assert_eq!(settings.member_stagger, Fixed::from_num(0.1));
    }
}
