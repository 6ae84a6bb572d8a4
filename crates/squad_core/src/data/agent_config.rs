//! Agent archetype definitions.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, Fixed};
use crate::targeting::DirectionTable;

/// Stat block applied to an agent at spawn.
///
/// # Example RON
///
/// ```ron
/// AgentStats(
///     max_health: 100.0,
///     attack_power: 10.0,
///     attack_range: 2.0,
///     attack_speed: 1.0,
///     move_speed: 5.0,
///     rotation_speed: 10.0,
///     max_force: 10.0,
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentStats {
    /// Maximum (and starting) health.
    #[serde(with = "fixed_decimal", default = "default_max_health")]
    pub max_health: Fixed,
    /// Damage applied per landed attack.
    #[serde(with = "fixed_decimal", default = "default_attack_power")]
    pub attack_power: Fixed,
    /// Distance at which an attack can land.
    #[serde(with = "fixed_decimal", default = "default_attack_range")]
    pub attack_range: Fixed,
    /// Attacks per second; the attack cooldown is its inverse.
    #[serde(with = "fixed_decimal", default = "default_attack_speed")]
    pub attack_speed: Fixed,
    /// Maximum speed in units per second.
    #[serde(with = "fixed_decimal", default = "default_move_speed")]
    pub move_speed: Fixed,
    /// Facing interpolation rate per second.
    #[serde(with = "fixed_decimal", default = "default_rotation_speed")]
    pub rotation_speed: Fixed,
    /// Cap on the combined steering force.
    #[serde(with = "fixed_decimal", default = "default_max_force")]
    pub max_force: Fixed,
}

fn default_max_health() -> Fixed {
    Fixed::from_num(100)
}

fn default_attack_power() -> Fixed {
    Fixed::from_num(10)
}

fn default_attack_range() -> Fixed {
    Fixed::from_num(2)
}

fn default_attack_speed() -> Fixed {
    Fixed::ONE
}

fn default_move_speed() -> Fixed {
    Fixed::from_num(5)
}

fn default_rotation_speed() -> Fixed {
    Fixed::from_num(10)
}

fn default_max_force() -> Fixed {
    Fixed::from_num(10)
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            max_health: default_max_health(),
            attack_power: default_attack_power(),
            attack_range: default_attack_range(),
            attack_speed: default_attack_speed(),
            move_speed: default_move_speed(),
            rotation_speed: default_rotation_speed(),
            max_force: default_max_force(),
        }
    }
}

impl AgentStats {
    /// Seconds between attacks.
    #[must_use]
    pub fn attack_cooldown(&self) -> Fixed {
        if self.attack_speed <= Fixed::ZERO {
            return Fixed::MAX;
        }
        Fixed::ONE / self.attack_speed
    }
}

/// The kind of force generator, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Head straight for the target.
    Seek,
    /// Run from a nearby target.
    Flee,
    /// Seek with deceleration near the target.
    Arrival,
    /// Keep distance from same-side neighbours.
    Separation,
    /// Close in on and strike the target.
    Attack,
    /// Timed hesitation or panic.
    Fear,
}

/// Behavior-specific parameters.
///
/// Every variant carries the force cap of its own output; the defaults
/// match the stock troop archetype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorParams {
    /// Seek parameters.
    Seek {
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_seek_force")]
        max_force: Fixed,
    },
    /// Flee parameters.
    Flee {
        /// Threats farther than this are ignored.
        #[serde(with = "fixed_decimal", default = "default_flee_radius")]
        flee_radius: Fixed,
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_flee_force")]
        max_force: Fixed,
    },
    /// Arrival parameters.
    Arrival {
        /// Inside this distance the agent brakes to a stop.
        #[serde(with = "fixed_decimal", default = "default_arrival_radius")]
        arrival_radius: Fixed,
        /// Inside this distance desired speed falls off linearly.
        #[serde(with = "fixed_decimal", default = "default_slowing_radius")]
        slowing_radius: Fixed,
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_arrival_force")]
        max_force: Fixed,
    },
    /// Separation parameters.
    Separation {
        /// Neighbour query radius.
        #[serde(with = "fixed_decimal", default = "default_separation_radius")]
        separation_radius: Fixed,
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_separation_force")]
        max_force: Fixed,
    },
    /// Attack parameters. Cooldown comes from the agent's attack speed.
    Attack {
        /// Local-space approach directions.
        #[serde(default)]
        directions: DirectionTable,
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_attack_force")]
        max_force: Fixed,
    },
    /// Fear parameters.
    Fear {
        /// How long one episode lasts, in seconds.
        #[serde(with = "fixed_decimal", default = "default_fear_duration")]
        duration: Fixed,
        /// Chance an episode is a hesitation rather than a flight.
        #[serde(with = "fixed_decimal", default = "default_hesitation_chance")]
        hesitation_chance: Fixed,
        /// Output force cap.
        #[serde(with = "fixed_decimal", default = "default_fear_force")]
        max_force: Fixed,
    },
}

fn default_seek_force() -> Fixed {
    Fixed::from_num(10)
}

fn default_flee_radius() -> Fixed {
    Fixed::from_num(10)
}

fn default_flee_force() -> Fixed {
    Fixed::from_num(15)
}

fn default_arrival_radius() -> Fixed {
    Fixed::ONE
}

fn default_slowing_radius() -> Fixed {
    Fixed::from_num(5)
}

fn default_arrival_force() -> Fixed {
    Fixed::from_num(10)
}

fn default_separation_radius() -> Fixed {
    Fixed::from_num(2)
}

fn default_separation_force() -> Fixed {
    Fixed::from_num(15)
}

fn default_attack_force() -> Fixed {
    Fixed::from_num(20)
}

fn default_fear_duration() -> Fixed {
    Fixed::from_num(2)
}

fn default_hesitation_chance() -> Fixed {
    Fixed::from_num(0.7)
}

fn default_fear_force() -> Fixed {
    Fixed::from_num(15)
}

impl BehaviorParams {
    /// Seek with default parameters.
    #[must_use]
    pub fn seek() -> Self {
        Self::Seek {
            max_force: default_seek_force(),
        }
    }

    /// Flee with default parameters.
    #[must_use]
    pub fn flee() -> Self {
        Self::Flee {
            flee_radius: default_flee_radius(),
            max_force: default_flee_force(),
        }
    }

    /// Arrival with default parameters.
    #[must_use]
    pub fn arrival() -> Self {
        Self::Arrival {
            arrival_radius: default_arrival_radius(),
            slowing_radius: default_slowing_radius(),
            max_force: default_arrival_force(),
        }
    }

    /// Separation with default parameters.
    #[must_use]
    pub fn separation() -> Self {
        Self::Separation {
            separation_radius: default_separation_radius(),
            max_force: default_separation_force(),
        }
    }

    /// Attack with an empty (straight-ahead) direction table.
    #[must_use]
    pub fn attack() -> Self {
        Self::Attack {
            directions: DirectionTable::default(),
            max_force: default_attack_force(),
        }
    }

    /// Fear with default parameters.
    #[must_use]
    pub fn fear() -> Self {
        Self::Fear {
            duration: default_fear_duration(),
            hesitation_chance: default_hesitation_chance(),
            max_force: default_fear_force(),
        }
    }

    /// Which generator these parameters configure.
    #[must_use]
    pub const fn kind(&self) -> BehaviorKind {
        match self {
            Self::Seek { .. } => BehaviorKind::Seek,
            Self::Flee { .. } => BehaviorKind::Flee,
            Self::Arrival { .. } => BehaviorKind::Arrival,
            Self::Separation { .. } => BehaviorKind::Separation,
            Self::Attack { .. } => BehaviorKind::Attack,
            Self::Fear { .. } => BehaviorKind::Fear,
        }
    }

    /// Cap on this generator's own output.
    #[must_use]
    pub const fn max_force(&self) -> Fixed {
        match self {
            Self::Seek { max_force }
            | Self::Flee { max_force, .. }
            | Self::Arrival { max_force, .. }
            | Self::Separation { max_force, .. }
            | Self::Attack { max_force, .. }
            | Self::Fear { max_force, .. } => *max_force,
        }
    }
}

/// One entry in an archetype's behavior list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BehaviorTemplate {
    /// Multiplier on the generator's output, in `[0, 1]`.
    #[serde(with = "fixed_decimal", default = "unit_default")]
    pub weight: Fixed,
    /// Per-tick application chance, in `[0, 1]`.
    #[serde(with = "fixed_decimal", default = "unit_default")]
    pub probability: Fixed,
    /// Disabled templates are instantiated but never evaluated.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Generator parameters.
    pub params: BehaviorParams,
}

fn unit_default() -> Fixed {
    Fixed::ONE
}

const fn enabled_default() -> bool {
    true
}

impl BehaviorTemplate {
    /// Enabled template with weight and probability 1.
    #[must_use]
    pub fn new(params: BehaviorParams) -> Self {
        Self {
            weight: Fixed::ONE,
            probability: Fixed::ONE,
            enabled: true,
            params,
        }
    }

    /// Set the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: Fixed) -> Self {
        self.weight = weight;
        self
    }

    /// Set the application probability.
    #[must_use]
    pub fn with_probability(mut self, probability: Fixed) -> Self {
        self.probability = probability;
        self
    }

    /// Generator kind.
    #[must_use]
    pub const fn kind(&self) -> BehaviorKind {
        self.params.kind()
    }
}

/// Immutable agent archetype: a stat block plus an ordered behavior list.
///
/// # Example RON
///
/// ```ron
/// AgentConfig(
///     name: "spearman",
///     stats: AgentStats(move_speed: 4.0, attack_range: 2.5),
///     behaviors: [
///         BehaviorTemplate(params: Arrival(arrival_radius: 1.0, slowing_radius: 5.0)),
///         BehaviorTemplate(weight: 0.6, params: Separation(separation_radius: 2.0)),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Archetype name, used in logs and error messages.
    pub name: String,
    /// Stat block.
    #[serde(default)]
    pub stats: AgentStats,
    /// Behavior templates in evaluation order.
    #[serde(default)]
    pub behaviors: Vec<BehaviorTemplate>,
}

impl AgentConfig {
    /// Archetype with default stats and no behaviors.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: AgentStats::default(),
            behaviors: Vec::new(),
        }
    }

    /// Parse an archetype from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not a valid
    /// `AgentConfig`.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Template for a generator kind, if the archetype lists one.
    #[must_use]
    pub fn behavior(&self, kind: BehaviorKind) -> Option<&BehaviorTemplate> {
        self.behaviors.iter().find(|b| b.kind() == kind)
    }

    /// Check the archetype for values the simulation cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfiguration`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(GameError::InvalidConfiguration {
                name: self.name.clone(),
                reason,
            })
        };

        let stats = &self.stats;
        if stats.max_health <= Fixed::ZERO {
            return fail("max_health must be positive".into());
        }
        if stats.move_speed <= Fixed::ZERO {
            return fail("move_speed must be positive".into());
        }
        if stats.attack_speed <= Fixed::ZERO {
            return fail("attack_speed must be positive".into());
        }
        for (field, value) in [
            ("attack_power", stats.attack_power),
            ("attack_range", stats.attack_range),
            ("rotation_speed", stats.rotation_speed),
            ("max_force", stats.max_force),
        ] {
            if value < Fixed::ZERO {
                return fail(format!("{field} must not be negative"));
            }
        }

        let unit = Fixed::ZERO..=Fixed::ONE;
        for (index, template) in self.behaviors.iter().enumerate() {
            let kind = template.kind();
            if !unit.contains(&template.weight) {
                return fail(format!("behavior {index} ({kind:?}): weight outside [0, 1]"));
            }
            if !unit.contains(&template.probability) {
                return fail(format!(
                    "behavior {index} ({kind:?}): probability outside [0, 1]"
                ));
            }
            if template.params.max_force() < Fixed::ZERO {
                return fail(format!("behavior {index} ({kind:?}): negative max_force"));
            }
            match &template.params {
                BehaviorParams::Arrival {
                    arrival_radius,
                    slowing_radius,
                    ..
                } => {
                    if *arrival_radius < Fixed::ZERO || arrival_radius >= slowing_radius {
                        return fail(format!(
                            "behavior {index} (Arrival): need 0 <= arrival_radius < slowing_radius"
                        ));
                    }
                }
                BehaviorParams::Flee { flee_radius, .. } if *flee_radius < Fixed::ZERO => {
                    return fail(format!("behavior {index} (Flee): negative flee_radius"));
                }
                BehaviorParams::Separation {
                    separation_radius, ..
                } if *separation_radius <= Fixed::ZERO => {
                    return fail(format!(
                        "behavior {index} (Separation): separation_radius must be positive"
                    ));
                }
                BehaviorParams::Fear {
                    duration,
                    hesitation_chance,
                    ..
                } => {
                    if *duration < Fixed::ZERO {
                        return fail(format!("behavior {index} (Fear): negative duration"));
                    }
                    if !unit.contains(hesitation_chance) {
                        return fail(format!(
                            "behavior {index} (Fear): hesitation_chance outside [0, 1]"
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = AgentConfig::from_ron("inline", r#"AgentConfig(name: "grunt")"#).unwrap();
        assert_eq!(config.stats, AgentStats::default());
        assert!(config.behaviors.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_behaviors_with_decimals() {
        let text = r#"
            AgentConfig(
                name: "spearman",
                stats: AgentStats(move_speed: 4.5, attack_range: 2.5),
                behaviors: [
                    BehaviorTemplate(params: Arrival(arrival_radius: 1.0, slowing_radius: 5.0)),
                    BehaviorTemplate(
                        weight: 0.5,
                        probability: 0.25,
                        params: Fear(duration: 2.0, hesitation_chance: 1.0),
                    ),
                ],
            )
        "#;
        let config = AgentConfig::from_ron("spearman.ron", text).unwrap();
        assert_eq!(config.stats.move_speed, Fixed::from_num(4.5));
        assert_eq!(config.behaviors.len(), 2);
        assert_eq!(config.behaviors[1].weight, Fixed::from_num(0.5));
        assert_eq!(config.behaviors[1].probability, Fixed::from_num(0.25));
        assert_eq!(config.behaviors[1].params.max_force(), Fixed::from_num(15));
        assert!(config.behavior(BehaviorKind::Fear).is_some());
        assert!(config.behavior(BehaviorKind::Seek).is_none());
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = AgentConfig::from_ron("broken.ron", "AgentConfig(").unwrap_err();
        match err {
            GameError::DataParseError { source_name, .. } => assert_eq!(source_name, "broken.ron"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_inverted_arrival_radii() {
        let mut config = AgentConfig::new("bad");
        config.behaviors.push(BehaviorTemplate::new(BehaviorParams::Arrival {
            arrival_radius: Fixed::from_num(5),
            slowing_radius: Fixed::from_num(1),
            max_force: Fixed::from_num(10),
        }));
        assert!(matches!(
            config.validate(),
            Err(GameError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_probability() {
        let mut config = AgentConfig::new("bad");
        config
            .behaviors
            .push(BehaviorTemplate::new(BehaviorParams::seek()).with_probability(Fixed::from_num(2)));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_speed() {
        let mut config = AgentConfig::new("statue");
        config.stats.move_speed = Fixed::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_attack_cooldown_is_inverse_speed() {
        let stats = AgentStats {
            attack_speed: Fixed::from_num(2),
            ..AgentStats::default()
        };
        assert_eq!(stats.attack_cooldown(), Fixed::from_num(0.5));
    }
}
