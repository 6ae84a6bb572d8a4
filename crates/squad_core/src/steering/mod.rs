//! Steering behavior engine.
//!
//! Each agent carries a list of [`Behavior`]s instantiated from its
//! archetype. Every tick [`evaluate`] asks each enabled behavior whether it
//! applies, scales its force by its weight, sums the forces and caps the
//! sum at the agent's steering limit.
//!
//! Behaviors never touch other agents directly. Attacks and fear episodes
//! are reported back as [`SteeringEffects`] for the simulation to schedule
//! and present.

pub mod forces;

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, Faction};
use crate::data::{BehaviorKind, BehaviorParams, BehaviorTemplate};
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::rng::SimRng;
use crate::spatial::SpatialQuery;

/// Per-agent view of the world used while computing forces.
#[derive(Debug, Clone, Copy)]
pub struct SteeringContext<'a> {
    /// Agent being steered.
    pub agent: AgentId,
    /// Agent faction (Separation only considers allies).
    pub faction: Faction,
    /// Agent position.
    pub position: Vec2Fixed,
    /// Agent facing.
    pub yaw: Fixed,
    /// Agent velocity.
    pub velocity: Vec2Fixed,
    /// Agent maximum speed.
    pub move_speed: Fixed,
    /// Agent attack range.
    pub attack_range: Fixed,
    /// Seconds between attacks.
    pub attack_cooldown: Fixed,
    /// Target agent and its position, when the target is alive.
    pub target_agent: Option<(AgentId, Vec2Fixed)>,
    /// Position to seek or flee: the target agent if any, else the
    /// target point.
    pub target_position: Option<Vec2Fixed>,
    /// Neighbour lookup.
    pub spatial: &'a dyn SpatialQuery,
    /// Current simulation time in seconds.
    pub now: Fixed,
}

/// Side effects produced while computing forces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SteeringEffects {
    /// An attack was started against this target.
    pub attack_started: Option<AgentId>,
    /// A fear episode started; `true` for hesitation.
    pub fear_started: Option<bool>,
}

/// Result of one steering evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SteeringOutput {
    /// Combined force, capped at the agent's limit.
    pub force: Vec2Fixed,
    /// Side effects to act on.
    pub effects: SteeringEffects,
}

/// What a fear episode does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FearMode {
    /// Hold still.
    Hesitate,
    /// Run along a fixed direction.
    Panic(Vec2Fixed),
}

/// Mutable state some behaviors keep between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorRuntime {
    /// No state.
    Stateless,
    /// Attack cooldown and windup tracking.
    Attack {
        /// When the last attack started.
        #[serde(with = "option_fixed_serde")]
        last_attack: Option<Fixed>,
        /// An attack is winding up; no new attack may start.
        busy: bool,
    },
    /// Fear episode tracking.
    Fear {
        /// When the current episode ends (an episode is active while
        /// `now < fear_end`).
        #[serde(with = "option_fixed_serde")]
        fear_end: Option<Fixed>,
        /// Mode of the current or last episode.
        mode: FearMode,
    },
}

/// One force generator attached to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Behavior {
    #[serde(with = "fixed_serde")]
    weight: Fixed,
    #[serde(with = "fixed_serde")]
    probability: Fixed,
    /// Disabled behaviors are skipped entirely.
    pub enabled: bool,
    params: BehaviorParams,
    runtime: BehaviorRuntime,
}

impl Behavior {
    /// Instantiate a behavior from its template, clamping weight and
    /// probability into `[0, 1]`.
    #[must_use]
    pub fn from_template(template: &BehaviorTemplate) -> Self {
        let runtime = match template.params {
            BehaviorParams::Attack { .. } => BehaviorRuntime::Attack {
                last_attack: None,
                busy: false,
            },
            BehaviorParams::Fear { .. } => BehaviorRuntime::Fear {
                fear_end: None,
                mode: FearMode::Hesitate,
            },
            _ => BehaviorRuntime::Stateless,
        };
        let mut behavior = Self {
            weight: Fixed::ZERO,
            probability: Fixed::ZERO,
            enabled: template.enabled,
            params: template.params.clone(),
            runtime,
        };
        behavior.set_weight(template.weight);
        behavior.set_probability(template.probability);
        behavior
    }

    /// Generator kind.
    #[must_use]
    pub const fn kind(&self) -> BehaviorKind {
        self.params.kind()
    }

    /// Generator parameters.
    #[must_use]
    pub const fn params(&self) -> &BehaviorParams {
        &self.params
    }

    /// Current runtime state.
    #[must_use]
    pub const fn runtime(&self) -> &BehaviorRuntime {
        &self.runtime
    }

    /// Weight in `[0, 1]`.
    #[must_use]
    pub const fn weight(&self) -> Fixed {
        self.weight
    }

    /// Set the weight (clamped to `[0, 1]`).
    pub fn set_weight(&mut self, weight: Fixed) {
        self.weight = weight.clamp(Fixed::ZERO, Fixed::ONE);
    }

    /// Application probability in `[0, 1]`.
    #[must_use]
    pub const fn probability(&self) -> Fixed {
        self.probability
    }

    /// Set the application probability (clamped to `[0, 1]`).
    pub fn set_probability(&mut self, probability: Fixed) {
        self.probability = probability.clamp(Fixed::ZERO, Fixed::ONE);
    }

    /// Check whether a fear episode is running at `now`.
    #[must_use]
    pub fn is_afraid(&self, now: Fixed) -> bool {
        matches!(self.runtime, BehaviorRuntime::Fear { fear_end: Some(end), .. } if now < end)
    }

    /// Check whether an attack is winding up.
    #[must_use]
    pub fn is_attacking(&self) -> bool {
        matches!(self.runtime, BehaviorRuntime::Attack { busy: true, .. })
    }

    /// Clear the windup flag once the hit has been resolved.
    pub fn finish_attack(&mut self) {
        if let BehaviorRuntime::Attack { busy, .. } = &mut self.runtime {
            *busy = false;
        }
    }

    /// Probability gate for this tick.
    ///
    /// A running fear episode always applies; everything else is a
    /// Bernoulli draw against the probability.
    pub fn should_apply(&self, now: Fixed, rng: &mut SimRng) -> bool {
        if self.is_afraid(now) {
            return true;
        }
        rng.chance(self.probability)
    }

    /// This behavior's unweighted force, capped at its own limit.
    pub fn calculate_force(
        &mut self,
        ctx: &SteeringContext<'_>,
        rng: &mut SimRng,
        effects: &mut SteeringEffects,
    ) -> Vec2Fixed {
        let probability = self.probability;
        match (&self.params, &mut self.runtime) {
            (BehaviorParams::Seek { max_force }, _) => match ctx.target_position {
                Some(target) => {
                    forces::seek(ctx.position, target, ctx.velocity, ctx.move_speed, *max_force)
                }
                None => Vec2Fixed::ZERO,
            },

            (
                BehaviorParams::Flee {
                    flee_radius,
                    max_force,
                },
                _,
            ) => match ctx.target_position {
                Some(threat) => forces::flee(
                    ctx.position,
                    threat,
                    ctx.velocity,
                    ctx.move_speed,
                    *flee_radius,
                    *max_force,
                ),
                None => Vec2Fixed::ZERO,
            },

            (
                BehaviorParams::Arrival {
                    arrival_radius,
                    slowing_radius,
                    max_force,
                },
                _,
            ) => match ctx.target_position {
                Some(target) => forces::arrival(
                    ctx.position,
                    target,
                    ctx.velocity,
                    ctx.move_speed,
                    *arrival_radius,
                    *slowing_radius,
                    *max_force,
                ),
                None => Vec2Fixed::ZERO,
            },

            (
                BehaviorParams::Separation {
                    separation_radius,
                    max_force,
                },
                _,
            ) => {
                let neighbours =
                    ctx.spatial
                        .query_radius(ctx.position, *separation_radius, ctx.faction.mask());
                forces::separation(
                    ctx.agent,
                    ctx.position,
                    &neighbours,
                    ctx.velocity,
                    ctx.move_speed,
                    *max_force,
                )
            }

            (
                BehaviorParams::Attack {
                    directions,
                    max_force,
                },
                BehaviorRuntime::Attack { last_attack, busy },
            ) => {
                let Some((target, target_pos)) = ctx.target_agent else {
                    return Vec2Fixed::ZERO;
                };
                if ctx.position.distance(target_pos) <= ctx.attack_range {
                    let ready = last_attack.map_or(true, |t| ctx.now >= t + ctx.attack_cooldown);
                    if ready && !*busy {
                        *last_attack = Some(ctx.now);
                        *busy = true;
                        effects.attack_started = Some(target);
                    }
                    return forces::brake(ctx.velocity, *max_force);
                }
                let local = directions.sample(rng);
                let point = forces::approach_point(target_pos, local, ctx.yaw, ctx.attack_range);
                forces::seek(ctx.position, point, ctx.velocity, ctx.move_speed, *max_force)
            }

            (
                BehaviorParams::Fear {
                    duration,
                    hesitation_chance,
                    max_force,
                },
                BehaviorRuntime::Fear { fear_end, mode },
            ) => {
                let running = |end: Option<Fixed>| end.is_some_and(|e| ctx.now < e);
                // An episode is never resampled while it runs.
                if !running(*fear_end) && rng.chance(probability) {
                    *fear_end = Some(ctx.now + *duration);
                    *mode = if rng.chance(*hesitation_chance) {
                        FearMode::Hesitate
                    } else {
                        FearMode::Panic(rng.unit_direction())
                    };
                    effects.fear_started = Some(matches!(mode, FearMode::Hesitate));
                }
                if !running(*fear_end) {
                    return Vec2Fixed::ZERO;
                }
                match *mode {
                    FearMode::Hesitate => forces::brake(ctx.velocity, *max_force),
                    FearMode::Panic(direction) => forces::steer(
                        direction.scale(ctx.move_speed),
                        ctx.velocity,
                        *max_force,
                    ),
                }
            }

            // Attack and Fear always carry their own runtime.
            (BehaviorParams::Attack { .. } | BehaviorParams::Fear { .. }, _) => Vec2Fixed::ZERO,
        }
    }
}

/// Build an agent's behavior list from archetype templates.
///
/// Only the first template of each kind is used; later duplicates are
/// dropped with a warning.
#[must_use]
pub fn instantiate(templates: &[BehaviorTemplate], archetype: &str) -> Vec<Behavior> {
    let mut behaviors: Vec<Behavior> = Vec::with_capacity(templates.len());
    for template in templates {
        if behaviors.iter().any(|b| b.kind() == template.kind()) {
            tracing::warn!(
                archetype,
                kind = ?template.kind(),
                "Duplicate behavior template ignored"
            );
            continue;
        }
        behaviors.push(Behavior::from_template(template));
    }
    behaviors
}

/// Evaluate an agent's behaviors for one tick.
///
/// `allowed` gates behaviors by kind (the FSM state's filter). Gated and
/// disabled behaviors consume no randomness. The weighted sum is capped at
/// `max_force`.
pub fn evaluate(
    behaviors: &mut [Behavior],
    ctx: &SteeringContext<'_>,
    allowed: impl Fn(BehaviorKind) -> bool,
    max_force: Fixed,
    rng: &mut SimRng,
) -> SteeringOutput {
    let mut effects = SteeringEffects::default();
    let mut total = Vec2Fixed::ZERO;

    for behavior in behaviors.iter_mut() {
        if !behavior.enabled || !allowed(behavior.kind()) {
            continue;
        }
        if !behavior.should_apply(ctx.now, rng) {
            continue;
        }
        let force = behavior.calculate_force(ctx, rng, &mut effects);
        total += force.scale(behavior.weight);
    }

    SteeringOutput {
        force: total.clamp_length(max_force),
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{LinearScan, SpatialEntry};

    fn context<'a>(spatial: &'a LinearScan) -> SteeringContext<'a> {
        SteeringContext {
            agent: 1,
            faction: Faction::Defenders,
            position: Vec2Fixed::ZERO,
            yaw: Fixed::ZERO,
            velocity: Vec2Fixed::from_ints(1, 2),
            move_speed: Fixed::from_num(5),
            attack_range: Fixed::from_num(2),
            attack_cooldown: Fixed::ONE,
            target_agent: None,
            target_position: None,
            spatial,
            now: Fixed::ZERO,
        }
    }

    fn behavior(params: BehaviorParams) -> Behavior {
        Behavior::from_template(&BehaviorTemplate::new(params))
    }

    #[test]
    fn test_template_values_are_clamped() {
        let template = BehaviorTemplate::new(BehaviorParams::seek())
            .with_weight(Fixed::from_num(4))
            .with_probability(Fixed::from_num(-1));
        let behavior = Behavior::from_template(&template);
        assert_eq!(behavior.weight(), Fixed::ONE);
        assert_eq!(behavior.probability(), Fixed::ZERO);
    }

    #[test]
    fn test_attack_in_range_brakes_and_starts_attack() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        ctx.target_agent = Some((9, Vec2Fixed::new(Fixed::from_num(1.5), Fixed::ZERO)));
        ctx.target_position = ctx.target_agent.map(|(_, p)| p);

        let mut attack = behavior(BehaviorParams::attack());
        let mut rng = SimRng::new(1);
        let mut effects = SteeringEffects::default();
        let force = attack.calculate_force(&ctx, &mut rng, &mut effects);

        assert_eq!(force, -ctx.velocity);
        assert_eq!(effects.attack_started, Some(9));
        assert!(attack.is_attacking());
    }

    #[test]
    fn test_busy_attack_does_not_restart() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        ctx.target_agent = Some((9, Vec2Fixed::from_ints(1, 0)));
        let mut attack = behavior(BehaviorParams::attack());
        let mut rng = SimRng::new(1);

        let mut first = SteeringEffects::default();
        let _ = attack.calculate_force(&ctx, &mut rng, &mut first);
        ctx.now = Fixed::from_num(5);
        let mut second = SteeringEffects::default();
        let _ = attack.calculate_force(&ctx, &mut rng, &mut second);
        assert_eq!(second.attack_started, None);

        attack.finish_attack();
        let mut third = SteeringEffects::default();
        let _ = attack.calculate_force(&ctx, &mut rng, &mut third);
        assert_eq!(third.attack_started, Some(9));
    }

    #[test]
    fn test_attack_respects_cooldown() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        ctx.target_agent = Some((9, Vec2Fixed::from_ints(1, 0)));
        let mut attack = behavior(BehaviorParams::attack());
        let mut rng = SimRng::new(1);

        let _ = attack.calculate_force(&ctx, &mut rng, &mut SteeringEffects::default());
        attack.finish_attack();
        ctx.now = Fixed::from_num(0.5);
        let mut effects = SteeringEffects::default();
        let _ = attack.calculate_force(&ctx, &mut rng, &mut effects);
        assert_eq!(effects.attack_started, None);
    }

    #[test]
    fn test_fear_with_certain_hesitation_always_hesitates() {
        let spatial = LinearScan::new();
        let ctx = context(&spatial);
        for seed in 0..32 {
            let mut fear = behavior(BehaviorParams::Fear {
                duration: Fixed::from_num(2),
                hesitation_chance: Fixed::ONE,
                max_force: Fixed::from_num(15),
            });
            let mut rng = SimRng::new(seed);
            let mut effects = SteeringEffects::default();
            let force = fear.calculate_force(&ctx, &mut rng, &mut effects);
            assert_eq!(effects.fear_started, Some(true));
            assert_eq!(force, -ctx.velocity);
        }
    }

    #[test]
    fn test_fear_persists_then_expires() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        let mut fear = behavior(BehaviorParams::fear());
        let mut rng = SimRng::new(4);
        let _ = fear.calculate_force(&ctx, &mut rng, &mut SteeringEffects::default());
        assert!(fear.is_afraid(Fixed::ONE));

        // The gate passes mid-episode even at zero probability.
        fear.set_probability(Fixed::ZERO);
        ctx.now = Fixed::ONE;
        assert!(fear.should_apply(ctx.now, &mut rng));

        ctx.now = Fixed::from_num(3);
        assert!(!fear.should_apply(ctx.now, &mut rng));
        let force = fear.calculate_force(&ctx, &mut rng, &mut SteeringEffects::default());
        assert_eq!(force, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_zero_weight_still_triggers_attack() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        ctx.target_agent = Some((4, Vec2Fixed::from_ints(1, 0)));
        let template = BehaviorTemplate::new(BehaviorParams::attack()).with_weight(Fixed::ZERO);
        let mut behaviors = vec![Behavior::from_template(&template)];
        let mut rng = SimRng::new(2);
        let out = evaluate(&mut behaviors, &ctx, |_| true, Fixed::from_num(10), &mut rng);
        assert_eq!(out.force, Vec2Fixed::ZERO);
        assert_eq!(out.effects.attack_started, Some(4));
    }

    #[test]
    fn test_gated_kinds_are_skipped() {
        let spatial = LinearScan::new();
        let mut ctx = context(&spatial);
        ctx.target_position = Some(Vec2Fixed::from_ints(10, 0));
        let mut behaviors = vec![behavior(BehaviorParams::seek())];
        let mut rng = SimRng::new(2);
        let out = evaluate(
            &mut behaviors,
            &ctx,
            |kind| kind != BehaviorKind::Seek,
            Fixed::from_num(10),
            &mut rng,
        );
        assert_eq!(out.force, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_combined_force_is_capped() {
        let mut spatial = LinearScan::new();
        spatial.rebuild(&[SpatialEntry {
            id: 2,
            faction: Faction::Defenders,
            position: Vec2Fixed::new(Fixed::from_num(-0.5), Fixed::ZERO),
        }]);
        let mut ctx = context(&spatial);
        ctx.target_position = Some(Vec2Fixed::from_ints(10, 0));
        let mut behaviors = instantiate(
            &[
                BehaviorTemplate::new(BehaviorParams::seek()),
                BehaviorTemplate::new(BehaviorParams::separation()),
            ],
            "test",
        );
        let mut rng = SimRng::new(2);
        let cap = Fixed::from_num(3);
        let out = evaluate(&mut behaviors, &ctx, |_| true, cap, &mut rng);
        assert!(out.force.length() <= cap);
    }

    #[test]
    fn test_duplicate_templates_keep_first() {
        let behaviors = instantiate(
            &[
                BehaviorTemplate::new(BehaviorParams::seek()).with_weight(Fixed::from_num(0.5)),
                BehaviorTemplate::new(BehaviorParams::seek()),
            ],
            "dupes",
        );
        assert_eq!(behaviors.len(), 1);
        assert_eq!(behaviors[0].weight(), Fixed::from_num(0.5));
    }
}
