//! A presentation sink that records every intent.
//!
//! Clones share one log, so a test keeps a handle while the simulation
//! owns the boxed sink.

use std::cell::RefCell;
use std::rc::Rc;

use squad_core::components::AgentId;
use squad_core::math::Fixed;
use squad_core::presentation::PresentationSink;

/// One presentation intent, in the order it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Entered Idle.
    Idle(AgentId),
    /// Started moving, or is closing on a target.
    Move(AgentId),
    /// Started moving toward nearby hostiles.
    CautiousMove(AgentId),
    /// Holding in melee range.
    CombatIdle(AgentId),
    /// Attack windup started.
    Attack {
        /// Attacker.
        agent: AgentId,
        /// Target.
        target: AgentId,
    },
    /// Damage landed.
    Hit {
        /// Damaged agent.
        agent: AgentId,
        /// Health left.
        remaining: Fixed,
        /// Maximum health.
        max: Fixed,
    },
    /// Died.
    Death(AgentId),
    /// Entered Defend.
    Defend(AgentId),
    /// Entered Flee.
    Flee(AgentId),
    /// Fear episode started.
    Fear {
        /// Frightened agent.
        agent: AgentId,
        /// Hesitation rather than panic.
        hesitating: bool,
    },
}

impl Intent {
    /// Agent the intent is about.
    #[must_use]
    pub const fn agent(&self) -> AgentId {
        match *self {
            Self::Idle(agent)
            | Self::Move(agent)
            | Self::CautiousMove(agent)
            | Self::CombatIdle(agent)
            | Self::Death(agent)
            | Self::Defend(agent)
            | Self::Flee(agent)
            | Self::Attack { agent, .. }
            | Self::Hit { agent, .. }
            | Self::Fear { agent, .. } => agent,
        }
    }
}

/// Records intents and optionally overrides completion durations.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Rc<RefCell<Vec<Intent>>>,
    attack_duration: Option<Fixed>,
    death_duration: Option<Fixed>,
}

impl RecordingSink {
    /// Sink that reports no durations, so the simulation defaults apply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this windup for every attack.
    #[must_use]
    pub fn with_attack_duration(mut self, duration: Fixed) -> Self {
        self.attack_duration = Some(duration);
        self
    }

    /// Report this grace period for every death.
    #[must_use]
    pub fn with_death_duration(mut self, duration: Fixed) -> Self {
        self.death_duration = Some(duration);
        self
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn intents(&self) -> Vec<Intent> {
        self.log.borrow().clone()
    }

    /// Intents about one agent.
    #[must_use]
    pub fn intents_for(&self, agent: AgentId) -> Vec<Intent> {
        self.log
            .borrow()
            .iter()
            .filter(|i| i.agent() == agent)
            .copied()
            .collect()
    }

    /// Number of recorded intents matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Intent) -> bool) -> usize {
        self.log.borrow().iter().filter(|i| predicate(i)).count()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    fn push(&self, intent: Intent) {
        self.log.borrow_mut().push(intent);
    }
}

impl PresentationSink for RecordingSink {
    fn on_idle(&mut self, agent: AgentId) {
        self.push(Intent::Idle(agent));
    }

    fn on_move(&mut self, agent: AgentId) {
        self.push(Intent::Move(agent));
    }

    fn on_cautious_move(&mut self, agent: AgentId) {
        self.push(Intent::CautiousMove(agent));
    }

    fn on_combat_idle(&mut self, agent: AgentId) {
        self.push(Intent::CombatIdle(agent));
    }

    fn on_attack(&mut self, agent: AgentId, target: AgentId) -> Option<Fixed> {
        self.push(Intent::Attack { agent, target });
        self.attack_duration
    }

    fn on_hit(&mut self, agent: AgentId, remaining: Fixed, max: Fixed) {
        self.push(Intent::Hit {
            agent,
            remaining,
            max,
        });
    }

    fn on_death(&mut self, agent: AgentId) -> Option<Fixed> {
        self.push(Intent::Death(agent));
        self.death_duration
    }

    fn on_defend(&mut self, agent: AgentId) {
        self.push(Intent::Defend(agent));
    }

    fn on_flee(&mut self, agent: AgentId) {
        self.push(Intent::Flee(agent));
    }

    fn on_fear(&mut self, agent: AgentId, hesitating: bool) {
        self.push(Intent::Fear { agent, hesitating });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_log() {
        let sink = RecordingSink::new().with_death_duration(Fixed::ONE);
        let mut owned = sink.clone();
        owned.on_idle(3);
        assert_eq!(owned.on_death(3), Some(Fixed::ONE));
        assert_eq!(sink.intents(), vec![Intent::Idle(3), Intent::Death(3)]);
        assert_eq!(sink.intents_for(4), vec![]);
        sink.clear();
        assert_eq!(owned.count(|_| true), 0);
    }
}
