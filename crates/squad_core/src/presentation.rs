//! Presentation intents emitted by the simulation.
//!
//! The core never waits on animation. Where it needs to know how long a
//! presented action takes (attack windup, death sequence) the sink returns
//! a duration and the simulation schedules the follow-up itself.

use std::fmt::Debug;

use crate::components::AgentId;
use crate::math::Fixed;

/// Receiver for presentation intents. Every method defaults to a no-op.
pub trait PresentationSink: Debug {
    /// Agent went idle.
    fn on_idle(&mut self, _agent: AgentId) {}

    /// Agent started moving normally.
    fn on_move(&mut self, _agent: AgentId) {}

    /// Agent started moving toward a destination near hostiles.
    fn on_cautious_move(&mut self, _agent: AgentId) {}

    /// Agent is in range of its target and holding a combat stance.
    fn on_combat_idle(&mut self, _agent: AgentId) {}

    /// Agent began an attack against `target`.
    ///
    /// Returns the windup before the hit lands, or `None` for the
    /// configured default.
    fn on_attack(&mut self, _agent: AgentId, _target: AgentId) -> Option<Fixed> {
        None
    }

    /// Agent took damage; `remaining` is its health afterwards.
    fn on_hit(&mut self, _agent: AgentId, _remaining: Fixed, _max: Fixed) {}

    /// Agent died.
    ///
    /// Returns how long the body lingers before removal, or `None` for the
    /// configured default.
    fn on_death(&mut self, _agent: AgentId) -> Option<Fixed> {
        None
    }

    /// Agent took up a defensive stance.
    fn on_defend(&mut self, _agent: AgentId) {}

    /// Agent started fleeing.
    fn on_flee(&mut self, _agent: AgentId) {}

    /// Agent was struck by fear. `hesitating` is false for a panicked run.
    fn on_fear(&mut self, _agent: AgentId, _hesitating: bool) {}
}

/// Sink that ignores every intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {}
