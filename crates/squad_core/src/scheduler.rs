//! Deadline-keyed continuations.
//!
//! Multi-tick delays (attack windup, death grace, formation settle and
//! stagger) are queued here instead of blocking. Each tick the simulation
//! pops every continuation whose deadline has passed. A continuation
//! carries ids, not references, and its handler re-checks that those ids
//! still mean what they meant when it was queued.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, SquadId};
use crate::math::{fixed_serde, Fixed};

/// A delayed effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continuation {
    /// An attack windup finished; land the hit.
    AttackHit {
        /// Attacking agent.
        attacker: AgentId,
        /// Target when the attack started.
        target: AgentId,
    },
    /// A dead agent's grace period ended; remove it.
    Despawn {
        /// Agent to remove.
        agent: AgentId,
    },
    /// A squad's settle delay ended; start issuing slot orders.
    BeginReflow {
        /// Squad being reflowed.
        squad: SquadId,
        /// Reflow generation this continuation belongs to.
        generation: u64,
    },
    /// Send one member to its slot.
    AssignSlot {
        /// Owning squad.
        squad: SquadId,
        /// Reflow generation this continuation belongs to.
        generation: u64,
        /// Member to move.
        agent: AgentId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Scheduled {
    #[serde(with = "fixed_serde")]
    deadline: Fixed,
    sequence: u64,
    continuation: Continuation,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest deadline pops first.
        match other.deadline.cmp(&self.deadline) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of continuations ordered by deadline, then insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    heap: BinaryHeap<Scheduled>,
    next_sequence: u64,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a continuation to fire once `now >= deadline`.
    pub fn schedule(&mut self, deadline: Fixed, continuation: Continuation) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Scheduled {
            deadline,
            sequence,
            continuation,
        });
    }

    /// Pop the earliest continuation that is due at `now`.
    pub fn pop_due(&mut self, now: Fixed) -> Option<Continuation> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|s| s.continuation)
    }

    /// Deadline of the next continuation, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Fixed> {
        self.heap.peek().map(|s| s.deadline)
    }

    /// Number of pending continuations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending continuations in firing order.
    #[must_use]
    pub fn pending(&self) -> Vec<(Fixed, Continuation)> {
        let mut items: Vec<_> = self.heap.iter().collect();
        items.sort_by(|a, b| b.cmp(a));
        items
            .into_iter()
            .map(|s| (s.deadline, s.continuation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn despawn(agent: AgentId) -> Continuation {
        Continuation::Despawn { agent }
    }

    #[test]
    fn test_pops_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Fixed::from_num(3), despawn(3));
        scheduler.schedule(Fixed::from_num(1), despawn(1));
        scheduler.schedule(Fixed::from_num(2), despawn(2));

        let now = Fixed::from_num(10);
        assert_eq!(scheduler.pop_due(now), Some(despawn(1)));
        assert_eq!(scheduler.pop_due(now), Some(despawn(2)));
        assert_eq!(scheduler.pop_due(now), Some(despawn(3)));
        assert_eq!(scheduler.pop_due(now), None);
    }

    #[test]
    fn test_equal_deadlines_fire_in_insertion_order() {
        let mut scheduler = Scheduler::new();
        for agent in [5, 2, 9] {
            scheduler.schedule(Fixed::ONE, despawn(agent));
        }
        let fired: Vec<_> = std::iter::from_fn(|| scheduler.pop_due(Fixed::ONE)).collect();
        assert_eq!(fired, vec![despawn(5), despawn(2), despawn(9)]);
    }

    #[test]
    fn test_not_due_stays_queued() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Fixed::from_num(2), despawn(1));
        assert_eq!(scheduler.pop_due(Fixed::ONE), None);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_deadline(), Some(Fixed::from_num(2)));
        assert_eq!(scheduler.pop_due(Fixed::from_num(2)), Some(despawn(1)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_pending_lists_firing_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Fixed::from_num(2), despawn(2));
        scheduler.schedule(Fixed::ONE, despawn(1));
        let order: Vec<_> = scheduler.pending().into_iter().map(|(_, c)| c).collect();
        assert_eq!(order, vec![despawn(1), despawn(2)]);
    }
}
