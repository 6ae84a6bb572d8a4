//! Target acquisition utilities.
//!
//! Shared by the FSM (enemy search) and by the Attack behavior (approach
//! direction sampling).

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, vec2_decimal, Fixed, Vec2Fixed};
use crate::rng::SimRng;
use crate::spatial::SpatialEntry;

/// Find the candidate nearest to `origin` within `radius`.
///
/// Candidates failing `filter` or lying outside the radius are skipped.
/// Ties keep the first candidate encountered at the minimum distance.
/// Returns the winning entry and its squared distance.
pub fn find_nearest<I, F>(
    origin: Vec2Fixed,
    radius: Fixed,
    candidates: I,
    mut filter: F,
) -> Option<(SpatialEntry, Fixed)>
where
    I: IntoIterator<Item = SpatialEntry>,
    F: FnMut(&SpatialEntry) -> bool,
{
    let radius_sq = radius * radius;
    let mut best: Option<(SpatialEntry, Fixed)> = None;

    for candidate in candidates {
        if !filter(&candidate) {
            continue;
        }
        let dist_sq = origin.distance_squared(candidate.position);
        if dist_sq > radius_sq {
            continue;
        }
        match best {
            Some((_, best_dist)) if dist_sq >= best_dist => {}
            _ => best = Some((candidate, dist_sq)),
        }
    }

    best
}

/// One weighted direction in a [`DirectionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionEntry {
    /// Local-space direction (normalized when sampled).
    #[serde(with = "vec2_decimal")]
    pub direction: Vec2Fixed,
    /// Relative weight in `[0, 1]`.
    #[serde(with = "fixed_decimal")]
    pub weight: Fixed,
}

impl DirectionEntry {
    /// Create an entry, clamping the weight into `[0, 1]`.
    #[must_use]
    pub fn new(direction: Vec2Fixed, weight: Fixed) -> Self {
        Self {
            direction,
            weight: weight.clamp(Fixed::ZERO, Fixed::ONE),
        }
    }
}

/// Ordered list of weighted directions.
///
/// Entries are plain values: mutate through [`DirectionTable::set`] rather
/// than through references into the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectionTable {
    entries: Vec<DirectionEntry>,
}

impl DirectionTable {
    /// Build a table from entries (weights are clamped).
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = DirectionEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| DirectionEntry::new(e.direction, e.weight))
                .collect(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at an index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DirectionEntry> {
        self.entries.get(index).copied()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: DirectionEntry) {
        self.entries.push(DirectionEntry::new(entry.direction, entry.weight));
    }

    /// Replace the entry at `index`. Returns `false` if out of range.
    pub fn set(&mut self, index: usize, entry: DirectionEntry) -> bool {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = DirectionEntry::new(entry.direction, entry.weight);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<DirectionEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Pick a direction for a uniform draw in `[0, 1)`.
    ///
    /// Walks the entries in order accumulating normalized weights and
    /// returns the first whose cumulative weight reaches the draw. When all
    /// weights are zero every entry gets an equal share. An empty table
    /// yields [`Vec2Fixed::FORWARD`].
    #[must_use]
    pub fn pick(&self, draw: Fixed) -> Vec2Fixed {
        let Some(first) = self.entries.first() else {
            return Vec2Fixed::FORWARD;
        };

        let total: Fixed = self
            .entries
            .iter()
            .map(|e| e.weight.clamp(Fixed::ZERO, Fixed::ONE))
            .fold(Fixed::ZERO, |acc, w| acc + w);
        let count = Fixed::from_num(self.entries.len());

        let mut cumulative = Fixed::ZERO;
        for entry in &self.entries {
            let share = if total > Fixed::ZERO {
                entry.weight.clamp(Fixed::ZERO, Fixed::ONE) / total
            } else {
                Fixed::ONE / count
            };
            cumulative += share;
            if draw <= cumulative {
                return entry.direction.normalize();
            }
        }

        // Rounding left the final cumulative weight just under the draw.
        first.direction.normalize()
    }

    /// Draw a weighted-random direction.
    pub fn sample(&self, rng: &mut SimRng) -> Vec2Fixed {
        if self.entries.len() <= 1 {
            return self.pick(Fixed::ZERO);
        }
        self.pick(rng.unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Faction;

    fn entry(id: u64, x: i32, y: i32, faction: Faction) -> SpatialEntry {
        SpatialEntry {
            id,
            faction,
            position: Vec2Fixed::from_ints(x, y),
        }
    }

    #[test]
    fn test_find_nearest_picks_minimum_distance() {
        let candidates = vec![
            entry(1, 5, 0, Faction::Raiders),
            entry(2, 2, 0, Faction::Raiders),
            entry(3, 8, 0, Faction::Raiders),
        ];
        let (best, dist_sq) =
            find_nearest(Vec2Fixed::ZERO, Fixed::from_num(10), candidates, |_| true).unwrap();
        assert_eq!(best.id, 2);
        assert_eq!(dist_sq, Fixed::from_num(4));
    }

    #[test]
    fn test_find_nearest_respects_radius_and_filter() {
        let candidates = vec![
            entry(1, 1, 0, Faction::Defenders),
            entry(2, 20, 0, Faction::Raiders),
        ];
        let result = find_nearest(Vec2Fixed::ZERO, Fixed::from_num(10), candidates, |c| {
            c.faction == Faction::Raiders
        });
        assert!(result.is_none());
    }

    #[test]
    fn test_find_nearest_tie_keeps_first() {
        let candidates = vec![
            entry(7, 3, 0, Faction::Raiders),
            entry(4, -3, 0, Faction::Raiders),
        ];
        let (best, _) =
            find_nearest(Vec2Fixed::ZERO, Fixed::from_num(5), candidates, |_| true).unwrap();
        assert_eq!(best.id, 7);
    }

    #[test]
    fn test_empty_table_returns_forward() {
        let table = DirectionTable::default();
        assert_eq!(table.pick(Fixed::from_num(0.3)), Vec2Fixed::FORWARD);
    }

    #[test]
    fn test_single_entry_always_returned() {
        let table = DirectionTable::new([DirectionEntry::new(
            Vec2Fixed::from_ints(0, 2),
            Fixed::from_num(0.2),
        )]);
        for draw in [0.0, 0.25, 0.5, 0.999] {
            assert_eq!(table.pick(Fixed::from_num(draw)), Vec2Fixed::FORWARD);
        }
    }

    #[test]
    fn test_weighted_pick_uses_cumulative_order() {
        let left = Vec2Fixed::from_ints(-1, 0);
        let right = Vec2Fixed::from_ints(1, 0);
        let table = DirectionTable::new([
            DirectionEntry::new(left, Fixed::from_num(0.25)),
            DirectionEntry::new(right, Fixed::from_num(0.75)),
        ]);
        assert_eq!(table.pick(Fixed::from_num(0.1)), left);
        assert_eq!(table.pick(Fixed::from_num(0.25)), left);
        assert_eq!(table.pick(Fixed::from_num(0.3)), right);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let a = Vec2Fixed::from_ints(1, 0);
        let b = Vec2Fixed::from_ints(0, 1);
        let table = DirectionTable::new([
            DirectionEntry::new(a, Fixed::ZERO),
            DirectionEntry::new(b, Fixed::ZERO),
        ]);
        assert_eq!(table.pick(Fixed::from_num(0.4)), a);
        assert_eq!(table.pick(Fixed::from_num(0.6)), b);
    }

    #[test]
    fn test_set_clamps_weight_and_rejects_out_of_range() {
        let mut table = DirectionTable::new([DirectionEntry::new(
            Vec2Fixed::FORWARD,
            Fixed::ONE,
        )]);
        assert!(table.set(
            0,
            DirectionEntry {
                direction: Vec2Fixed::FORWARD,
                weight: Fixed::from_num(3),
            }
        ));
        assert_eq!(table.get(0).unwrap().weight, Fixed::ONE);
        assert!(!table.set(5, DirectionEntry::new(Vec2Fixed::FORWARD, Fixed::ONE)));
    }
}
