//! Radius queries over living agents.
//!
//! The simulation rebuilds the index once per tick from a snapshot of
//! living agents, then every query during the tick reads that snapshot.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, Faction, FactionMask};
use crate::math::{Fixed, Vec2Fixed};

/// One agent as seen by spatial queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialEntry {
    /// Agent id.
    pub id: AgentId,
    /// Agent faction.
    pub faction: Faction,
    /// Position at the start of the tick.
    pub position: Vec2Fixed,
}

/// Injected radius-query capability.
pub trait SpatialQuery: Debug {
    /// Replace the indexed set. Entries arrive sorted by id.
    fn rebuild(&mut self, entries: &[SpatialEntry]);

    /// All entries within `radius` of `center` whose faction passes `mask`,
    /// in ascending id order.
    fn query_radius(&self, center: Vec2Fixed, radius: Fixed, mask: FactionMask) -> Vec<SpatialEntry>;
}

/// Brute-force index: scans every entry on each query.
#[derive(Debug, Clone, Default)]
pub struct LinearScan {
    entries: Vec<SpatialEntry>,
}

impl LinearScan {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialQuery for LinearScan {
    fn rebuild(&mut self, entries: &[SpatialEntry]) {
        self.entries.clear();
        self.entries.extend_from_slice(entries);
    }

    fn query_radius(&self, center: Vec2Fixed, radius: Fixed, mask: FactionMask) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        self.entries
            .iter()
            .filter(|e| mask.contains(e.faction))
            .filter(|e| e.position.distance_squared(center) <= radius_sq)
            .copied()
            .collect()
    }
}

/// Uniform-grid index for larger battles.
///
/// Buckets entries by cell; a query visits only the cells overlapping the
/// query square. Results are sorted by id to match [`LinearScan`].
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: Fixed,
    buckets: std::collections::HashMap<(i64, i64), Vec<SpatialEntry>>,
}

impl SpatialHash {
    /// Create an empty hash with the given cell size (clamped to at least 1).
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        Self {
            cell_size: cell_size.max(Fixed::ONE),
            buckets: std::collections::HashMap::new(),
        }
    }

    fn cell_of(&self, position: Vec2Fixed) -> (i64, i64) {
        (
            (position.x / self.cell_size).floor().to_num::<i64>(),
            (position.y / self.cell_size).floor().to_num::<i64>(),
        )
    }
}

impl SpatialQuery for SpatialHash {
    fn rebuild(&mut self, entries: &[SpatialEntry]) {
        self.buckets.clear();
        for entry in entries {
            let cell = self.cell_of(entry.position);
            self.buckets.entry(cell).or_default().push(*entry);
        }
    }

    fn query_radius(&self, center: Vec2Fixed, radius: Fixed, mask: FactionMask) -> Vec<SpatialEntry> {
        let radius = radius.max(Fixed::ZERO);
        let radius_sq = radius * radius;
        let offset = Vec2Fixed::new(radius, radius);
        let (min_x, min_y) = self.cell_of(center - offset);
        let (max_x, max_y) = self.cell_of(center + offset);

        let mut found = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                let Some(bucket) = self.buckets.get(&(cx, cy)) else {
                    continue;
                };
                found.extend(
                    bucket
                        .iter()
                        .filter(|e| mask.contains(e.faction))
                        .filter(|e| e.position.distance_squared(center) <= radius_sq)
                        .copied(),
                );
            }
        }
        found.sort_unstable_by_key(|e| e.id);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SpatialEntry> {
        vec![
            SpatialEntry {
                id: 1,
                faction: Faction::Defenders,
                position: Vec2Fixed::from_ints(0, 0),
            },
            SpatialEntry {
                id: 2,
                faction: Faction::Raiders,
                position: Vec2Fixed::from_ints(3, 0),
            },
            SpatialEntry {
                id: 3,
                faction: Faction::Raiders,
                position: Vec2Fixed::from_ints(-12, 4),
            },
            SpatialEntry {
                id: 4,
                faction: Faction::Defenders,
                position: Vec2Fixed::from_ints(0, 5),
            },
        ]
    }

    fn ids(entries: &[SpatialEntry]) -> Vec<AgentId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_linear_scan_filters_by_radius_and_mask() {
        let mut index = LinearScan::new();
        index.rebuild(&sample());
        let near = index.query_radius(Vec2Fixed::ZERO, Fixed::from_num(5), FactionMask::ALL);
        assert_eq!(ids(&near), vec![1, 2, 4]);
        let raiders = index.query_radius(Vec2Fixed::ZERO, Fixed::from_num(5), FactionMask::RAIDERS);
        assert_eq!(ids(&raiders), vec![2]);
    }

    #[test]
    fn test_spatial_hash_matches_linear_scan() {
        let mut linear = LinearScan::new();
        let mut hashed = SpatialHash::new(Fixed::from_num(4));
        linear.rebuild(&sample());
        hashed.rebuild(&sample());
        for (x, y, r) in [(0, 0, 5), (-10, 3, 3), (2, 2, 20), (50, 50, 1)] {
            let center = Vec2Fixed::from_ints(x, y);
            let radius = Fixed::from_num(r);
            assert_eq!(
                hashed.query_radius(center, radius, FactionMask::ALL),
                linear.query_radius(center, radius, FactionMask::ALL)
            );
        }
    }
}
