//! Formation layouts.
//!
//! A layout maps slot indices to offsets in the squad's local frame
//! (`+y` forward, `+x` right). The first nine slots follow the classic
//! 3×3 tables; larger squads extend each layout along its own axis.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};

/// Named formation layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormationType {
    /// Grid three wide.
    #[default]
    Square,
    /// Single row across the facing.
    Line,
    /// Single file along the facing.
    Column,
    /// Wedge with the point forward.
    V,
}

/// Spacing factor for Line and Column slots.
fn file_spacing_factor() -> Fixed {
    Fixed::from_num(0.75)
}

/// Hand-placed V slots, in units of spacing.
const V_SLOTS: [(i32, i32); 9] = [
    (0, 2),   // point
    (-1, 1),  // left mid
    (1, 1),   // right mid
    (-2, 0),  // left rear
    (0, 0),   // centre rear
    (2, 0),   // right rear
    (-3, -1), // far left
    (-1, -1), // mid left rear
    (1, -1),  // mid right rear
];

impl FormationType {
    /// Local offset of `slot` at the given spacing.
    #[must_use]
    pub fn offset(self, slot: usize, spacing: Fixed) -> Vec2Fixed {
        let index = slot_as_fixed(slot);
        match self {
            Self::Square => {
                let row = slot_as_fixed(slot / 3) - Fixed::ONE;
                let column = slot_as_fixed(slot % 3) - Fixed::ONE;
                Vec2Fixed::new(row * spacing, column * spacing)
            }
            Self::Line => {
                let x = (index - Fixed::from_num(4)) * spacing * file_spacing_factor();
                Vec2Fixed::new(x, Fixed::ZERO)
            }
            Self::Column => {
                let y = (index - Fixed::from_num(4)) * spacing * file_spacing_factor();
                Vec2Fixed::new(Fixed::ZERO, y)
            }
            Self::V => {
                if let Some(&(x, y)) = V_SLOTS.get(slot) {
                    return Vec2Fixed::from_ints(x, y).scale(spacing);
                }
                // Extra slots trail the wings, alternating left and right.
                let extra = slot - V_SLOTS.len();
                let depth = slot_as_fixed(extra / 2 + 2);
                let side = if extra % 2 == 0 { -Fixed::ONE } else { Fixed::ONE };
                Vec2Fixed::new(side * (depth + Fixed::from_num(2)), -depth).scale(spacing)
            }
        }
    }

    /// Offsets for slots `0..capacity`.
    #[must_use]
    pub fn offsets(self, capacity: usize, spacing: Fixed) -> Vec<Vec2Fixed> {
        (0..capacity).map(|slot| self.offset(slot, spacing)).collect()
    }
}

fn slot_as_fixed(slot: usize) -> Fixed {
    Fixed::from_num(u32::try_from(slot).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spacing() -> Fixed {
        Fixed::from_num(2)
    }

    #[test]
    fn test_square_is_centred_grid() {
        let offsets = FormationType::Square.offsets(9, spacing());
        assert_eq!(offsets[0], Vec2Fixed::from_ints(-2, -2));
        assert_eq!(offsets[4], Vec2Fixed::ZERO);
        assert_eq!(offsets[8], Vec2Fixed::from_ints(2, 2));
        assert_eq!(offsets[5], Vec2Fixed::from_ints(0, 2));
    }

    #[test]
    fn test_line_and_column_centre_on_slot_four() {
        let line = FormationType::Line.offsets(9, spacing());
        let column = FormationType::Column.offsets(9, spacing());
        assert_eq!(line[4], Vec2Fixed::ZERO);
        assert_eq!(line[0], Vec2Fixed::new(Fixed::from_num(-6), Fixed::ZERO));
        assert_eq!(column[8], Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(6)));
    }

    #[test]
    fn test_v_point_leads() {
        let v = FormationType::V.offsets(9, spacing());
        assert_eq!(v[0], Vec2Fixed::from_ints(0, 4));
        assert!(v.iter().skip(1).all(|o| o.y < v[0].y));
    }

    #[test]
    fn test_v_extends_past_nine_slots() {
        let v = FormationType::V.offsets(12, spacing());
        assert_eq!(v.len(), 12);
        assert!(v[9].x < Fixed::ZERO);
        assert!(v[10].x > Fixed::ZERO);
        assert_eq!(v[9].y, v[10].y);
        assert!(v[11].y < v[9].y);
    }

    #[test]
    fn test_offsets_are_deterministic() {
        for formation in [
            FormationType::Square,
            FormationType::Line,
            FormationType::Column,
            FormationType::V,
        ] {
            assert_eq!(
                formation.offsets(9, spacing()),
                formation.offsets(9, spacing())
            );
        }
    }

    #[test]
    fn test_slots_are_distinct() {
        for formation in [
            FormationType::Square,
            FormationType::Line,
            FormationType::Column,
            FormationType::V,
        ] {
            let offsets = formation.offsets(15, spacing());
            for (i, a) in offsets.iter().enumerate() {
                for b in &offsets[i + 1..] {
                    assert_ne!(a, b, "{formation:?} repeats a slot");
                }
            }
        }
    }
}
