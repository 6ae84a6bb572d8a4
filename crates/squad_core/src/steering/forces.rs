//! Pure force generators.
//!
//! Every function follows the same model: work out a desired velocity,
//! return `desired - current`, and cap the result at the generator's own
//! force limit.

use crate::components::AgentId;
use crate::math::{Fixed, Vec2Fixed};
use crate::spatial::SpatialEntry;

/// Smallest separation distance used for inverse-distance repulsion.
#[must_use]
pub fn min_separation_distance() -> Fixed {
    Fixed::from_num(0.01)
}

/// Fraction of attack range at which the approach point sits off the target.
#[must_use]
pub fn approach_range_factor() -> Fixed {
    Fixed::from_num(0.8)
}

/// `desired - velocity`, capped at `max_force`.
#[must_use]
pub fn steer(desired: Vec2Fixed, velocity: Vec2Fixed, max_force: Fixed) -> Vec2Fixed {
    (desired - velocity).clamp_length(max_force)
}

/// Cancel the current velocity.
#[must_use]
pub fn brake(velocity: Vec2Fixed, max_force: Fixed) -> Vec2Fixed {
    (-velocity).clamp_length(max_force)
}

/// Head for `target` at full speed.
#[must_use]
pub fn seek(
    position: Vec2Fixed,
    target: Vec2Fixed,
    velocity: Vec2Fixed,
    move_speed: Fixed,
    max_force: Fixed,
) -> Vec2Fixed {
    let desired = (target - position).normalize().scale(move_speed);
    steer(desired, velocity, max_force)
}

/// Run from `threat` at full speed while it is within `flee_radius`.
#[must_use]
pub fn flee(
    position: Vec2Fixed,
    threat: Vec2Fixed,
    velocity: Vec2Fixed,
    move_speed: Fixed,
    flee_radius: Fixed,
    max_force: Fixed,
) -> Vec2Fixed {
    let away = position - threat;
    if away.length() > flee_radius {
        return Vec2Fixed::ZERO;
    }
    let desired = away.normalize().scale(move_speed);
    steer(desired, velocity, max_force)
}

/// Desired speed at `distance` from the target when slowing down.
///
/// Full speed beyond `slowing_radius`, then proportional to
/// `distance / slowing_radius`.
#[must_use]
pub fn arrival_desired_speed(distance: Fixed, slowing_radius: Fixed, move_speed: Fixed) -> Fixed {
    if distance > slowing_radius || slowing_radius <= Fixed::ZERO {
        move_speed
    } else {
        move_speed * (distance / slowing_radius)
    }
}

/// Seek that decelerates inside `slowing_radius` and brakes inside
/// `arrival_radius`.
#[must_use]
pub fn arrival(
    position: Vec2Fixed,
    target: Vec2Fixed,
    velocity: Vec2Fixed,
    move_speed: Fixed,
    arrival_radius: Fixed,
    slowing_radius: Fixed,
    max_force: Fixed,
) -> Vec2Fixed {
    let to_target = target - position;
    let distance = to_target.length();
    if distance < arrival_radius {
        return brake(velocity, max_force);
    }
    let speed = arrival_desired_speed(distance, slowing_radius, move_speed);
    steer(to_target.normalize().scale(speed), velocity, max_force)
}

/// Push away from neighbours, weighted by inverse distance.
///
/// `neighbours` may include the agent itself; it is skipped by id.
/// Neighbours sharing the exact position push along a fixed axis whose
/// sign depends on which id is smaller, so the pair splits apart.
#[must_use]
pub fn separation(
    self_id: AgentId,
    position: Vec2Fixed,
    neighbours: &[SpatialEntry],
    velocity: Vec2Fixed,
    move_speed: Fixed,
    max_force: Fixed,
) -> Vec2Fixed {
    let mut sum = Vec2Fixed::ZERO;
    let mut count = 0u32;

    for neighbour in neighbours.iter().filter(|n| n.id != self_id) {
        let away = position - neighbour.position;
        let distance = away.length();
        let direction = if distance == Fixed::ZERO {
            if self_id < neighbour.id {
                Vec2Fixed::new(-Fixed::ONE, Fixed::ZERO)
            } else {
                Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)
            }
        } else {
            away.normalize()
        };
        let distance = distance.max(min_separation_distance());
        sum += Vec2Fixed::new(direction.x / distance, direction.y / distance);
        count += 1;
    }

    if count == 0 {
        return Vec2Fixed::ZERO;
    }

    let count = Fixed::from_num(count);
    let average = Vec2Fixed::new(sum.x / count, sum.y / count);
    steer(average.normalize().scale(move_speed), velocity, max_force)
}

/// Point beside the target the attacker should head for.
///
/// `local_direction` is in the attacker's frame; it is rotated by the
/// attacker's yaw and placed at `0.8 * attack_range` from the target.
#[must_use]
pub fn approach_point(
    target: Vec2Fixed,
    local_direction: Vec2Fixed,
    yaw: Fixed,
    attack_range: Fixed,
) -> Vec2Fixed {
    let world = local_direction.rotated(yaw).normalize();
    target + world.scale(attack_range * approach_range_factor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Faction;

    fn approx(a: Fixed, b: Fixed) -> bool {
        (a - b).abs() < Fixed::from_num(0.0001)
    }

    #[test]
    fn test_arrival_desired_speed_inside_slowing_radius() {
        let speed = arrival_desired_speed(
            Fixed::from_num(3),
            Fixed::from_num(5),
            Fixed::from_num(10),
        );
        assert!(approx(speed, Fixed::from_num(6)));
    }

    #[test]
    fn test_arrival_full_speed_outside_slowing_radius() {
        let speed = arrival_desired_speed(
            Fixed::from_num(8),
            Fixed::from_num(5),
            Fixed::from_num(10),
        );
        assert_eq!(speed, Fixed::from_num(10));
    }

    #[test]
    fn test_arrival_brakes_inside_arrival_radius() {
        let velocity = Vec2Fixed::from_ints(2, 1);
        let force = arrival(
            Vec2Fixed::ZERO,
            Vec2Fixed::new(Fixed::from_num(0.5), Fixed::ZERO),
            velocity,
            Fixed::from_num(10),
            Fixed::ONE,
            Fixed::from_num(5),
            Fixed::from_num(10),
        );
        assert_eq!(force, -velocity);
    }

    #[test]
    fn test_seek_is_capped() {
        let force = seek(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_ints(100, 0),
            Vec2Fixed::from_ints(-20, 0),
            Fixed::from_num(10),
            Fixed::from_num(5),
        );
        assert!(force.length() <= Fixed::from_num(5));
        assert!(force.x > Fixed::ZERO);
    }

    #[test]
    fn test_flee_ignores_distant_threat() {
        let force = flee(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_ints(20, 0),
            Vec2Fixed::ZERO,
            Fixed::from_num(5),
            Fixed::from_num(10),
            Fixed::from_num(15),
        );
        assert_eq!(force, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_flee_points_away() {
        let force = flee(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_ints(3, 0),
            Vec2Fixed::ZERO,
            Fixed::from_num(5),
            Fixed::from_num(10),
            Fixed::from_num(15),
        );
        assert_eq!(force, Vec2Fixed::from_ints(-5, 0));
    }

    #[test]
    fn test_separation_without_neighbours_is_zero() {
        let own = [SpatialEntry {
            id: 1,
            faction: Faction::Defenders,
            position: Vec2Fixed::ZERO,
        }];
        let force = separation(
            1,
            Vec2Fixed::ZERO,
            &own,
            Vec2Fixed::from_ints(1, 1),
            Fixed::from_num(5),
            Fixed::from_num(15),
        );
        assert_eq!(force, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_separation_pushes_away_from_neighbour() {
        let neighbours = [SpatialEntry {
            id: 2,
            faction: Faction::Defenders,
            position: Vec2Fixed::from_ints(1, 0),
        }];
        let force = separation(
            1,
            Vec2Fixed::ZERO,
            &neighbours,
            Vec2Fixed::ZERO,
            Fixed::from_num(5),
            Fixed::from_num(15),
        );
        assert_eq!(force, Vec2Fixed::from_ints(-5, 0));
    }

    #[test]
    fn test_colocated_agents_split_apart() {
        let at = |id| SpatialEntry {
            id,
            faction: Faction::Defenders,
            position: Vec2Fixed::ZERO,
        };
        let speed = Fixed::from_num(5);
        let cap = Fixed::from_num(15);
        let first = separation(1, Vec2Fixed::ZERO, &[at(2)], Vec2Fixed::ZERO, speed, cap);
        let second = separation(2, Vec2Fixed::ZERO, &[at(1)], Vec2Fixed::ZERO, speed, cap);
        assert_eq!(first, -second);
        assert!(!first.is_zero());
    }

    #[test]
    fn test_approach_point_sits_at_fraction_of_range() {
        let target = Vec2Fixed::from_ints(10, 10);
        let point = approach_point(target, Vec2Fixed::FORWARD, Fixed::ZERO, Fixed::from_num(2));
        assert!(approx(point.distance(target), Fixed::from_num(1.6)));
        assert!(point.y > target.y);
    }
}
