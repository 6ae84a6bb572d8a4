//! Agent kinematic integration.
//!
//! Turns a steering force into motion: velocity, position and a smoothed
//! facing. Pure numeric code, safe to call every tick.

use crate::components::Kinematics;
use crate::math::{slerp_yaw, yaw_of, Fixed, Vec2Fixed};

/// Speed below which an agent keeps its current facing.
#[must_use]
pub fn facing_threshold() -> Fixed {
    Fixed::from_num(0.1)
}

/// Movement limits used during integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionLimits {
    /// Maximum speed in units per second.
    pub move_speed: Fixed,
    /// Turn rate used as the interpolation factor per second.
    pub rotation_speed: Fixed,
}

/// Integrate one step of motion.
///
/// `velocity += force * dt`, then the velocity is capped at `move_speed`
/// and the position advanced by `velocity * dt`. The facing turns toward
/// the velocity direction by `rotation_speed * dt` of the remaining arc,
/// and only while moving faster than [`facing_threshold`].
pub fn integrate(kinematics: &mut Kinematics, limits: MotionLimits, force: Vec2Fixed, dt: Fixed) {
    let velocity = kinematics.velocity + force.scale(dt);
    let velocity = velocity.clamp_length(limits.move_speed.max(Fixed::ZERO));

    kinematics.velocity = velocity;
    kinematics.position += velocity.scale(dt);

    if velocity.length() > facing_threshold() {
        let desired = yaw_of(velocity);
        kinematics.yaw = slerp_yaw(kinematics.yaw, desired, limits.rotation_speed * dt);
    }
}
