//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation math uses fixed-point arithmetic so that identical
//! inputs produce identical outputs on every platform. The world is a
//! ground plane: `x` points right, `y` points forward. Orientation is a
//! yaw angle in radians where 0 faces `+y` and positive yaw turns toward `+x`.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate (right).
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate (forward).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_bits()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

/// Serde support for human-authored decimal values.
///
/// Configuration files are written by people, so they carry plain
/// decimals (`move_speed: 5.0`) rather than raw bits. The conversion
/// happens once at load time; the simulation never sees a float.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

/// Serde support for optional human-authored decimals.
pub mod option_fixed_decimal {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number as an optional decimal.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|v| v.to_num::<f64>()).serialize(serializer)
    }

    /// Deserialize an optional fixed-point number from an optional decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            None => Ok(None),
            Some(value) => Fixed::checked_from_num(value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("{value} is out of fixed-point range"))),
        }
    }
}

/// Serde support for decimal 2D vectors written as `(x, y)` tuples.
pub mod vec2_decimal {
    use super::{Fixed, Vec2Fixed};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a vector as an `(x, y)` decimal tuple.
    pub fn serialize<S>(value: &Vec2Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (value.x.to_num::<f64>(), value.y.to_num::<f64>()).serialize(serializer)
    }

    /// Deserialize a vector from an `(x, y)` decimal tuple.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec2Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (x, y) = <(f64, f64)>::deserialize(deserializer)?;
        match (Fixed::checked_from_num(x), Fixed::checked_from_num(y)) {
            (Some(x), Some(y)) => Ok(Vec2Fixed::new(x, y)),
            _ => Err(D::Error::custom(format!(
                "({x}, {y}) is out of fixed-point range"
            ))),
        }
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector pointing forward (`+y`).
    pub const FORWARD: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ONE,
    };

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Check if both components are exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at [`Fixed::MAX`] for points more than about 46 000 units
    /// apart, so range checks against any smaller bound stay correct.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        self.offset_from(other).length_squared()
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        self.offset_from(other).length()
    }

    fn offset_from(self, other: Self) -> Self {
        Self::new(self.x.saturating_sub(other.x), self.y.saturating_sub(other.y))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Squared length, saturating at [`Fixed::MAX`].
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.x
            .saturating_mul(self.x)
            .saturating_add(self.y.saturating_mul(self.y))
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> Fixed {
        let squared = self.length_squared();
        if squared < Fixed::MAX {
            return fixed_sqrt(squared);
        }
        // Too long to square: measure the vector scaled into the unit box.
        let largest = self.x.saturating_abs().max(self.y.saturating_abs());
        let unit = Self::new(self.x / largest, self.y / largest);
        largest.saturating_mul(fixed_sqrt(unit.length_squared()))
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Scale both components.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize to unit length. The zero vector stays zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Cap the magnitude at `max`, preserving direction.
    ///
    /// Vectors already within the cap are returned unchanged; the result is
    /// never stretched up to `max`.
    #[must_use]
    pub fn clamp_length(self, max: Fixed) -> Self {
        if max <= Fixed::ZERO {
            return Self::ZERO;
        }
        let len = self.length();
        if len <= max {
            return self;
        }
        let capped = self.scale(max / len);
        // Rounding can leave the result a few ulps above the cap.
        if capped.length() > max {
            capped.scale(Fixed::ONE - Fixed::DELTA * 16)
        } else {
            capped
        }
    }

    /// Step toward `target` by at most `max_delta`, never overshooting.
    #[must_use]
    pub fn move_towards(self, target: Self, max_delta: Fixed) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_delta || dist == Fixed::ZERO {
            return target;
        }
        self + delta.scale(max_delta / dist)
    }

    /// Rotate a local-space vector into world space for the given yaw.
    #[must_use]
    pub fn rotated(self, yaw: Fixed) -> Self {
        let (sin, cos) = sin_cos(yaw);
        Self::new(self.x * cos + self.y * sin, self.y * cos - self.x * sin)
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// π as a fixed-point number.
#[must_use]
pub fn pi() -> Fixed {
    Fixed::from_num(fixed::consts::PI)
}

/// π/2 as a fixed-point number.
#[must_use]
pub fn half_pi() -> Fixed {
    Fixed::from_num(fixed::consts::FRAC_PI_2)
}

/// 2π as a fixed-point number.
#[must_use]
pub fn tau() -> Fixed {
    Fixed::from_num(fixed::consts::TAU)
}

/// Integer square root (floor) of a `u128` via Newton's method.
fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let shift = (128 - n.leading_zeros() + 1) / 2;
    let mut x = 1u128 << shift;
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Computes the square root of a fixed-point number.
///
/// Works on the raw bits: `sqrt(v) * 2^32 == isqrt(bits * 2^32)`, so the
/// result is exact to the last fractional bit. Non-positive input yields zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let bits = value.to_bits() as u128;
    let root = isqrt_u128(bits << 32);
    Fixed::from_bits(root as i64)
}

/// Wrap an angle into `[-π, π]`.
#[must_use]
pub fn wrap_angle(angle: Fixed) -> Fixed {
    let pi = pi();
    let tau = tau();
    let mut a = angle % tau;
    if a > pi {
        a -= tau;
    } else if a < -pi {
        a += tau;
    }
    a
}

/// Sine and cosine of an angle in radians.
#[must_use]
pub fn sin_cos(angle: Fixed) -> (Fixed, Fixed) {
    (sin(angle), sin(angle + half_pi()))
}

/// Sine of an angle in radians (Taylor series after range reduction).
#[must_use]
pub fn sin(angle: Fixed) -> Fixed {
    let pi = pi();
    let half = half_pi();
    let mut x = wrap_angle(angle);
    // Fold into [-π/2, π/2] using sin(π - x) = sin(x).
    if x > half {
        x = pi - x;
    } else if x < -half {
        x = -pi - x;
    }

    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for k in 1..=6i32 {
        let denom = Fixed::from_num((2 * k) * (2 * k + 1));
        term = -(term * x2) / denom;
        sum += term;
    }
    sum
}

/// Arctangent for `|z| <= 1`.
fn atan_unit(z: Fixed) -> Fixed {
    // One argument-halving step brings |h| under tan(π/8), where the
    // series converges quickly.
    let h = z / (Fixed::ONE + fixed_sqrt(Fixed::ONE + z * z));
    let h2 = h * h;
    let mut term = h;
    let mut sum = h;
    for k in 1..=8i32 {
        term = -(term * h2);
        sum += term / Fixed::from_num(2 * k + 1);
    }
    sum * Fixed::from_num(2)
}

/// Four-quadrant arctangent of `y / x`, in `[-π, π]`.
#[must_use]
pub fn atan2(y: Fixed, x: Fixed) -> Fixed {
    if x == Fixed::ZERO && y == Fixed::ZERO {
        return Fixed::ZERO;
    }
    if y.abs() <= x.abs() {
        let a = atan_unit(y / x);
        if x > Fixed::ZERO {
            a
        } else if y >= Fixed::ZERO {
            a + pi()
        } else {
            a - pi()
        }
    } else {
        let a = atan_unit(x / y);
        if y > Fixed::ZERO {
            half_pi() - a
        } else {
            -half_pi() - a
        }
    }
}

/// Yaw that faces along `direction` (0 = `+y`).
#[must_use]
pub fn yaw_of(direction: Vec2Fixed) -> Fixed {
    atan2(direction.x, direction.y)
}

/// Unit heading vector for a yaw.
#[must_use]
pub fn heading(yaw: Fixed) -> Vec2Fixed {
    let (sin, cos) = sin_cos(yaw);
    Vec2Fixed::new(sin, cos)
}

/// Spherical interpolation between two ground-plane rotations.
///
/// For rotations about a single axis this is interpolation of the yaw
/// along the shortest arc. `t` is clamped to `[0, 1]`.
#[must_use]
pub fn slerp_yaw(from: Fixed, to: Fixed, t: Fixed) -> Fixed {
    let t = t.clamp(Fixed::ZERO, Fixed::ONE);
    let diff = wrap_angle(to - from);
    wrap_angle(from + diff * t)
}
