//! Planar geometry primitives: world-frame points and poses, integer grid
//! coordinates, and the symmetric 3x3 pose covariance.

use serde::{Deserialize, Serialize};

/// A point in the world (meters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A planar pose: position plus heading (radians).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientedPoint {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl OrientedPoint {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Compose `self` as a local-frame pose relative to `base`: rotates
    /// `self` by `base.theta`, translates by `base`'s position, and sums
    /// headings. Used to bring the laser pose (fixed relative to the robot)
    /// into the world frame given the robot's world pose.
    pub fn absolute(&self, base: &OrientedPoint) -> OrientedPoint {
        let (s, c) = base.theta.sin_cos();
        OrientedPoint {
            x: base.x + self.x * c - self.y * s,
            y: base.y + self.x * s + self.y * c,
            theta: normalize_angle(base.theta + self.theta),
        }
    }

    /// Componentwise addition with theta wrapped to (-pi, pi].
    pub fn add(&self, rhs: &OrientedPoint) -> OrientedPoint {
        OrientedPoint {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            theta: normalize_angle(self.theta + rhs.theta),
        }
    }

    /// Componentwise subtraction with theta wrapped to (-pi, pi] via atan2(sin, cos).
    pub fn sub(&self, rhs: &OrientedPoint) -> OrientedPoint {
        OrientedPoint {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            theta: normalize_angle(self.theta - rhs.theta),
        }
    }
}

/// Wrap an angle to (-pi, pi] via the two-argument arctangent identity.
pub fn normalize_angle(theta: f64) -> f64 {
    theta.sin().atan2(theta.cos())
}

/// Integer grid cell coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn sub(&self, rhs: &IntPoint) -> IntPoint {
        IntPoint::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn add(&self, dx: i32, dy: i32) -> IntPoint {
        IntPoint::new(self.x + dx, self.y + dy)
    }
}

/// Symmetric 3x3 covariance over (x, y, theta). Stored as the six distinct
/// entries of the upper triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariance3 {
    pub xx: f64,
    pub yy: f64,
    pub tt: f64,
    pub xy: f64,
    pub xt: f64,
    pub yt: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn normalize_angle_wraps_into_range() {
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(-3.0 * PI), PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(0.1), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn add_then_sub_round_trips() {
        let p = OrientedPoint::new(1.0, 2.0, 0.4);
        let q = OrientedPoint::new(-0.3, 0.7, -1.2);
        let composed = p.sub(&q).add(&q);
        assert_relative_eq!(composed.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(composed.y, p.y, epsilon = 1e-9);
        assert_relative_eq!(composed.theta, p.theta, epsilon = 1e-9);
    }

    #[test]
    fn absolute_with_zero_offset_is_base() {
        let base = OrientedPoint::new(5.0, -2.0, 0.3);
        let zero = OrientedPoint::default();
        let result = zero.absolute(&base);
        assert_relative_eq!(result.x, base.x, epsilon = 1e-9);
        assert_relative_eq!(result.y, base.y, epsilon = 1e-9);
        assert_relative_eq!(result.theta, base.theta, epsilon = 1e-9);
    }
}
