//! Planar point and pose types.

use serde::{Deserialize, Serialize};

use crate::core::math::normalize_angle;

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance from the origin of the frame the point is expressed in.
    #[inline]
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Platform pose on the ground plane.
///
/// Position (x, y) in meters and heading (theta) in radians.
/// Theta is normalized to [-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f32,
    /// Y position in meters
    pub y: f32,
    /// Heading in radians, normalized to [-π, π]
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Identity pose at origin with zero heading.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Compose two poses: self ⊕ other
    ///
    /// ```text
    /// C = A ⊕ B:
    ///   C.x = A.x + B.x * cos(A.θ) - B.y * sin(A.θ)
    ///   C.y = A.y + B.x * sin(A.θ) + B.y * cos(A.θ)
    ///   C.θ = normalize(A.θ + B.θ)
    /// ```
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// Inverse of this pose.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Relative pose `self ⊖ reference`, i.e. `reference⁻¹ ⊕ self`.
    ///
    /// The result is `self` as seen from `reference`, so that
    /// `reference.compose(&self.relative_to(&reference)) == self`.
    #[inline]
    pub fn relative_to(&self, reference: &Pose2D) -> Pose2D {
        reference.inverse().compose(self)
    }

    /// Scale the three planar components by `factor`.
    ///
    /// Used to take a fraction of a relative displacement.
    #[inline]
    pub fn scaled(&self, factor: f32) -> Pose2D {
        Pose2D::new(self.x * factor, self.y * factor, self.theta * factor)
    }

    /// Transform a point from the local frame to the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point2D) -> Point2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Point2D::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for Pose2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.2}°)",
            self.x,
            self.y,
            self.theta.to_degrees()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_pose_inverse_roundtrip() {
        let p = Pose2D::new(1.0, 2.0, 0.5);
        let result = p.compose(&p.inverse());
        assert_relative_eq!(result.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.theta, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pose_composition_order() {
        let move_forward = Pose2D::new(1.0, 0.0, 0.0);
        let rotate = Pose2D::new(0.0, 0.0, FRAC_PI_2);

        let result = move_forward.compose(&rotate);
        assert_relative_eq!(result.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.y, 0.0, epsilon = 1e-6);

        let result2 = rotate.compose(&move_forward);
        assert_relative_eq!(result2.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(result2.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(result2.theta, FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_relative_to_recovers_target() {
        let a = Pose2D::new(1.0, -0.5, 0.3);
        let b = Pose2D::new(2.5, 1.0, -0.7);

        let delta = b.relative_to(&a);
        let back = a.compose(&delta);
        assert_relative_eq!(back.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(back.theta, b.theta, epsilon = 1e-5);
    }

    #[test]
    fn test_relative_in_rotated_frame() {
        // Facing +Y, moving one meter along +Y is "straight ahead".
        let a = Pose2D::new(0.0, 0.0, FRAC_PI_2);
        let b = Pose2D::new(0.0, 1.0, FRAC_PI_2);
        let delta = b.relative_to(&a);
        assert_relative_eq!(delta.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(delta.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(delta.theta, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scaled_half() {
        let half = Pose2D::new(1.0, -2.0, 0.4).scaled(0.5);
        assert_relative_eq!(half.x, 0.5);
        assert_relative_eq!(half.y, -1.0);
        assert_relative_eq!(half.theta, 0.2);
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose2D::new(1.0, 0.0, FRAC_PI_2);
        let result = pose.transform_point(&Point2D::new(1.0, 0.0));
        assert_relative_eq!(result.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.y, 1.0, epsilon = 1e-6);
    }
}
