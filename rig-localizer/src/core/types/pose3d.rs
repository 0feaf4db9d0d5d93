//! Rigid-body point and pose types for the 3D rig.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use super::Pose2D;

/// A 3D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point3D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<Point3<f32>> for Point3D {
    fn from(p: Point3<f32>) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl From<Point3D> for Point3<f32> {
    fn from(p: Point3D) -> Self {
        Point3::new(p.x, p.y, p.z)
    }
}

/// 6-DOF rigid transform (translation + rotation).
///
/// Composition is associative but not commutative: `a.compose(&b)` applies
/// `b` in the frame of `a`, matching [`Pose2D::compose`].
///
/// On disk the pose is stored as translation `[x, y, z]` plus a unit
/// quaternion `[i, j, k, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Pose3DRepr", into = "Pose3DRepr")]
pub struct Pose3D {
    iso: Isometry3<f32>,
}

impl Pose3D {
    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// Build from translation and roll/pitch/yaw (radians).
    pub fn new(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            iso: Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ),
        }
    }

    /// Pure translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }

    /// Wrap an existing isometry.
    #[inline]
    pub fn from_isometry(iso: Isometry3<f32>) -> Self {
        Self { iso }
    }

    /// Lift a planar pose into 3D with z = 0, roll = 0, pitch = 0.
    pub fn from_planar(pose: &Pose2D) -> Self {
        Self::new(pose.x, pose.y, 0.0, 0.0, 0.0, pose.theta)
    }

    /// Build from a 4×4 homogeneous matrix.
    ///
    /// The rotation block is re-orthonormalized, so matrices with small
    /// numerical drift are accepted.
    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let rotation: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
        Self {
            iso: Isometry3::from_parts(
                Translation3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]),
                UnitQuaternion::from_matrix(&rotation),
            ),
        }
    }

    /// 4×4 homogeneous matrix.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        self.iso.to_homogeneous()
    }

    #[inline]
    pub fn isometry(&self) -> &Isometry3<f32> {
        &self.iso
    }

    /// self ⊕ other
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            iso: self.iso * other.iso,
        }
    }

    #[inline]
    pub fn inverse(&self) -> Pose3D {
        Pose3D {
            iso: self.iso.inverse(),
        }
    }

    /// Map a point from the local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point3D) -> Point3D {
        self.iso.transform_point(&Point3::from(*point)).into()
    }

    pub fn x(&self) -> f32 {
        self.iso.translation.vector.x
    }

    pub fn y(&self) -> f32 {
        self.iso.translation.vector.y
    }

    pub fn z(&self) -> f32 {
        self.iso.translation.vector.z
    }

    /// (roll, pitch, yaw) in radians.
    pub fn euler_angles(&self) -> (f32, f32, f32) {
        self.iso.rotation.euler_angles()
    }

    /// Projection onto the ground plane: (x, y, yaw).
    pub fn planar(&self) -> Pose2D {
        let (_, _, yaw) = self.euler_angles();
        Pose2D::new(self.x(), self.y(), yaw)
    }

    /// Translation magnitude in meters.
    pub fn translation_norm(&self) -> f32 {
        self.iso.translation.vector.norm()
    }

    /// Rotation magnitude in radians.
    ///
    /// Computed from the quaternion's vector part, which stays accurate
    /// for tiny angles where `acos(w)` does not.
    pub fn rotation_angle(&self) -> f32 {
        let q = &self.iso.rotation;
        2.0 * q.imag().norm().atan2(q.scalar().abs())
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for Pose3D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (roll, pitch, yaw) = self.euler_angles();
        write!(
            f,
            "({:.3}, {:.3}, {:.3}, {:.2}°, {:.2}°, {:.2}°)",
            self.x(),
            self.y(),
            self.z(),
            yaw.to_degrees(),
            pitch.to_degrees(),
            roll.to_degrees()
        )
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct Pose3DRepr {
    translation: [f32; 3],
    rotation: [f32; 4],
}

impl From<Pose3D> for Pose3DRepr {
    fn from(pose: Pose3D) -> Self {
        let t = pose.iso.translation.vector;
        let q = pose.iso.rotation.coords;
        Self {
            translation: [t.x, t.y, t.z],
            rotation: [q.x, q.y, q.z, q.w],
        }
    }
}

impl From<Pose3DRepr> for Pose3D {
    fn from(repr: Pose3DRepr) -> Self {
        let [x, y, z] = repr.translation;
        let [i, j, k, w] = repr.rotation;
        Self {
            iso: Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_quaternion(Quaternion::new(w, i, j, k)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let p = Pose3D::new(1.0, -2.0, 0.5, 0.1, -0.2, 0.7);
        let r = p.compose(&p.inverse());
        assert_relative_eq!(r.translation_norm(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(r.rotation_angle(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_composition_is_not_commutative() {
        let forward = Pose3D::from_translation(1.0, 0.0, 0.0);
        let turn = Pose3D::new(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);

        let a = forward.compose(&turn);
        let b = turn.compose(&forward);
        assert_relative_eq!(a.x(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(b.x(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(b.y(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_from_planar_matches_planar_composition() {
        let a = Pose2D::new(1.0, 2.0, 0.4);
        let b = Pose2D::new(-0.5, 0.3, -1.1);

        let lifted = Pose3D::from_planar(&a).compose(&Pose3D::from_planar(&b));
        let expected = a.compose(&b);
        let planar = lifted.planar();

        assert_relative_eq!(planar.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(planar.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(planar.theta, expected.theta, epsilon = 1e-5);
        assert_relative_eq!(lifted.z(), 0.0);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let p = Pose3D::new(0.3, 0.2, 1.5, 0.05, 0.1, -0.6);
        let back = Pose3D::from_matrix(&p.to_matrix());
        assert_relative_eq!(back.x(), p.x(), epsilon = 1e-6);
        assert_relative_eq!(back.z(), p.z(), epsilon = 1e-6);
        assert_relative_eq!(
            back.compose(&p.inverse()).rotation_angle(),
            0.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose3D::new(1.0, 0.0, 0.5, 0.0, 0.0, FRAC_PI_2);
        let p = pose.transform_point(&Point3D::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let p = Pose3D::new(0.3, -0.2, 1.0, 0.0, 0.2, 1.3);
        let bytes = postcard::to_allocvec(&p).unwrap();
        let back: Pose3D = postcard::from_bytes(&bytes).unwrap();
        assert_relative_eq!(back.y(), p.y(), epsilon = 1e-6);
        assert_relative_eq!(
            back.compose(&p.inverse()).rotation_angle(),
            0.0,
            epsilon = 1e-3
        );
    }
}
