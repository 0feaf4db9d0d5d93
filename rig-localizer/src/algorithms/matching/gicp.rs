//! Generalized ICP (plane-to-plane) for 3D clouds.
//!
//! Every point gets a covariance from its local neighbourhood, flattened so
//! the surface normal direction is nearly rigid and the tangent directions
//! are loose. Each Gauss-Newton step minimizes
//!
//! ```text
//! Σ rᵢᵀ (C_bᵢ + R C_aᵢ Rᵀ)⁻¹ rᵢ,   rᵢ = T aᵢ - bᵢ
//! ```
//!
//! with a left-multiplied update `T ← exp(δ) T`.
//!
//! Goodness is the fitness score: mean squared distance from each
//! transformed source point to its nearest target point. Lower is better.

use nalgebra::{
    Isometry3, Matrix3, Matrix3x6, Matrix6, Quaternion, SymmetricEigen, Translation3,
    UnitQuaternion, Vector3, Vector6,
};

use super::spatial::PointIndex3D;
use super::{AlignmentResult, GoodnessGate, RigidAligner};
use crate::algorithms::voxel_grid::VoxelGrid;
use crate::core::types::{Point3D, PointCloud3D, Pose3D};

/// Eigenvalue given to the normal direction of each local plane.
const PLANE_EPSILON: f64 = 1e-3;

/// Fewer pairs than this and the 6x6 system is not solved.
const MIN_CORRESPONDENCES: usize = 6;

#[derive(Debug, Clone)]
pub struct GicpConfig {
    /// Pairs farther apart than this are ignored (meters).
    pub max_correspondence_distance: f32,

    pub max_iterations: u32,

    /// Stop when the translation step falls below this (meters).
    pub transformation_epsilon: f64,

    /// Stop when the rotation step falls below this (radians).
    pub rotation_epsilon: f64,

    /// Voxel size applied to the target; 0 disables it.
    pub voxel_leaf_size: f32,

    /// Keep every n-th point of both clouds.
    pub point_stride: usize,

    /// Neighbours used for each point covariance.
    pub covariance_neighbors: usize,

    /// Accept results whose fitness is at most this.
    pub max_fitness: f64,

    /// When false every finite fitness is accepted.
    pub gated: bool,
}

impl Default for GicpConfig {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 0.2,
            max_iterations: 10,
            transformation_epsilon: 1e-5,
            rotation_epsilon: 1e-5,
            voxel_leaf_size: 0.05,
            point_stride: 4,
            covariance_neighbors: 20,
            max_fitness: 0.01,
            gated: true,
        }
    }
}

/// Generalized ICP backend.
#[derive(Debug, Clone)]
pub struct GeneralizedIcp {
    config: GicpConfig,
}

impl GeneralizedIcp {
    pub fn new(config: GicpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GicpConfig {
        &self.config
    }

    /// Plane-regularized covariance for every point of `cloud`.
    fn covariances(&self, cloud: &PointCloud3D, index: &PointIndex3D) -> Vec<Matrix3<f64>> {
        cloud
            .iter()
            .map(|p| {
                let neighbors = index.k_nearest(&p, self.config.covariance_neighbors);
                if neighbors.len() < 3 {
                    return Matrix3::identity();
                }
                let points: Vec<Vector3<f64>> = neighbors
                    .iter()
                    .map(|&i| to_vector(&cloud.point_at(i)))
                    .collect();
                plane_covariance(&points)
            })
            .collect()
    }

    /// Mean squared nearest-neighbour distance of the transformed source.
    fn fitness(source: &PointCloud3D, index: &PointIndex3D, pose: &Isometry3<f64>) -> f64 {
        if source.is_empty() {
            return f64::INFINITY;
        }
        let mut sum = 0.0;
        let mut count = 0usize;
        for p in source.iter() {
            let q = pose * nalgebra::Point3::from(to_vector(&p));
            let query = Point3D::new(q.x as f32, q.y as f32, q.z as f32);
            if let Some((_, d2)) = index.nearest(&query) {
                sum += d2 as f64;
                count += 1;
            }
        }
        if count == 0 {
            return f64::INFINITY;
        }
        sum / count as f64
    }
}

impl RigidAligner for GeneralizedIcp {
    fn name(&self) -> &'static str {
        "GICP"
    }

    fn align(
        &mut self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> AlignmentResult {
        let source = source.decimate(self.config.point_stride);
        let target = VoxelGrid::new(self.config.voxel_leaf_size)
            .filter(&target.decimate(self.config.point_stride));

        if source.len() < MIN_CORRESPONDENCES || target.len() < MIN_CORRESPONDENCES {
            return AlignmentResult::new(*initial_guess, 0, f64::INFINITY, false);
        }

        let source_index = PointIndex3D::new(&source);
        let target_index = PointIndex3D::new(&target);
        let source_cov = self.covariances(&source, &source_index);
        let target_cov = self.covariances(&target, &target_index);

        let max_sq = self.config.max_correspondence_distance.powi(2);
        let mut pose = to_isometry(initial_guess);
        let mut iterations = 0u32;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let rotation = pose.rotation.to_rotation_matrix().into_inner();
            let mut h = Matrix6::<f64>::zeros();
            let mut g = Vector6::<f64>::zeros();
            let mut pairs = 0usize;

            for (i, p) in source.iter().enumerate() {
                let q = pose * nalgebra::Point3::from(to_vector(&p));
                let query = Point3D::new(q.x as f32, q.y as f32, q.z as f32);
                let Some((j, d2)) = target_index.nearest(&query) else {
                    continue;
                };
                if d2 > max_sq {
                    continue;
                }

                let combined = target_cov[j] + rotation * source_cov[i] * rotation.transpose();
                let Some(information) = combined.try_inverse() else {
                    continue;
                };

                let residual = q.coords - to_vector(&target.point_at(j));
                let mut jacobian = Matrix3x6::<f64>::zeros();
                jacobian
                    .fixed_view_mut::<3, 3>(0, 0)
                    .copy_from(&Matrix3::identity());
                jacobian
                    .fixed_view_mut::<3, 3>(0, 3)
                    .copy_from(&(-skew(&q.coords)));

                let jt_info = jacobian.transpose() * information;
                h += jt_info * jacobian;
                g += jt_info * residual;
                pairs += 1;
            }

            if pairs < MIN_CORRESPONDENCES {
                break;
            }
            let Some(h_inv) = h.try_inverse() else {
                break;
            };

            let delta = -(h_inv * g);
            let step_translation = Vector3::new(delta[0], delta[1], delta[2]);
            let step_rotation = Vector3::new(delta[3], delta[4], delta[5]);
            pose = Isometry3::new(step_translation, step_rotation) * pose;

            if step_translation.norm() < self.config.transformation_epsilon
                && step_rotation.norm() < self.config.rotation_epsilon
            {
                converged = true;
                break;
            }
        }

        // Acceptance is left to the fitness gate; converged only reports the step test.
        let fitness = Self::fitness(&source, &target_index, &pose);
        AlignmentResult::new(from_isometry(&pose), iterations, fitness, converged)
    }

    fn gate(&self) -> GoodnessGate {
        if self.config.gated {
            GoodnessGate::AtMost(self.config.max_fitness)
        } else {
            GoodnessGate::Ungated
        }
    }
}

/// Covariance of a neighbourhood with eigenvalues replaced by (ε, 1, 1).
fn plane_covariance(points: &[Vector3<f64>]) -> Matrix3<f64> {
    let n = points.len() as f64;
    let mean = points.iter().sum::<Vector3<f64>>() / n;
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = p - mean;
        cov += d * d.transpose();
    }
    cov /= n;

    let eigen = SymmetricEigen::new(cov);
    let normal_axis = eigen.eigenvalues.imin();
    let mut values = Vector3::new(1.0, 1.0, 1.0);
    values[normal_axis] = PLANE_EPSILON;

    let v = eigen.eigenvectors;
    v * Matrix3::from_diagonal(&values) * v.transpose()
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

fn to_vector(p: &Point3D) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}

fn to_isometry(pose: &Pose3D) -> Isometry3<f64> {
    let iso = pose.isometry();
    let t = iso.translation.vector;
    let q = iso.rotation.coords;
    Isometry3::from_parts(
        Translation3::new(t.x as f64, t.y as f64, t.z as f64),
        UnitQuaternion::from_quaternion(Quaternion::new(
            q.w as f64, q.x as f64, q.y as f64, q.z as f64,
        )),
    )
}

fn from_isometry(iso: &Isometry3<f64>) -> Pose3D {
    let t = iso.translation.vector;
    let q = iso.rotation.coords;
    Pose3D::from_isometry(Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        UnitQuaternion::from_quaternion(Quaternion::new(
            q.w as f32, q.x as f32, q.y as f32, q.z as f32,
        )),
    ))
}
