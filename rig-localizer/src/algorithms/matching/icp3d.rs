//! 6-DOF point-to-point ICP with annealed correspondence threshold.
//!
//! Each iteration pairs every source point with its nearest target point
//! within the current threshold and solves the closed-form rigid fit
//! (Kabsch, via SVD of the cross-covariance). When the estimate stops
//! moving the threshold is multiplied by `alfa`; the run converges once it
//! falls below `smallest_threshold_dist`.
//!
//! Goodness is the percentage of source points with a partner at the final
//! threshold, so it is gated with [`GoodnessGate::AtLeast`].

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

use super::spatial::PointIndex3D;
use super::{AlignmentResult, GoodnessGate, RigidAligner};
use crate::core::types::{Point3D, PointCloud3D, Pose3D};

#[derive(Debug, Clone)]
pub struct Icp3DConfig {
    pub max_iterations: u32,

    /// Initial correspondence threshold (meters).
    pub threshold_dist: f32,

    /// Annealing factor (0..1).
    pub alfa: f32,

    /// Converged once the threshold falls below this (meters).
    pub smallest_threshold_dist: f32,

    /// Stationary step size (meters and radians).
    pub step_epsilon: f32,

    /// Minimum pairs for a fit.
    pub min_correspondences: usize,

    /// Accept results with at least this percentage of matched points.
    pub min_goodness: f64,
}

impl Default for Icp3DConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            threshold_dist: 0.40,
            alfa: 0.5,
            smallest_threshold_dist: 0.1,
            step_epsilon: 1e-5,
            min_correspondences: 6,
            min_goodness: 96.0,
        }
    }
}

/// Point-to-point ICP over 3D clouds.
#[derive(Debug, Clone)]
pub struct PointToPointIcp3D {
    config: Icp3DConfig,
}

impl PointToPointIcp3D {
    pub fn new(config: Icp3DConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Icp3DConfig {
        &self.config
    }

    fn correspondences(
        source: &PointCloud3D,
        index: &PointIndex3D,
        pose: &Pose3D,
        threshold: f32,
    ) -> Vec<(usize, usize)> {
        let max_sq = threshold * threshold;
        source
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let q = pose.transform_point(&p);
                match index.nearest(&q) {
                    Some((j, d2)) if d2 <= max_sq => Some((i, j)),
                    _ => None,
                }
            })
            .collect()
    }

    fn percentage(matched: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        100.0 * matched as f64 / total as f64
    }
}

impl RigidAligner for PointToPointIcp3D {
    fn name(&self) -> &'static str {
        "ICP"
    }

    fn align(
        &mut self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> AlignmentResult {
        if source.is_empty() || target.len() < 3 {
            return AlignmentResult::new(*initial_guess, 0, 0.0, false);
        }

        let index = PointIndex3D::new(target);
        let mut pose = *initial_guess;
        let mut threshold = self.config.threshold_dist;
        let mut converged = false;
        let mut iterations = 0u32;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let pairs = Self::correspondences(source, &index, &pose, threshold);
            if pairs.len() < self.config.min_correspondences {
                let goodness = Self::percentage(pairs.len(), source.len());
                return AlignmentResult::new(*initial_guess, iterations, goodness, false);
            }

            let Some(fitted) = fit_rigid(
                pairs
                    .iter()
                    .map(|&(i, j)| (source.point_at(i), target.point_at(j))),
            ) else {
                break;
            };

            let step = fitted.compose(&pose.inverse());
            pose = fitted;

            let eps = self.config.step_epsilon;
            if step.translation_norm() < eps && step.rotation_angle() < eps {
                threshold *= self.config.alfa;
                if threshold < self.config.smallest_threshold_dist {
                    converged = true;
                    break;
                }
            }
        }

        let matched = Self::correspondences(source, &index, &pose, threshold).len();
        AlignmentResult::new(
            pose,
            iterations,
            Self::percentage(matched, source.len()),
            converged,
        )
    }

    fn gate(&self) -> GoodnessGate {
        GoodnessGate::AtLeast(self.config.min_goodness)
    }
}

/// Least-squares rigid transform taking each `a` onto its `b`.
///
/// Returns `None` for fewer than three pairs or a failed decomposition.
pub(crate) fn fit_rigid<I>(pairs: I) -> Option<Pose3D>
where
    I: Iterator<Item = (Point3D, Point3D)> + Clone,
{
    let mut n = 0usize;
    let mut ca = Vector3::<f64>::zeros();
    let mut cb = Vector3::<f64>::zeros();
    for (a, b) in pairs.clone() {
        ca += to_vector(&a);
        cb += to_vector(&b);
        n += 1;
    }
    if n < 3 {
        return None;
    }
    ca /= n as f64;
    cb /= n as f64;

    let mut h = Matrix3::<f64>::zeros();
    for (a, b) in pairs {
        h += (to_vector(&a) - ca) * (to_vector(&b) - cb).transpose();
    }

    let svd = h.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return None;
    };
    let mut r = v_t.transpose() * u.transpose();
    if r.determinant() < 0.0 {
        let mut v_t = v_t;
        v_t.row_mut(2).scale_mut(-1.0);
        r = v_t.transpose() * u.transpose();
    }

    let t = cb - r * ca;
    let rotation = UnitQuaternion::from_matrix(&r.cast::<f32>());
    Some(Pose3D::from_isometry(Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        rotation,
    )))
}

fn to_vector(p: &Point3D) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}
