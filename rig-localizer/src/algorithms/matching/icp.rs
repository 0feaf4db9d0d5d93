//! Planar point-to-point ICP against a static reference map.
//!
//! The correspondence threshold is annealed: whenever the estimate stops
//! moving, both thresholds are multiplied by `alfa`, and the match is
//! converged once the distance threshold drops below
//! `smallest_threshold_dist`.
//!
//! ```text
//! Input: scan S (robot frame), map M, initial pose P₀
//!
//! 1. For each s in S, q = P ⊕ s, m = nearest(M, q)
//!    keep (s, m) if |q - m| <= threshold_dist + threshold_ang · |s|
//! 2. Solve the closed-form rigid fit P' mapping S onto the kept m
//! 3. If P' ≈ P: thresholds *= alfa, stop when threshold_dist < smallest
//! 4. P = P', repeat until max_iterations
//! ```
//!
//! Goodness is the fraction of scan points matched at the final threshold.

use std::collections::HashSet;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Matrix3;

use super::ScanMatchResult;
use crate::core::types::{Covariance2D, Point2D, PointCloud2D, Pose2D};

/// Immutable tree: construction rebalances around runs of equal
/// coordinates, so long axis-aligned walls are fine.
type MapTree = ImmutableKdTree<f32, 2>;

/// Configuration for [`PlanarIcp`].
#[derive(Debug, Clone)]
pub struct PlanarIcpConfig {
    /// Maximum number of iterations over all annealing stages.
    pub max_iterations: u32,

    /// Initial correspondence distance threshold (meters).
    pub threshold_dist: f32,

    /// Extra threshold per meter of range (radians).
    ///
    /// A point at range r may match up to `threshold_dist + threshold_ang * r`
    /// away, since heading errors displace far points more.
    pub threshold_ang: f32,

    /// Annealing factor applied to both thresholds (0..1).
    pub alfa: f32,

    /// Stop annealing when `threshold_dist` falls below this (meters).
    pub smallest_threshold_dist: f32,

    /// Minimum correspondences for a valid fit.
    pub min_correspondences: usize,

    /// Step size under which the estimate is considered stationary.
    pub step_epsilon: f32,
}

impl Default for PlanarIcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            threshold_dist: 0.75,
            threshold_ang: 10f32.to_radians(),
            alfa: 0.5,
            smallest_threshold_dist: 0.05,
            min_correspondences: 10,
            step_epsilon: 1e-5,
        }
    }
}

/// A static reference map with its k-d tree, built once.
///
/// Exact duplicate points are dropped on construction; they cannot be
/// separated by any split and add nothing to nearest-neighbour queries.
pub struct PlanarMap {
    cloud: PointCloud2D,
    tree: MapTree,
}

impl PlanarMap {
    pub fn new(cloud: PointCloud2D) -> Self {
        let mut seen = HashSet::with_capacity(cloud.len());
        let mut unique = PointCloud2D::with_capacity(cloud.len());
        for (&x, &y) in cloud.xs.iter().zip(cloud.ys.iter()) {
            if seen.insert((x.to_bits(), y.to_bits())) {
                unique.push_xy(x, y);
            }
        }
        if unique.len() < cloud.len() {
            log::debug!(
                "Reference map: dropped {} duplicate points",
                cloud.len() - unique.len()
            );
        }

        let points: Vec<[f32; 2]> = unique
            .xs
            .iter()
            .zip(unique.ys.iter())
            .map(|(&x, &y)| [x, y])
            .collect();
        let tree = MapTree::new_from_slice(&points);
        Self {
            cloud: unique,
            tree,
        }
    }

    pub fn cloud(&self) -> &PointCloud2D {
        &self.cloud
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }
}

/// Planar scan-to-map ICP with annealed thresholds.
#[derive(Debug, Clone)]
pub struct PlanarIcp {
    config: PlanarIcpConfig,
}

impl PlanarIcp {
    pub fn new(config: PlanarIcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlanarIcpConfig {
        &self.config
    }

    /// Match against a prebuilt map index.
    pub fn match_against(
        &self,
        source: &PointCloud2D,
        map: &PlanarMap,
        initial_guess: &Pose2D,
    ) -> ScanMatchResult {
        if source.is_empty() || map.len() < 3 {
            return ScanMatchResult::failed(*initial_guess, 0);
        }

        let mut pose = *initial_guess;
        let mut threshold_dist = self.config.threshold_dist;
        let mut threshold_ang = self.config.threshold_ang;
        let mut converged = false;
        let mut iterations = 0u32;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let pairs = find_correspondences(source, map, &pose, threshold_dist, threshold_ang);
            if pairs.len() < self.config.min_correspondences {
                return ScanMatchResult::failed(*initial_guess, iterations);
            }

            let new_pose = fit_rigid(source, &map.cloud, &pairs);
            let step = new_pose.relative_to(&pose);
            pose = new_pose;

            let eps = self.config.step_epsilon;
            if step.x.abs() < eps && step.y.abs() < eps && step.theta.abs() < eps {
                threshold_dist *= self.config.alfa;
                threshold_ang *= self.config.alfa;
                if threshold_dist < self.config.smallest_threshold_dist {
                    converged = true;
                    break;
                }
            }
        }

        let pairs = find_correspondences(source, map, &pose, threshold_dist, threshold_ang);
        let goodness = pairs.len() as f32 / source.len() as f32;
        let mse = mean_squared_error(source, &map.cloud, &pairs, &pose);
        let covariance = estimate_covariance(source, &pairs, &pose, mse);

        ScanMatchResult {
            transform: pose,
            covariance,
            goodness,
            converged,
            iterations,
            mse,
        }
    }
}

/// Returns (source_idx, target_idx) pairs.
fn find_correspondences(
    source: &PointCloud2D,
    map: &PlanarMap,
    pose: &Pose2D,
    threshold_dist: f32,
    threshold_ang: f32,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(source.len());
    for (i, local) in source.iter().enumerate() {
        let q = pose.transform_point(&local);
        let nearest = map.tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y]);
        let limit = threshold_dist + threshold_ang * local.norm();
        if nearest.distance <= limit * limit {
            pairs.push((i, nearest.item as usize));
        }
    }
    pairs
}

/// Closed-form least-squares pose mapping local source points onto targets.
fn fit_rigid(source: &PointCloud2D, target: &PointCloud2D, pairs: &[(usize, usize)]) -> Pose2D {
    let n = pairs.len() as f64;
    let (mut sx, mut sy, mut tx, mut ty) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for &(si, ti) in pairs {
        sx += source.xs[si] as f64;
        sy += source.ys[si] as f64;
        tx += target.xs[ti] as f64;
        ty += target.ys[ti] as f64;
    }
    let (csx, csy, ctx, cty) = (sx / n, sy / n, tx / n, ty / n);

    let mut num = 0.0f64;
    let mut den = 0.0f64;
    for &(si, ti) in pairs {
        let ax = source.xs[si] as f64 - csx;
        let ay = source.ys[si] as f64 - csy;
        let bx = target.xs[ti] as f64 - ctx;
        let by = target.ys[ti] as f64 - cty;
        num += ax * by - ay * bx;
        den += ax * bx + ay * by;
    }

    let theta = num.atan2(den);
    let (sin_t, cos_t) = theta.sin_cos();
    Pose2D::new(
        (ctx - (csx * cos_t - csy * sin_t)) as f32,
        (cty - (csx * sin_t + csy * cos_t)) as f32,
        theta as f32,
    )
}

fn mean_squared_error(
    source: &PointCloud2D,
    target: &PointCloud2D,
    pairs: &[(usize, usize)],
    pose: &Pose2D,
) -> f32 {
    if pairs.is_empty() {
        return f32::MAX;
    }
    let sum: f32 = pairs
        .iter()
        .map(|&(si, ti)| {
            pose.transform_point(&source.point_at(si))
                .distance_squared(&target.point_at(ti))
        })
        .sum();
    sum / pairs.len() as f32
}

/// σ²·(JᵀJ)⁻¹ with J the residual Jacobian over (x, y, θ).
fn estimate_covariance(
    source: &PointCloud2D,
    pairs: &[(usize, usize)],
    pose: &Pose2D,
    mse: f32,
) -> Covariance2D {
    if pairs.len() < 3 || !mse.is_finite() {
        return Covariance2D::diagonal(1.0, 1.0, 0.1);
    }

    let heading = Pose2D::new(0.0, 0.0, pose.theta);
    let mut jtj = Matrix3::<f64>::zeros();
    for &(si, _) in pairs {
        let r: Point2D = heading.transform_point(&source.point_at(si));
        let (rx, ry) = (r.x as f64, r.y as f64);
        jtj[(0, 0)] += 1.0;
        jtj[(1, 1)] += 1.0;
        jtj[(0, 2)] -= ry;
        jtj[(1, 2)] += rx;
        jtj[(2, 2)] += rx * rx + ry * ry;
    }
    jtj[(2, 0)] = jtj[(0, 2)];
    jtj[(2, 1)] = jtj[(1, 2)];

    match jtj.try_inverse() {
        Some(inv) => Covariance2D::from_matrix(&(inv * mse as f64).cast::<f32>()),
        None => Covariance2D::diagonal(1.0, 1.0, 0.1),
    }
}
