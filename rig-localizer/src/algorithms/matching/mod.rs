//! Rigid alignment of point sets.
//!
//! Two families live here:
//!
//! - [`PlanarIcp`]: planar scan-to-map alignment used by the localization
//!   tracker, reporting a [`ScanMatchResult`].
//! - [`RigidAligner`]: 6-DOF cloud-to-cloud alignment used by group
//!   refinement ([`PointToPointIcp3D`], [`GeneralizedIcp`]).
//!
//! Each 3D backend reports goodness on its own scale and carries the
//! [`GoodnessGate`] that decides whether a result may be trusted.
//!
//! # Example
//!
//! ```ignore
//! use rig_localizer::algorithms::matching::{Icp3DConfig, PointToPointIcp3D, RigidAligner};
//!
//! let mut icp = PointToPointIcp3D::new(Icp3DConfig::default());
//! let result = icp.align(&source, &target, &Pose3D::identity());
//! if icp.gate().accepts(result.goodness) {
//!     log::info!("Transform: {}", result.transform);
//! }
//! ```

mod gicp;
mod icp;
mod icp3d;
mod scripted;
mod spatial;

#[cfg(test)]
pub(crate) mod test_utils;

pub use gicp::{GeneralizedIcp, GicpConfig};
pub use icp::{PlanarIcp, PlanarIcpConfig, PlanarMap};
pub use icp3d::{Icp3DConfig, PointToPointIcp3D};
pub use scripted::AlignmentScript;
pub use spatial::PointIndex3D;

use crate::core::types::{Covariance2D, PointCloud3D, Pose2D, Pose3D};

/// Result of a planar scan matching operation.
#[derive(Debug, Clone)]
pub struct ScanMatchResult {
    /// Estimated pose of the scan in the map frame.
    pub transform: Pose2D,

    /// Covariance of the transform estimate.
    pub covariance: Covariance2D,

    /// Fraction of scan points with a map correspondence, in [0, 1].
    pub goodness: f32,

    /// Whether the algorithm converged within its iteration budget.
    pub converged: bool,

    /// Number of iterations performed.
    pub iterations: u32,

    /// Mean squared error of final correspondences.
    pub mse: f32,
}

impl ScanMatchResult {
    /// Failed result that keeps the caller's guess.
    pub fn failed(initial_guess: Pose2D, iterations: u32) -> Self {
        Self {
            transform: initial_guess,
            covariance: Covariance2D::diagonal(1.0, 1.0, 0.1),
            goodness: 0.0,
            converged: false,
            iterations,
            mse: f32::MAX,
        }
    }
}

/// Result of a 6-DOF alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    /// Transform mapping source points onto the target.
    pub transform: Pose3D,

    pub iterations: u32,

    /// Backend-specific quality score. See [`RigidAligner::gate`].
    pub goodness: f64,

    pub converged: bool,
}

impl AlignmentResult {
    pub fn new(transform: Pose3D, iterations: u32, goodness: f64, converged: bool) -> Self {
        Self {
            transform,
            iterations,
            goodness,
            converged,
        }
    }
}

/// Acceptance rule for a backend's goodness score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoodnessGate {
    /// Higher is better; accept when `goodness >= threshold`.
    AtLeast(f64),
    /// Lower is better; accept when `goodness <= threshold`.
    AtMost(f64),
    /// Every finite result is accepted.
    Ungated,
}

impl GoodnessGate {
    /// Whether a result with this goodness may be applied.
    ///
    /// Non-finite scores never pass.
    pub fn accepts(&self, goodness: f64) -> bool {
        if !goodness.is_finite() {
            return false;
        }
        match *self {
            GoodnessGate::AtLeast(threshold) => goodness >= threshold,
            GoodnessGate::AtMost(threshold) => goodness <= threshold,
            GoodnessGate::Ungated => true,
        }
    }
}

impl std::fmt::Display for GoodnessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoodnessGate::AtLeast(t) => write!(f, ">= {}", t),
            GoodnessGate::AtMost(t) => write!(f, "<= {}", t),
            GoodnessGate::Ungated => write!(f, "ungated"),
        }
    }
}

/// A 6-DOF rigid alignment backend.
pub trait RigidAligner {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Align `source` onto `target`, starting from `initial_guess`.
    ///
    /// Never fails: degenerate inputs yield a non-converged result whose
    /// goodness the gate rejects.
    fn align(
        &mut self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> AlignmentResult;

    /// Gate matching this backend's goodness scale.
    fn gate(&self) -> GoodnessGate;
}

impl<A: RigidAligner + ?Sized> RigidAligner for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn align(
        &mut self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> AlignmentResult {
        (**self).align(source, target, initial_guess)
    }

    fn gate(&self) -> GoodnessGate {
        (**self).gate()
    }
}
