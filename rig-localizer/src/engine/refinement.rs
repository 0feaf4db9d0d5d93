//! Sequential group refinement.
//!
//! The first frame set only seeds the reference cloud. Every later set is
//! aligned against that reference and corrected by the resulting transform:
//!
//! ```text
//! source = group scans placed at their seeded poses (world frame)
//! target = reference cloud
//! T      = align(source, target)           gated by the backend
//! pose'  = T ⊕ pose                        for every scan in the group
//! ```
//!
//! A result whose goodness fails the gate is replaced by the last accepted
//! transform, or identity when none exists yet. Only accepted raw results
//! ever become the last accepted transform.
//!
//! With [`ReferencePolicy::Accumulate`] each scan is aligned on its own and
//! the reference keeps every corrected group; with
//! [`ReferencePolicy::Replace`] the whole group is aligned at once and the
//! reference becomes that group.

use crate::algorithms::matching::RigidAligner;
use crate::core::types::{PointCloud3D, Pose3D};

use super::synchronizer::FrameSet;
use super::RigScan;

/// How the reference cloud evolves between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Reference is the previous corrected group.
    #[default]
    Replace,
    /// Reference is the union of every corrected group so far.
    Accumulate,
}

/// Where a group's starting poses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Use the poses assigned by temporal interpolation.
    #[default]
    Interpolated,
    /// Copy each sensor's refined pose from the previous group.
    CarryForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinerState {
    /// No group seen yet.
    Seeding,
    /// Reference exists; every group is aligned.
    Steady,
}

/// Reference cloud owned by the refiner, bumped on every change.
#[derive(Debug, Clone)]
pub struct ReferenceState {
    cloud: PointCloud3D,
    version: u64,
}

impl ReferenceState {
    fn new(cloud: PointCloud3D) -> Self {
        Self { cloud, version: 0 }
    }

    fn replace(&mut self, cloud: PointCloud3D) {
        self.cloud = cloud;
        self.version += 1;
    }

    fn extend(&mut self, cloud: &PointCloud3D) {
        self.cloud.extend(cloud);
        self.version += 1;
    }

    pub fn cloud(&self) -> &PointCloud3D {
        &self.cloud
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Summary of a refinement phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementReport {
    /// Raw goodness of every alignment call, in call order.
    pub goodness_log: Vec<f64>,
    /// Groups that went through alignment (the seeding group excluded).
    pub groups_refined: usize,
    /// Alignment calls whose result the gate rejected.
    pub fallbacks: usize,
}

/// Stateful refinement engine threading reference and last accepted
/// transform across groups.
pub struct GroupRefiner<A: RigidAligner> {
    aligner: A,
    policy: ReferencePolicy,
    seed: SeedPolicy,
    reference: Option<ReferenceState>,
    last_good: Option<Pose3D>,
    previous_poses: Vec<Pose3D>,
    report: RefinementReport,
}

impl<A: RigidAligner> GroupRefiner<A> {
    pub fn new(aligner: A, policy: ReferencePolicy, seed: SeedPolicy) -> Self {
        Self {
            aligner,
            policy,
            seed,
            reference: None,
            last_good: None,
            previous_poses: Vec::new(),
            report: RefinementReport::default(),
        }
    }

    pub fn state(&self) -> RefinerState {
        if self.reference.is_some() {
            RefinerState::Steady
        } else {
            RefinerState::Seeding
        }
    }

    /// Point count of the current reference cloud (0 while seeding).
    pub fn reference_len(&self) -> usize {
        self.reference.as_ref().map_or(0, |r| r.cloud.len())
    }

    pub fn reference(&self) -> Option<&ReferenceState> {
        self.reference.as_ref()
    }

    /// Last transform that passed the gate.
    pub fn last_good(&self) -> Option<Pose3D> {
        self.last_good
    }

    pub fn goodness_log(&self) -> &[f64] {
        &self.report.goodness_log
    }

    pub fn aligner(&self) -> &A {
        &self.aligner
    }

    /// Correct the poses of `group` and update the reference.
    pub fn refine(&mut self, mut group: FrameSet) -> FrameSet {
        if self.seed == SeedPolicy::CarryForward {
            self.carry_forward(&mut group);
        }

        let Some(mut reference) = self.reference.take() else {
            log::debug!(
                "Seeding reference with {} points from group at {} us",
                group.point_count(),
                group.timestamp_us()
            );
            self.reference = Some(ReferenceState::new(group_cloud(&group)));
            self.remember_poses(&group);
            return group;
        };

        match self.policy {
            ReferencePolicy::Replace => {
                let source = group_cloud(&group);
                let transform = self.gated_align(&source, reference.cloud());
                for scan in group.scans_mut() {
                    apply(scan, &transform);
                }
                reference.replace(group_cloud(&group));
            }
            ReferencePolicy::Accumulate => {
                for scan in group.scans_mut() {
                    let source = world_cloud(scan);
                    let transform = self.gated_align(&source, reference.cloud());
                    apply(scan, &transform);
                }
                reference.extend(&group_cloud(&group));
            }
        }

        self.reference = Some(reference);
        self.report.groups_refined += 1;
        self.remember_poses(&group);
        group
    }

    /// Consume the refiner and return its run summary.
    pub fn finish(self) -> RefinementReport {
        self.report
    }

    fn gated_align(&mut self, source: &PointCloud3D, target: &PointCloud3D) -> Pose3D {
        let result = self.aligner.align(source, target, &Pose3D::identity());
        let gate = self.aligner.gate();

        if result.goodness.is_finite() {
            self.report.goodness_log.push(result.goodness);
        }
        log::debug!(
            "{} alignment: {} points onto {}, {} iterations, goodness {:.4}, converged {}",
            self.aligner.name(),
            source.len(),
            target.len(),
            result.iterations,
            result.goodness,
            result.converged
        );

        if gate.accepts(result.goodness) {
            self.last_good = Some(result.transform);
            return result.transform;
        }

        self.report.fallbacks += 1;
        let fallback = self.last_good.unwrap_or_else(Pose3D::identity);
        log::warn!(
            "{} goodness {:.4} fails gate {}, using {} transform",
            self.aligner.name(),
            result.goodness,
            gate,
            if self.last_good.is_some() {
                "last accepted"
            } else {
                "identity"
            }
        );
        fallback
    }

    fn carry_forward(&self, group: &mut FrameSet) {
        if self.previous_poses.len() != group.len() {
            return;
        }
        for (scan, pose) in group.scans_mut().iter_mut().zip(&self.previous_poses) {
            scan.resolved_pose = Some(*pose);
        }
    }

    fn remember_poses(&mut self, group: &FrameSet) {
        self.previous_poses = group.scans().iter().map(seed_pose).collect();
    }
}

/// Pose the scan currently sits at; unresolved scans fall back to their
/// mounting offset.
fn seed_pose(scan: &RigScan) -> Pose3D {
    scan.resolved_pose.unwrap_or(scan.extrinsic)
}

fn world_cloud(scan: &RigScan) -> PointCloud3D {
    scan.points.transform(&seed_pose(scan))
}

fn group_cloud(group: &FrameSet) -> PointCloud3D {
    let mut cloud = PointCloud3D::with_capacity(group.point_count());
    for scan in group.scans() {
        cloud.extend(&world_cloud(scan));
    }
    cloud
}

fn apply(scan: &mut RigScan, transform: &Pose3D) {
    scan.resolved_pose = Some(transform.compose(&seed_pose(scan)));
}
