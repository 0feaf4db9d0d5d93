//! Pending-scan buffer and temporal pose interpolation.
//!
//! Rig scans wait here until a pair of localization fixes brackets them.
//! The planar pose at time t is
//!
//! ```text
//! alpha = (t - t₀) / (t₁ - t₀)
//! base  = P₀ ⊕ alpha · (P₁ ⊖ P₀)
//! pose  = lift(base) ⊕ extrinsic
//! ```
//!
//! where `alpha ·` scales the three planar components of the relative pose.
//! Scans that cannot be bracketed are reported as [`UnresolvedScan`]s
//! instead of receiving a guessed pose.

use crate::core::types::{Pose2D, Pose3D};

use super::{LocalizationFix, RigScan};

/// Why a scan never received a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The scan predates the first localization fix.
    NoPriorFix,
    /// The stream ended before a fix closed the scan's interval.
    NoClosingFix,
    /// The bracketing fixes share a timestamp or run backwards.
    DegenerateInterval,
    /// The scan lies after the closing fix.
    OutOfBracket,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            UnresolvedReason::NoPriorFix => "no prior fix",
            UnresolvedReason::NoClosingFix => "no closing fix",
            UnresolvedReason::DegenerateInterval => "degenerate fix interval",
            UnresolvedReason::OutOfBracket => "outside fix interval",
        };
        f.write_str(text)
    }
}

/// A scan dropped from the trajectory, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedScan {
    pub scan: RigScan,
    pub reason: UnresolvedReason,
}

/// Planar pose at `timestamp_us` between two fixes.
pub fn interpolate_planar(
    prev: &LocalizationFix,
    curr: &LocalizationFix,
    timestamp_us: u64,
) -> Result<Pose2D, UnresolvedReason> {
    let span = match curr.elapsed_since(prev) {
        Some(span) if span > 0 => span,
        _ => return Err(UnresolvedReason::DegenerateInterval),
    };
    if timestamp_us < prev.timestamp_us {
        return Err(UnresolvedReason::NoPriorFix);
    }
    if timestamp_us > curr.timestamp_us {
        return Err(UnresolvedReason::OutOfBracket);
    }

    let alpha = (timestamp_us - prev.timestamp_us) as f64 / span as f64;
    let delta = curr.data.relative_to(&prev.data);
    Ok(prev.data.compose(&delta.scaled(alpha as f32)))
}

/// Holds rig scans until a bracketing pair of fixes exists.
#[derive(Debug, Default)]
pub struct PendingScanBuffer {
    pending: Vec<RigScan>,
    unresolved: Vec<UnresolvedScan>,
}

impl PendingScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scan for the next flush.
    pub fn buffer(&mut self, scan: RigScan) {
        self.pending.push(scan);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Resolve all pending scans against the interval `[prev, curr]`.
    ///
    /// Resolved scans are returned in arrival order with `resolved_pose`
    /// set; the rest are recorded as unresolved. The pending list is empty
    /// afterwards.
    pub fn flush(&mut self, prev: &LocalizationFix, curr: &LocalizationFix) -> Vec<RigScan> {
        let mut resolved = Vec::with_capacity(self.pending.len());
        for mut scan in self.pending.drain(..) {
            match interpolate_planar(prev, curr, scan.timestamp_us) {
                Ok(base) => {
                    scan.resolved_pose = Some(Pose3D::from_planar(&base).compose(&scan.extrinsic));
                    resolved.push(scan);
                }
                Err(reason) => {
                    log::warn!(
                        "Dropping {} scan at {} us: {}",
                        scan.sensor_label,
                        scan.timestamp_us,
                        reason
                    );
                    self.unresolved.push(UnresolvedScan { scan, reason });
                }
            }
        }
        resolved
    }

    /// Flag everything still pending at end of stream and return all
    /// unresolved scans.
    pub fn finish(mut self, last_fix: Option<&LocalizationFix>) -> Vec<UnresolvedScan> {
        for scan in self.pending.drain(..) {
            let reason = match last_fix {
                Some(fix) if scan.timestamp_us >= fix.timestamp_us => UnresolvedReason::NoClosingFix,
                _ => UnresolvedReason::NoPriorFix,
            };
            log::warn!(
                "Dropping {} scan at {} us: {}",
                scan.sensor_label,
                scan.timestamp_us,
                reason
            );
            self.unresolved.push(UnresolvedScan { scan, reason });
        }
        self.unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PointCloud3D;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn fix(t: u64, x: f32, y: f32, theta: f32) -> LocalizationFix {
        LocalizationFix::new(Pose2D::new(x, y, theta), t)
    }

    fn scan(t: u64, extrinsic: Pose3D) -> RigScan {
        RigScan::new("RGBD_1", t, PointCloud3D::new(), extrinsic)
    }

    #[test]
    fn test_endpoints_resolve_to_fixes() {
        let p0 = fix(100, 1.0, 2.0, 0.3);
        let p1 = fix(200, 2.0, 2.5, 0.9);
        let ext = Pose3D::new(0.1, 0.0, 1.2, 0.0, 0.2, 0.0);

        let mut buffer = PendingScanBuffer::new();
        buffer.buffer(scan(100, ext));
        buffer.buffer(scan(200, ext));
        let out = buffer.flush(&p0, &p1);

        let at_start = out[0].resolved_pose.unwrap();
        let expected = Pose3D::from_planar(&p0.data).compose(&ext);
        assert_relative_eq!(at_start.x(), expected.x(), epsilon = 1e-5);
        assert_relative_eq!(at_start.y(), expected.y(), epsilon = 1e-5);
        assert_relative_eq!(at_start.z(), expected.z(), epsilon = 1e-5);

        let at_end = out[1].resolved_pose.unwrap();
        let expected = Pose3D::from_planar(&p1.data).compose(&ext);
        assert_relative_eq!(at_end.x(), expected.x(), epsilon = 1e-5);
        assert_relative_eq!(at_end.y(), expected.y(), epsilon = 1e-5);
        assert_relative_eq!(
            at_end.compose(&expected.inverse()).rotation_angle(),
            0.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_midpoint_is_half_relative_motion() {
        let p0 = fix(0, 1.0, 1.0, FRAC_PI_2);
        let p1 = fix(10, 1.0, 3.0, FRAC_PI_2);

        // Facing +Y and moving 2 m forward: halfway is 1 m ahead.
        let mid = interpolate_planar(&p0, &p1, 5).unwrap();
        assert_relative_eq!(mid.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(mid.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(mid.theta, FRAC_PI_2, epsilon = 1e-5);

        let half = p1.data.relative_to(&p0.data).scaled(0.5);
        let expected = p0.data.compose(&half);
        assert_relative_eq!(mid.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(mid.y, expected.y, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_interval_is_flagged() {
        let p0 = fix(50, 0.0, 0.0, 0.0);
        let p1 = fix(50, 1.0, 0.0, 0.0);

        let mut buffer = PendingScanBuffer::new();
        buffer.buffer(scan(50, Pose3D::identity()));
        assert!(buffer.flush(&p0, &p1).is_empty());

        let unresolved = buffer.finish(Some(&p1));
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].reason, UnresolvedReason::DegenerateInterval);
    }

    #[test]
    fn test_scan_before_first_fix_is_flagged() {
        let p0 = fix(100, 0.0, 0.0, 0.0);
        let p1 = fix(200, 1.0, 0.0, 0.0);

        let mut buffer = PendingScanBuffer::new();
        buffer.buffer(scan(40, Pose3D::identity()));
        buffer.buffer(scan(150, Pose3D::identity()));
        assert_eq!(buffer.pending_len(), 2);
        let resolved = buffer.flush(&p0, &p1);

        assert_eq!(buffer.pending_len(), 0);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].timestamp_us, 150);
        let unresolved = buffer.finish(Some(&p1));
        assert_eq!(unresolved[0].reason, UnresolvedReason::NoPriorFix);
    }

    #[test]
    fn test_finish_classifies_leftovers() {
        let only = fix(100, 0.0, 0.0, 0.0);
        let mut buffer = PendingScanBuffer::new();
        buffer.buffer(scan(90, Pose3D::identity()));
        buffer.buffer(scan(120, Pose3D::identity()));

        let unresolved = buffer.finish(Some(&only));
        assert_eq!(unresolved[0].reason, UnresolvedReason::NoPriorFix);
        assert_eq!(unresolved[1].reason, UnresolvedReason::NoClosingFix);

        let mut empty_stream = PendingScanBuffer::new();
        empty_stream.buffer(scan(5, Pose3D::identity()));
        assert_eq!(
            empty_stream.finish(None)[0].reason,
            UnresolvedReason::NoPriorFix
        );
    }

    #[test]
    fn test_out_of_bracket() {
        let p0 = fix(0, 0.0, 0.0, 0.0);
        let p1 = fix(10, 1.0, 0.0, 0.0);
        assert_eq!(
            interpolate_planar(&p0, &p1, 11),
            Err(UnresolvedReason::OutOfBracket)
        );
    }
}
