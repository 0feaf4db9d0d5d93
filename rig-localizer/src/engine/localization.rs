//! Planar localization tracker.
//!
//! Keeps one running pose, refines it against a static reference map for
//! every 2D scan, and emits a [`LocalizationFix`] per scan.

use crate::algorithms::matching::{PlanarIcp, PlanarMap};
use crate::core::types::{PointCloud2D, Pose2D};
use crate::error::Result;

use super::LocalizationFix;

/// Destination for emitted fixes (e.g. the trajectory log).
pub trait FixSink {
    fn record(&mut self, fix: &LocalizationFix) -> std::io::Result<()>;
}

/// Scan-to-map tracker with a persistent pose estimate.
pub struct PlanarLocalizer {
    icp: PlanarIcp,
    map: PlanarMap,
    current: Pose2D,
    fixes: Vec<LocalizationFix>,
    sink: Option<Box<dyn FixSink>>,
    min_goodness: f32,
    non_converged: usize,
}

impl PlanarLocalizer {
    /// Tracker starting at `initial_pose`.
    pub fn new(icp: PlanarIcp, map: PlanarMap, initial_pose: Pose2D) -> Self {
        Self {
            icp,
            map,
            current: initial_pose,
            fixes: Vec::new(),
            sink: None,
            min_goodness: 0.0,
            non_converged: 0,
        }
    }

    /// Every fix is also written to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn FixSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Alignments matching less than this fraction of the scan are
    /// treated as failed.
    pub fn with_min_goodness(mut self, min_goodness: f32) -> Self {
        self.min_goodness = min_goodness;
        self
    }

    /// Align `scan` against the map and append a fix at `timestamp_us`.
    ///
    /// A non-converged alignment keeps the previous pose; the fix is still
    /// emitted so interpolation can proceed. Only sink I/O fails.
    pub fn update(&mut self, timestamp_us: u64, scan: &PointCloud2D) -> Result<LocalizationFix> {
        let result = self.icp.match_against(scan, &self.map, &self.current);

        if result.converged && result.goodness >= self.min_goodness {
            self.current = result.transform;
            log::debug!(
                "Fix at {} us: {} ({} iterations, goodness {:.3})",
                timestamp_us,
                self.current,
                result.iterations,
                result.goodness
            );
        } else {
            self.non_converged += 1;
            log::warn!(
                "2D alignment at {} us failed ({} iterations, goodness {:.3}), keeping {}",
                timestamp_us,
                result.iterations,
                result.goodness,
                self.current
            );
        }

        let fix = LocalizationFix::new(self.current, timestamp_us);
        if let Some(sink) = self.sink.as_mut() {
            sink.record(&fix)?;
        }
        self.fixes.push(fix);
        Ok(fix)
    }

    pub fn current_pose(&self) -> Pose2D {
        self.current
    }

    /// Most recent fix, if any.
    pub fn last_fix(&self) -> Option<&LocalizationFix> {
        self.fixes.last()
    }

    pub fn fixes(&self) -> &[LocalizationFix] {
        &self.fixes
    }

    /// Number of scans whose alignment failed to converge or match.
    pub fn non_converged(&self) -> usize {
        self.non_converged
    }

    pub fn into_fixes(self) -> Vec<LocalizationFix> {
        self.fixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::matching::PlanarIcpConfig;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn room() -> PointCloud2D {
        let mut cloud = PointCloud2D::new();
        for i in 0..100 {
            let f = i as f32 / 100.0;
            let noise = i as f32 * 0.0001;
            cloud.push_xy(f * 4.0, noise);
            cloud.push_xy(4.0 + noise, f * 3.0);
            cloud.push_xy(4.0 - f * 4.0, 3.0 + noise);
            cloud.push_xy(noise, 3.0 - f * 3.0);
        }
        cloud
    }

    fn localizer(initial: Pose2D) -> PlanarLocalizer {
        PlanarLocalizer::new(
            PlanarIcp::new(PlanarIcpConfig::default()),
            PlanarMap::new(room()),
            initial,
        )
    }

    struct SharedSink(Rc<RefCell<Vec<LocalizationFix>>>);

    impl FixSink for SharedSink {
        fn record(&mut self, fix: &LocalizationFix) -> std::io::Result<()> {
            self.0.borrow_mut().push(*fix);
            Ok(())
        }
    }

    #[test]
    fn test_tracks_pose_and_records_fixes() {
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let mut tracker = localizer(Pose2D::new(0.8, 1.0, 0.0))
            .with_sink(Box::new(SharedSink(recorded.clone())));

        let truth = Pose2D::new(0.9, 1.1, 0.05);
        let scan = room().transform(&truth.inverse());
        let fix = tracker.update(1_000, &scan).unwrap();

        assert_eq!(fix.timestamp_us, 1_000);
        assert_relative_eq!(fix.data.x, 0.9, epsilon = 0.02);
        assert_relative_eq!(fix.data.y, 1.1, epsilon = 0.02);
        assert_relative_eq!(fix.data.theta, 0.05, epsilon = 0.01);
        assert_eq!(tracker.current_pose(), fix.data);
        assert_eq!(tracker.fixes().len(), 1);
        assert_eq!(recorded.borrow().len(), 1);
    }

    #[test]
    fn test_failed_alignment_keeps_stale_pose() {
        let start = Pose2D::new(0.8, 0.0, 0.0);
        let mut tracker = localizer(start);

        // Nothing near the map: no correspondences.
        let mut far = PointCloud2D::new();
        for i in 0..30 {
            far.push_xy(100.0 + i as f32 * 0.1, 100.0);
        }

        let fix = tracker.update(5, &far).unwrap();
        assert_eq!(fix.data, start);
        assert_eq!(tracker.non_converged(), 1);
        assert_eq!(tracker.last_fix().map(|f| f.timestamp_us), Some(5));
    }

    #[test]
    fn test_min_goodness_rejects_weak_match() {
        let start = Pose2D::new(0.8, 1.0, 0.0);
        let mut tracker = localizer(start).with_min_goodness(0.9);

        // Half the scan sees the room, half sees nothing.
        let mut scan = room().transform(&start.inverse());
        for i in 0..scan.len() {
            scan.push_xy(60.0 + i as f32 * 0.05, 60.0);
        }

        let fix = tracker.update(7, &scan).unwrap();
        assert_eq!(fix.data, start);
        assert_eq!(tracker.non_converged(), 1);
    }
}
