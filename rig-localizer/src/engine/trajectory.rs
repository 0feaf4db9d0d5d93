//! Trajectory assembly and run statistics.

use std::time::Duration;

use crate::core::math::mean;

use super::interpolation::UnresolvedScan;
use super::refinement::RefinementReport;
use super::synchronizer::FrameSet;
use super::{LocalizationFix, RigScan};

/// Wall-clock time spent in each pipeline phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    /// Localization and interpolation over the whole archive.
    pub localization: Duration,
    /// Grouping and refinement over the resolved scans.
    pub refinement: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.localization + self.refinement
    }
}

/// Counters describing what happened to the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fixes: usize,
    pub non_converged_fixes: usize,
    pub scans_resolved: usize,
    pub scans_unresolved: usize,
    pub groups_emitted: usize,
    pub groups_refined: usize,
    pub fallbacks: usize,
}

/// Everything a run produces, ready for archival.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Posed scans in input archive order.
    pub scans: Vec<RigScan>,
    pub fixes: Vec<LocalizationFix>,
    pub goodness_log: Vec<f64>,
    /// Mean of `goodness_log`; `None` when nothing was refined.
    pub mean_goodness: Option<f64>,
    pub timings: PhaseTimings,
    pub unresolved: Vec<UnresolvedScan>,
    pub stats: RunStats,
}

impl ExportBundle {
    /// Log the run summary at info level.
    pub fn log_summary(&self) {
        let s = &self.stats;
        log::info!(
            "Fixes: {} ({} non-converged), scans resolved: {}, unresolved: {}",
            s.fixes,
            s.non_converged_fixes,
            s.scans_resolved,
            s.scans_unresolved
        );
        log::info!(
            "Groups emitted: {}, refined: {}, gate fallbacks: {}",
            s.groups_emitted,
            s.groups_refined,
            s.fallbacks
        );
        match self.mean_goodness {
            Some(m) => log::info!(
                "Mean goodness: {:.4} over {} alignments",
                m,
                self.goodness_log.len()
            ),
            None => log::info!("Mean goodness: n/a"),
        }
        log::info!(
            "Localization phase: {:.2}s, refinement phase: {:.2}s",
            self.timings.localization.as_secs_f64(),
            self.timings.refinement.as_secs_f64()
        );
    }
}

/// Collects posed scans and per-phase results into an [`ExportBundle`].
///
/// Scans arrive grouped or loose and in any order; export restores
/// archive order from each scan's sequence number. Poses are not touched.
#[derive(Debug, Default)]
pub struct TrajectoryAssembler {
    scans: Vec<RigScan>,
    unresolved: Vec<UnresolvedScan>,
    report: RefinementReport,
    stats: RunStats,
}

impl TrajectoryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: FrameSet) {
        self.scans.extend(group.into_scans());
    }

    /// Resolved scans that never joined an emitted group.
    pub fn add_scans(&mut self, scans: impl IntoIterator<Item = RigScan>) {
        self.scans.extend(scans);
    }

    pub fn set_unresolved(&mut self, unresolved: Vec<UnresolvedScan>) {
        self.unresolved = unresolved;
    }

    pub fn set_refinement(&mut self, report: RefinementReport, groups_emitted: usize) {
        self.stats.groups_emitted = groups_emitted;
        self.stats.groups_refined = report.groups_refined;
        self.stats.fallbacks = report.fallbacks;
        self.report = report;
    }

    pub fn set_non_converged_fixes(&mut self, count: usize) {
        self.stats.non_converged_fixes = count;
    }

    pub fn finalize(self, fixes: Vec<LocalizationFix>, timings: PhaseTimings) -> ExportBundle {
        let mut scans = self.scans;
        scans.sort_by_key(|s| s.sequence);

        let mut stats = self.stats;
        stats.fixes = fixes.len();
        stats.scans_resolved = scans.len();
        stats.scans_unresolved = self.unresolved.len();

        let goodness_log = self.report.goodness_log;
        ExportBundle {
            scans,
            fixes,
            mean_goodness: mean(&goodness_log),
            goodness_log,
            timings,
            unresolved: self.unresolved,
            stats,
        }
    }
}
