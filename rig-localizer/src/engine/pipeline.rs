//! Two-phase run driver.
//!
//! Phase 1 walks the archive once: planar scans feed the localizer, rig
//! scans wait in the pending buffer and are resolved as fixes arrive.
//! Phase 2 groups the resolved scans and refines the groups in order.
//!
//! All run state lives in [`Pipeline`]; nothing is global.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::algorithms::matching::RigidAligner;
use crate::error::{LocalizerError, Result};

use super::interpolation::{PendingScanBuffer, UnresolvedScan};
use super::localization::PlanarLocalizer;
use super::refinement::{GroupRefiner, ReferencePolicy, SeedPolicy};
use super::synchronizer::{FrameGroupSynchronizer, RigLayout};
use super::trajectory::{ExportBundle, PhaseTimings, TrajectoryAssembler};
use super::{LocalizationFix, Observation, RigScan};

/// 3D alignment backend used for refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Point-to-point ICP, percentage goodness.
    Icp,
    /// Generalized ICP, squared-error fitness.
    Gicp,
}

impl Backend {
    pub fn tag(&self) -> &'static str {
        match self {
            Backend::Icp => "ICP",
            Backend::Gicp => "GICP",
        }
    }
}

/// Policy switches selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    /// Track the platform with 2D scans and interpolate rig poses.
    pub localization: bool,
    /// Refine groups with this backend; `None` exports interpolated poses.
    pub refinement: Option<Backend>,
    /// Accumulate every corrected group into the reference.
    pub accumulate: bool,
}

impl Default for RunMode {
    fn default() -> Self {
        Self {
            localization: true,
            refinement: None,
            accumulate: false,
        }
    }
}

impl RunMode {
    /// Suffix appended to the input file stem.
    pub fn output_tag(&self) -> String {
        let mut tag = match self.refinement {
            Some(backend) => format!("_located-{}", backend.tag()),
            None => "_located".to_string(),
        };
        if self.refinement.is_some() && self.accumulate {
            tag.push_str("-memory");
        }
        tag
    }

    /// Output archive path next to `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{}{}", stem, self.output_tag());
        if let Some(ext) = input.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        input.with_file_name(name)
    }

    pub fn reference_policy(&self) -> ReferencePolicy {
        if self.accumulate {
            ReferencePolicy::Accumulate
        } else {
            ReferencePolicy::Replace
        }
    }

    /// Without 2D fixes every scan sits at its extrinsic, so the previous
    /// group's refined poses are the better seed.
    pub fn seed_policy(&self) -> SeedPolicy {
        if self.localization {
            SeedPolicy::Interpolated
        } else {
            SeedPolicy::CarryForward
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "localization {}, refinement {}, reference {}",
            if self.localization { "on" } else { "off" },
            self.refinement.map_or("off", |b| b.tag()),
            if self.accumulate { "accumulated" } else { "previous group" }
        )
    }
}

/// Owns every stage for one run.
pub struct Pipeline {
    mode: RunMode,
    layout: RigLayout,
    localizer: Option<PlanarLocalizer>,
    aligner: Option<Box<dyn RigidAligner>>,
}

impl Pipeline {
    /// Wire a run. The localizer must be present exactly when the mode
    /// enables localization, and likewise the aligner for refinement.
    pub fn new(
        mode: RunMode,
        layout: RigLayout,
        localizer: Option<PlanarLocalizer>,
        aligner: Option<Box<dyn RigidAligner>>,
    ) -> Result<Self> {
        if mode.localization != localizer.is_some() {
            return Err(LocalizerError::Config(format!(
                "localization is {} but a localizer was {}",
                if mode.localization { "enabled" } else { "disabled" },
                if localizer.is_some() { "given" } else { "not given" }
            )));
        }
        if mode.refinement.is_some() != aligner.is_some() {
            return Err(LocalizerError::Config(
                "refinement backend and aligner do not match".into(),
            ));
        }
        Ok(Self {
            mode,
            layout,
            localizer,
            aligner,
        })
    }

    /// Run both phases over `observations` (archive order).
    ///
    /// Only errors from the observation source or the fix sink abort.
    pub fn run<I, E>(self, observations: I) -> Result<ExportBundle>
    where
        I: IntoIterator<Item = std::result::Result<Observation, E>>,
        LocalizerError: From<E>,
    {
        let Pipeline {
            mode,
            layout,
            localizer,
            aligner,
        } = self;

        log::info!("Run mode: {}", mode);
        let mut assembler = TrajectoryAssembler::new();

        let phase = Instant::now();
        let located = locate(localizer, observations)?;
        let localization_time = phase.elapsed();
        log::info!(
            "Localization phase: {} fixes, {} scans resolved, {} unresolved in {:.2}s",
            located.fixes.len(),
            located.resolved.len(),
            located.unresolved.len(),
            localization_time.as_secs_f64()
        );
        assembler.set_unresolved(located.unresolved);
        assembler.set_non_converged_fixes(located.non_converged);

        let phase = Instant::now();
        let refiner = aligner
            .map(|a| GroupRefiner::new(a, mode.reference_policy(), mode.seed_policy()));
        refine(layout, refiner, located.resolved, &mut assembler);
        let refinement_time = phase.elapsed();

        let timings = PhaseTimings {
            localization: localization_time,
            refinement: refinement_time,
        };
        Ok(assembler.finalize(located.fixes, timings))
    }
}

struct Located {
    fixes: Vec<LocalizationFix>,
    resolved: Vec<RigScan>,
    unresolved: Vec<UnresolvedScan>,
    non_converged: usize,
}

/// Phase 1: demultiplex, localize and interpolate.
fn locate<I, E>(mut localizer: Option<PlanarLocalizer>, observations: I) -> Result<Located>
where
    I: IntoIterator<Item = std::result::Result<Observation, E>>,
    LocalizerError: From<E>,
{
    let mut buffer = PendingScanBuffer::new();
    let mut resolved = Vec::new();
    let mut sequence = 0u64;
    let mut ignored_planar = 0usize;

    for observation in observations {
        match observation? {
            Observation::PlanarScan {
                timestamp_us,
                points,
                ..
            } => {
                let Some(localizer) = localizer.as_mut() else {
                    ignored_planar += 1;
                    continue;
                };
                let previous = localizer.last_fix().copied();
                let fix = localizer.update(timestamp_us, &points)?;
                if let Some(previous) = previous {
                    resolved.extend(buffer.flush(&previous, &fix));
                }
            }
            Observation::RangeScan(mut scan) => {
                scan.sequence = sequence;
                sequence += 1;
                if localizer.is_some() {
                    buffer.buffer(scan);
                } else {
                    scan.resolved_pose = Some(scan.extrinsic);
                    resolved.push(scan);
                }
            }
        }
    }

    if ignored_planar > 0 {
        log::info!("Ignored {} planar scans (localization disabled)", ignored_planar);
    }

    let (fixes, non_converged) = match localizer {
        Some(localizer) => {
            let non_converged = localizer.non_converged();
            (localizer.into_fixes(), non_converged)
        }
        None => (Vec::new(), 0),
    };
    let unresolved = buffer.finish(fixes.last());

    Ok(Located {
        fixes,
        resolved,
        unresolved,
        non_converged,
    })
}

/// Phase 2: group resolved scans and refine each group in order.
fn refine(
    layout: RigLayout,
    mut refiner: Option<GroupRefiner<Box<dyn RigidAligner>>>,
    resolved: Vec<RigScan>,
    assembler: &mut TrajectoryAssembler,
) {
    let expected_groups = resolved.len() / layout.len().max(1);
    let mut sync = FrameGroupSynchronizer::new(layout);

    for scan in resolved {
        let Some(group) = sync.ingest(scan) else {
            continue;
        };
        let group = match refiner.as_mut() {
            Some(refiner) => {
                let started = Instant::now();
                let group = refiner.refine(group);
                let goodness = refiner
                    .goodness_log()
                    .last()
                    .map_or_else(|| "-".to_string(), |g| format!("{:.4}", g));
                log::info!(
                    "Group {} of approx. {}: goodness {}, {:.1} ms",
                    sync.groups_emitted(),
                    expected_groups,
                    goodness,
                    started.elapsed().as_secs_f64() * 1000.0
                );
                group
            }
            None => group,
        };
        assembler.add_group(group);
    }

    let groups_emitted = sync.groups_emitted();
    assembler.add_scans(sync.finish());
    let report = refiner.map(GroupRefiner::finish).unwrap_or_default();
    assembler.set_refinement(report, groups_emitted);
}
