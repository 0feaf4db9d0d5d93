//! rig-localizer - globally posed 3D trajectories for a multi-sensor rig
//!
//! Fuses a low-rate planar localization stream with a higher-rate stream of
//! 3D range scans from several rig sensors, then refines the per-sensor
//! poses by chaining rigid alignments group after group.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │     (observation archive, reference map, log)       │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │  (localization, interpolation, grouping, refining)  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │         (2D ICP, 3D ICP, GICP, voxel grid)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │            (poses, point clouds, math)              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Run phases
//!
//! 1. Localization: every planar scan is aligned against the reference map;
//!    rig scans between two fixes get an interpolated pose.
//! 2. Refinement: resolved scans are grouped one per sensor and each group
//!    is aligned against the previous group (or everything so far).

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 3: Engine (depends on core, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 4: I/O infrastructure (depends on all layers)
// ============================================================================
pub mod io;

pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use core::math;
pub use core::types::{Point2D, Point3D, PointCloud2D, PointCloud3D, Pose2D, Pose3D, Timestamped};

// Algorithms - Matching
pub use algorithms::matching::{
    AlignmentResult, AlignmentScript, GeneralizedIcp, GicpConfig, GoodnessGate, Icp3DConfig,
    PlanarIcp, PlanarIcpConfig, PlanarMap, PointToPointIcp3D, RigidAligner, ScanMatchResult,
};

// Engine
pub use engine::interpolation::{PendingScanBuffer, UnresolvedReason, UnresolvedScan};
pub use engine::localization::{FixSink, PlanarLocalizer};
pub use engine::pipeline::{Backend, Pipeline, RunMode};
pub use engine::refinement::{GroupRefiner, ReferencePolicy, RefinementReport, SeedPolicy};
pub use engine::synchronizer::{FrameGroupSynchronizer, FrameSet, RigLayout};
pub use engine::trajectory::{ExportBundle, PhaseTimings, RunStats, TrajectoryAssembler};
pub use engine::{LocalizationFix, Observation, RigScan};

// I/O
pub use io::archive::{export_scans, ArchiveInfo, ArchivePlayer, ArchiveRecorder};
pub use io::map_loader::load_reference_map;
pub use io::trajectory_log::TrajectoryLog;

pub use config::RunConfig;
pub use error::{LocalizerError, Result};
