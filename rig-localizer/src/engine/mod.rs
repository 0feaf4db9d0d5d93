//! Pipeline orchestration layer.
//!
//! Observations flow through these stages in archive order:
//!
//! ```text
//! Observation ─┬─ PlanarScan ─▶ PlanarLocalizer ─▶ fix ─┐
//!              └─ RangeScan ──▶ PendingScanBuffer ◀─────┘
//!                                     │ resolved scans
//!                                     ▼
//!                          FrameGroupSynchronizer ─▶ FrameSet
//!                                     │
//!                                     ▼
//!                               GroupRefiner ─▶ TrajectoryAssembler
//! ```
//!
//! - [`localization`]: planar scan-to-map tracking
//! - [`interpolation`]: pose assignment between bracketing fixes
//! - [`synchronizer`]: one-scan-per-sensor grouping
//! - [`refinement`]: sequential gated group alignment
//! - [`trajectory`]: export bundle and run statistics
//! - [`pipeline`]: two-phase driver owning all of the above

pub mod interpolation;
pub mod localization;
pub mod pipeline;
pub mod refinement;
pub mod synchronizer;
pub mod trajectory;
mod types;

pub use types::{LocalizationFix, Observation, RigScan};
