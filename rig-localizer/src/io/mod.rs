//! I/O layer.
//!
//! - [`archive`]: observation archive recording and playback
//! - [`map_loader`]: plain-text reference map
//! - [`trajectory_log`]: per-fix text log

pub mod archive;
pub mod map_loader;
pub mod trajectory_log;

pub use archive::{export_scans, ArchiveInfo, ArchivePlayer, ArchiveRecorder};
pub use map_loader::load_reference_map;
pub use trajectory_log::{read_trajectory_log, TrajectoryLog};
