//! Observation archive: recording and playback.
//!
//! # File Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ Header (64 bytes, postcard, zero padded)         │
//! │ - Magic: "RLOG" (4 bytes)                        │
//! │ - Version: u16                                   │
//! │ - Flags: u16                                     │
//! │ - Start time: u64 (microseconds)                 │
//! │ - End time: u64 (microseconds)                   │
//! │ - Message count: u64                             │
//! │ - Reserved: 16 bytes                             │
//! ├──────────────────────────────────────────────────┤
//! │ Observation Stream                               │
//! │ [len:u32 LE][postcard Observation]...            │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Input archives hold planar and rig scans in capture order. Output
//! archives hold rig scans only, each carrying its resolved pose.

mod player;
mod recorder;
mod types;

#[cfg(test)]
mod test_fixtures;

pub use player::{ArchivePlayer, PlayerError};
pub use recorder::{ArchiveRecorder, RecorderError};
pub use types::{ArchiveHeader, ArchiveInfo, ARCHIVE_MAGIC, ARCHIVE_VERSION, HEADER_SIZE};

use std::path::Path;

use crate::engine::RigScan;

/// Write posed rig scans to a new archive at `path`.
pub fn export_scans(path: impl AsRef<Path>, scans: &[RigScan]) -> Result<ArchiveInfo, RecorderError> {
    let mut recorder = ArchiveRecorder::create(path)?;
    for scan in scans {
        recorder.record_scan(scan)?;
    }
    recorder.finish()
}
