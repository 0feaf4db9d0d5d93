//! Header and summary types for the observation archive.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Magic bytes at start of an archive.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"RLOG";

/// Current archive format version.
pub const ARCHIVE_VERSION: u16 = 1;

/// Size of the archive header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Upper bound on a single encoded observation.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Archive header (64 bytes fixed size, zero padded).
///
/// Postcard varint encoding keeps the worst case at 56 bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    /// Magic bytes: "RLOG"
    pub magic: [u8; 4],
    pub version: u16,
    pub flags: u16,
    /// Timestamp of first observation (microseconds)
    pub start_time_us: u64,
    /// Timestamp of last observation (microseconds)
    pub end_time_us: u64,
    pub message_count: u64,
    pub reserved: [u8; 16],
}

impl ArchiveHeader {
    pub fn new() -> Self {
        Self {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            flags: 0,
            start_time_us: 0,
            end_time_us: 0,
            message_count: 0,
            reserved: [0; 16],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == ARCHIVE_MAGIC
    }

    pub fn duration_us(&self) -> u64 {
        self.end_time_us.saturating_sub(self.start_time_us)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_us() as f64 / 1_000_000.0
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished recording contains.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub duration_us: u64,
    pub message_count: u64,
    pub file_size_bytes: u64,
    /// Number of planar (2D) scans
    pub planar_count: u64,
    /// Number of rig (3D) scans
    pub range_count: u64,
}

impl ArchiveInfo {
    pub fn duration_secs(&self) -> f64 {
        self.duration_us as f64 / 1_000_000.0
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / 1_048_576.0
    }
}
