//! Archive writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::types::{ArchiveHeader, ArchiveInfo, HEADER_SIZE};
use crate::core::types::PointCloud2D;
use crate::engine::{Observation, RigScan};

/// Error type for archive recording.
#[derive(Debug)]
pub enum RecorderError {
    Io(std::io::Error),
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(String),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::Io(e) => write!(f, "I/O error: {}", e),
            RecorderError::Create { path, source } => {
                write!(f, "cannot create {}: {}", path.display(), source)
            }
            RecorderError::Serialize(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Io(e)
    }
}

impl From<postcard::Error> for RecorderError {
    fn from(e: postcard::Error) -> Self {
        RecorderError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;

/// Writes observations as length-prefixed postcard messages.
///
/// Header space is reserved on creation; [`ArchiveRecorder::finish`]
/// seeks back and fills it in.
///
/// # Example
///
/// ```ignore
/// let mut recorder = ArchiveRecorder::create("run1_located.rlog")?;
/// for scan in &bundle.scans {
///     recorder.record_scan(scan)?;
/// }
/// let info = recorder.finish()?;
/// log::info!("Wrote {} scans", info.range_count);
/// ```
pub struct ArchiveRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    message_count: u64,
    planar_count: u64,
    range_count: u64,
    start_time_us: Option<u64>,
    end_time_us: u64,
}

impl ArchiveRecorder {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| RecorderError::Create {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Self {
            writer,
            path,
            message_count: 0,
            planar_count: 0,
            range_count: 0,
            start_time_us: None,
            end_time_us: 0,
        })
    }

    pub fn record_planar(
        &mut self,
        label: &str,
        timestamp_us: u64,
        points: &PointCloud2D,
    ) -> Result<()> {
        self.record(&Observation::PlanarScan {
            label: label.to_string(),
            timestamp_us,
            points: points.clone(),
        })
    }

    pub fn record_scan(&mut self, scan: &RigScan) -> Result<()> {
        self.record(&Observation::RangeScan(scan.clone()))
    }

    pub fn record(&mut self, observation: &Observation) -> Result<()> {
        let timestamp = observation.timestamp_us();
        if self.start_time_us.is_none() {
            self.start_time_us = Some(timestamp);
        }
        self.end_time_us = timestamp;

        let bytes = postcard::to_allocvec(observation)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| RecorderError::Serialize(format!("message of {} bytes", bytes.len())))?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&bytes)?;

        match observation {
            Observation::PlanarScan { .. } => self.planar_count += 1,
            Observation::RangeScan(_) => self.range_count += 1,
        }
        self.message_count += 1;
        Ok(())
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Write the final header and close the file.
    pub fn finish(mut self) -> Result<ArchiveInfo> {
        self.writer.flush()?;
        let file_size = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;

        let header = ArchiveHeader {
            start_time_us: self.start_time_us.unwrap_or(0),
            end_time_us: self.end_time_us,
            message_count: self.message_count,
            ..ArchiveHeader::new()
        };
        let header_bytes = postcard::to_allocvec(&header)?;
        if header_bytes.len() > HEADER_SIZE {
            return Err(RecorderError::Serialize(format!(
                "header needs {} bytes",
                header_bytes.len()
            )));
        }

        let mut header_buffer = [0u8; HEADER_SIZE];
        header_buffer[..header_bytes.len()].copy_from_slice(&header_bytes);
        self.writer.write_all(&header_buffer)?;
        self.writer.flush()?;

        Ok(ArchiveInfo {
            path: self.path,
            duration_us: header.duration_us(),
            message_count: self.message_count,
            file_size_bytes: file_size,
            planar_count: self.planar_count,
            range_count: self.range_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PointCloud3D, Pose3D};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_recorder_create_and_finish() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.rlog");

        let info = ArchiveRecorder::create(&path).unwrap().finish().unwrap();

        assert_eq!(info.message_count, 0);
        assert!(fs::metadata(&path).unwrap().len() >= HEADER_SIZE as u64);
    }

    #[test]
    fn test_recorder_counts_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mixed.rlog");

        let mut recorder = ArchiveRecorder::create(&path).unwrap();
        let mut planar = PointCloud2D::new();
        planar.push_xy(1.0, 0.5);
        recorder.record_planar("HOKUYO1", 1_000, &planar).unwrap();
        for i in 0..3u64 {
            let scan = RigScan::new("RGBD_1", 2_000 + i, PointCloud3D::new(), Pose3D::identity());
            recorder.record_scan(&scan).unwrap();
        }

        let info = recorder.finish().unwrap();
        assert_eq!(info.message_count, 4);
        assert_eq!(info.planar_count, 1);
        assert_eq!(info.range_count, 3);
        assert_eq!(info.duration_us, 1_002);
        assert_eq!(info.path, path);
    }

    #[test]
    fn test_create_failure_names_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing_dir").join("out.rlog");

        let Err(err) = ArchiveRecorder::create(&path) else {
            panic!("creating inside a missing directory must fail");
        };
        assert!(matches!(err, RecorderError::Create { .. }));
        let message = crate::error::LocalizerError::from(err).to_string();
        assert!(message.contains("create archive"), "{}", message);
        assert!(message.contains(&path.display().to_string()), "{}", message);
    }
}
