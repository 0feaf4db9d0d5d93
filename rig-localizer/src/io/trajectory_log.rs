//! Text log of localization fixes.
//!
//! One line per fix, `timestamp_us x y theta`, flushed as it is written so
//! the file stays usable if the run aborts.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::types::Pose2D;
use crate::engine::localization::FixSink;
use crate::engine::LocalizationFix;
use crate::error::{LocalizerError, Result};

/// Append-only trajectory file, truncated when opened.
pub struct TrajectoryLog {
    writer: BufWriter<File>,
    path: PathBuf,
    lines: usize,
}

impl TrajectoryLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| LocalizerError::File {
            action: "create trajectory log",
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> usize {
        self.lines
    }
}

impl FixSink for TrajectoryLog {
    fn record(&mut self, fix: &LocalizationFix) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{} {:.6} {:.6} {:.6}",
            fix.timestamp_us, fix.data.x, fix.data.y, fix.data.theta
        )?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }
}

/// Read back a trajectory log written by [`TrajectoryLog`].
pub fn read_trajectory_log(path: impl AsRef<Path>) -> Result<Vec<LocalizationFix>> {
    let text = fs::read_to_string(path)?;
    let mut fixes = Vec::new();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let bad_line = || LocalizerError::Config(format!("trajectory log line {}: '{}'", index + 1, line));
        if fields.len() != 4 {
            return Err(bad_line());
        }
        let timestamp_us: u64 = fields[0].parse().map_err(|_| bad_line())?;
        let mut values = [0.0f32; 3];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            *value = field.parse().map_err(|_| bad_line())?;
        }
        fixes.push(LocalizationFix::new(
            Pose2D::new(values[0], values[1], values[2]),
            timestamp_us,
        ));
    }
    Ok(fixes)
}
