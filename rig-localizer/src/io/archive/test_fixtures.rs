//! Synthetic archives for tests.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::recorder::ArchiveRecorder;
use crate::core::types::{PointCloud2D, PointCloud3D, Point3D, Pose3D};
use crate::engine::RigScan;

pub const RIG_LABELS: [&str; 4] = ["RGBD_1", "RGBD_2", "RGBD_3", "RGBD_4"];

/// Temporary archive removed when the fixture is dropped.
pub struct ArchiveTestFixture {
    _temp_dir: TempDir,
    path: PathBuf,
    message_count: u64,
}

impl ArchiveTestFixture {
    /// `groups` capture cycles: a planar scan followed by one scan from
    /// each rig sensor, closed by a final planar scan.
    pub fn corridor(groups: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("corridor.rlog");
        let mut recorder = ArchiveRecorder::create(&path).expect("Failed to create recorder");

        let mut planar = PointCloud2D::new();
        for i in 0..50 {
            let f = i as f32 * 0.1;
            planar.push_xy(f, 1.0);
            planar.push_xy(f, -1.0);
        }

        let mut cloud = PointCloud3D::new();
        for i in 0..20 {
            cloud.push(Point3D::new(1.0 + i as f32 * 0.05, 0.0, 0.5));
        }

        for g in 0..groups {
            let t = g * 100_000;
            recorder
                .record_planar("HOKUYO1", t, &planar)
                .expect("Failed to record planar scan");
            for (i, label) in RIG_LABELS.iter().enumerate() {
                let extrinsic = Pose3D::new(0.27, 0.0, 1.0, 0.0, 0.0, i as f32 * 0.5);
                let scan = RigScan::new(*label, t + 10_000 * (i as u64 + 1), cloud.clone(), extrinsic);
                recorder.record_scan(&scan).expect("Failed to record scan");
            }
        }
        recorder
            .record_planar("HOKUYO1", groups * 100_000, &planar)
            .expect("Failed to record planar scan");

        let info = recorder.finish().expect("Failed to finish recording");
        Self {
            _temp_dir: temp_dir,
            path,
            message_count: info.message_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }
}
