//! Observation and scan types shared by the pipeline stages.

use serde::{Deserialize, Serialize};

use crate::core::types::{PointCloud2D, PointCloud3D, Pose2D, Pose3D, Timestamped};

/// A planar pose estimate at a point in time.
///
/// Created strictly in timestamp order and never mutated.
pub type LocalizationFix = Timestamped<Pose2D>;

/// One capture of a rig range sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigScan {
    /// Which rig sensor produced the scan.
    pub sensor_label: String,

    /// Capture time in microseconds.
    pub timestamp_us: u64,

    /// Points in the sensor frame.
    pub points: PointCloud3D,

    /// Static mounting offset of the sensor on the platform.
    pub extrinsic: Pose3D,

    /// Global sensor pose, unset until interpolation assigns it and
    /// possibly overwritten by refinement.
    pub resolved_pose: Option<Pose3D>,

    /// Position in the input archive, used to restore export order.
    #[serde(skip)]
    pub sequence: u64,
}

impl RigScan {
    pub fn new(
        sensor_label: impl Into<String>,
        timestamp_us: u64,
        points: PointCloud3D,
        extrinsic: Pose3D,
    ) -> Self {
        Self {
            sensor_label: sensor_label.into(),
            timestamp_us,
            points,
            extrinsic,
            resolved_pose: None,
            sequence: 0,
        }
    }

    /// Points expressed in the global frame, if the scan is resolved.
    pub fn world_points(&self) -> Option<PointCloud3D> {
        self.resolved_pose.map(|pose| self.points.transform(&pose))
    }
}

/// A typed record from the observation archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Observation {
    /// 2D range scan from the localization scanner, in the platform frame.
    PlanarScan {
        label: String,
        timestamp_us: u64,
        points: PointCloud2D,
    },
    /// 3D scan from one of the rig sensors.
    RangeScan(RigScan),
}

impl Observation {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            Observation::PlanarScan { timestamp_us, .. } => *timestamp_us,
            Observation::RangeScan(scan) => scan.timestamp_us,
        }
    }
}
