//! TOML run configuration.
//!
//! Every section falls back to built-in defaults, so an empty file (or no
//! file at all) is a valid configuration.
//!
//! ```toml
//! [localization]
//! initial_pose_x = 0.8
//! trajectory_log = "trajectory.txt"
//!
//! [localization.icp]
//! max_iterations = 100
//!
//! [rig]
//! labels = ["RGBD_1", "RGBD_2", "RGBD_3", "RGBD_4"]
//!
//! [refinement.gicp]
//! max_fitness = 0.01
//! gated = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::algorithms::matching::{
    GeneralizedIcp, GicpConfig, Icp3DConfig, PlanarIcpConfig, PointToPointIcp3D, RigidAligner,
};
use crate::core::types::Pose2D;
use crate::engine::pipeline::Backend;
use crate::engine::synchronizer::RigLayout;
use crate::error::{LocalizerError, Result};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "rig-localizer.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub refinement: RefinementConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Starting guess for the planar tracker.
    pub initial_pose_x: f32,
    pub initial_pose_y: f32,
    pub initial_pose_theta: f32,
    /// Where fixes are logged as they are produced.
    pub trajectory_log: String,
    pub icp: PlanarIcpSection,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            initial_pose_x: 0.8,
            initial_pose_y: 0.0,
            initial_pose_theta: 0.0,
            trajectory_log: "trajectory.txt".to_string(),
            icp: PlanarIcpSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanarIcpSection {
    pub max_iterations: u32,
    pub threshold_dist: f32,
    /// Radians of tolerated heading error per meter of range.
    pub threshold_ang: f32,
    pub alfa: f32,
    pub smallest_threshold_dist: f32,
    pub min_correspondences: usize,
    /// Fixes below this matched fraction keep the previous pose.
    pub min_goodness: f32,
}

impl Default for PlanarIcpSection {
    fn default() -> Self {
        let icp = PlanarIcpConfig::default();
        Self {
            max_iterations: icp.max_iterations,
            threshold_dist: icp.threshold_dist,
            threshold_ang: icp.threshold_ang,
            alfa: icp.alfa,
            smallest_threshold_dist: icp.smallest_threshold_dist,
            min_correspondences: icp.min_correspondences,
            min_goodness: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Distinct sensor labels; one scan of each forms a group.
    pub labels: Vec<String>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            labels: ["RGBD_1", "RGBD_2", "RGBD_3", "RGBD_4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefinementConfig {
    #[serde(default)]
    pub icp: Icp3DSection,
    #[serde(default)]
    pub gicp: GicpSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Icp3DSection {
    pub max_iterations: u32,
    pub threshold_dist: f32,
    pub alfa: f32,
    pub smallest_threshold_dist: f32,
    /// Percentage of matched points required to trust a result.
    pub min_goodness: f64,
}

impl Default for Icp3DSection {
    fn default() -> Self {
        let icp = Icp3DConfig::default();
        Self {
            max_iterations: icp.max_iterations,
            threshold_dist: icp.threshold_dist,
            alfa: icp.alfa,
            smallest_threshold_dist: icp.smallest_threshold_dist,
            min_goodness: icp.min_goodness,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GicpSection {
    pub max_correspondence_distance: f32,
    pub max_iterations: u32,
    pub transformation_epsilon: f64,
    pub rotation_epsilon: f64,
    pub voxel_leaf_size: f32,
    /// Decimation stride in replace mode; accumulation always uses 1.
    pub point_stride: usize,
    pub covariance_neighbors: usize,
    /// Largest mean squared neighbour distance accepted.
    pub max_fitness: f64,
    pub gated: bool,
}

impl Default for GicpSection {
    fn default() -> Self {
        let gicp = GicpConfig::default();
        Self {
            max_correspondence_distance: gicp.max_correspondence_distance,
            max_iterations: gicp.max_iterations,
            transformation_epsilon: gicp.transformation_epsilon,
            rotation_epsilon: gicp.rotation_epsilon,
            voxel_leaf_size: gicp.voxel_leaf_size,
            point_stride: gicp.point_stride,
            covariance_neighbors: gicp.covariance_neighbors,
            max_fitness: gicp.max_fitness,
            gated: gicp.gated,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RunConfig = basic_toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists,
    /// or fall back to defaults. Returns the file actually used.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.is_file() {
                    return Ok((Self::default(), None));
                }
                default
            }
        };

        let contents = fs::read_to_string(&path).map_err(|e| {
            LocalizerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            LocalizerError::Config(msg) => {
                LocalizerError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        Ok((config, Some(path)))
    }

    fn validate(&self) -> Result<()> {
        let alfas = [
            ("localization.icp.alfa", self.localization.icp.alfa),
            ("refinement.icp.alfa", self.refinement.icp.alfa),
        ];
        for (name, alfa) in alfas {
            if !(alfa > 0.0 && alfa < 1.0) {
                return Err(LocalizerError::Config(format!(
                    "{} must lie in (0, 1), got {}",
                    name, alfa
                )));
            }
        }
        if self.refinement.gicp.point_stride == 0 {
            return Err(LocalizerError::Config(
                "refinement.gicp.point_stride must be at least 1".into(),
            ));
        }
        if self.refinement.gicp.covariance_neighbors < 3 {
            return Err(LocalizerError::Config(
                "refinement.gicp.covariance_neighbors must be at least 3".into(),
            ));
        }
        Ok(())
    }

    pub fn initial_pose(&self) -> Pose2D {
        let l = &self.localization;
        Pose2D::new(l.initial_pose_x, l.initial_pose_y, l.initial_pose_theta)
    }

    pub fn rig_layout(&self) -> Result<RigLayout> {
        RigLayout::new(self.rig.labels.as_slice())
    }

    pub fn planar_icp(&self) -> PlanarIcpConfig {
        let s = &self.localization.icp;
        PlanarIcpConfig {
            max_iterations: s.max_iterations,
            threshold_dist: s.threshold_dist,
            threshold_ang: s.threshold_ang,
            alfa: s.alfa,
            smallest_threshold_dist: s.smallest_threshold_dist,
            min_correspondences: s.min_correspondences,
            ..PlanarIcpConfig::default()
        }
    }

    pub fn icp3d(&self) -> Icp3DConfig {
        let s = &self.refinement.icp;
        Icp3DConfig {
            max_iterations: s.max_iterations,
            threshold_dist: s.threshold_dist,
            alfa: s.alfa,
            smallest_threshold_dist: s.smallest_threshold_dist,
            min_goodness: s.min_goodness,
            ..Icp3DConfig::default()
        }
    }

    /// GICP parameters; accumulation aligns every point.
    pub fn gicp(&self, accumulate: bool) -> GicpConfig {
        let s = &self.refinement.gicp;
        GicpConfig {
            max_correspondence_distance: s.max_correspondence_distance,
            max_iterations: s.max_iterations,
            transformation_epsilon: s.transformation_epsilon,
            rotation_epsilon: s.rotation_epsilon,
            voxel_leaf_size: s.voxel_leaf_size,
            point_stride: if accumulate { 1 } else { s.point_stride },
            covariance_neighbors: s.covariance_neighbors,
            max_fitness: s.max_fitness,
            gated: s.gated,
        }
    }

    /// Instantiate the refinement backend.
    pub fn aligner(&self, backend: Backend, accumulate: bool) -> Box<dyn RigidAligner> {
        match backend {
            Backend::Icp => Box::new(PointToPointIcp3D::new(self.icp3d())),
            Backend::Gicp => Box::new(GeneralizedIcp::new(self.gicp(accumulate))),
        }
    }
}
