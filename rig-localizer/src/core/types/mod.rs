//! Core data types.
//!
//! - [`Point2D`], [`Pose2D`]: planar localization (meters, radians)
//! - [`Point3D`], [`Pose3D`]: rig sensor frames and refinement transforms
//! - [`PointCloud2D`], [`PointCloud3D`]: point sets in SoA layout
//! - [`Covariance2D`]: 3x3 uncertainty of a planar pose
//! - [`Timestamped<T>`]: generic timestamp wrapper

mod cloud;
mod covariance;
mod pose;
mod pose3d;
mod timestamped;

pub use cloud::{PointCloud2D, PointCloud3D};
pub use covariance::Covariance2D;
pub use pose::{Point2D, Pose2D};
pub use pose3d::{Point3D, Pose3D};
pub use timestamped::Timestamped;
