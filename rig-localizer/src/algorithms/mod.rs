//! Algorithm layer.
//!
//! - [`matching`]: planar scan-to-map ICP and the 6-DOF alignment backends
//! - [`voxel_grid`]: centroid voxel filter used to thin alignment targets

pub mod matching;
pub mod voxel_grid;
