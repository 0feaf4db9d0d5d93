//! Core foundation layer.
//!
//! Bottom layer of the stack with no internal dependencies.
//!
//! - [`types`]: points, poses, point clouds, timestamps
//! - [`math`]: angle normalization and small numeric helpers

pub mod math;
pub mod types;
