//! Point sets in Struct of Arrays layout.
//!
//! Planar clouds come from the 2D localization scanner and the reference
//! map. 3D clouds come from the rig's range sensors and are what the
//! refinement stage aligns.

use serde::{Deserialize, Serialize};

use super::{Point2D, Point3D, Pose2D, Pose3D};

/// Collection of 2D points (xs, ys stored separately).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PointCloud2D {
    /// X coordinates in meters
    pub xs: Vec<f32>,
    /// Y coordinates in meters
    pub ys: Vec<f32>,
}

impl PointCloud2D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
        }
    }

    /// Create from a vector of points (converts AoS to SoA).
    pub fn from_points(points: &[Point2D]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push_xy(p.x, p.y);
        }
        cloud
    }

    #[inline]
    pub fn push(&mut self, point: Point2D) {
        self.push_xy(point.x, point.y);
    }

    #[inline]
    pub fn push_xy(&mut self, x: f32, y: f32) {
        self.xs.push(x);
        self.ys.push(y);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    pub fn point_at(&self, i: usize) -> Point2D {
        Point2D::new(self.xs[i], self.ys[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = Point2D> + '_ {
        self.xs
            .iter()
            .zip(self.ys.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
    }

    /// Transform all points by a pose: p' = R(theta) * p + t
    pub fn transform(&self, pose: &Pose2D) -> PointCloud2D {
        let (sin_t, cos_t) = pose.theta.sin_cos();
        let mut result = PointCloud2D::with_capacity(self.len());
        for (&x, &y) in self.xs.iter().zip(self.ys.iter()) {
            result.push_xy(
                pose.x + x * cos_t - y * sin_t,
                pose.y + x * sin_t + y * cos_t,
            );
        }
        result
    }

    /// Mean of all points, `None` when empty.
    pub fn centroid(&self) -> Option<Point2D> {
        if self.is_empty() {
            return None;
        }
        let inv_n = 1.0 / self.len() as f32;
        Some(Point2D::new(
            self.xs.iter().sum::<f32>() * inv_n,
            self.ys.iter().sum::<f32>() * inv_n,
        ))
    }
}

/// Collection of 3D points (xs, ys, zs stored separately).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PointCloud3D {
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
    pub zs: Vec<f32>,
}

impl PointCloud3D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
        }
    }

    pub fn from_points(points: &[Point3D]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(*p);
        }
        cloud
    }

    #[inline]
    pub fn push(&mut self, point: Point3D) {
        self.push_xyz(point.x, point.y, point.z);
    }

    #[inline]
    pub fn push_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.xs.push(x);
        self.ys.push(y);
        self.zs.push(z);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    pub fn point_at(&self, i: usize) -> Point3D {
        Point3D::new(self.xs[i], self.ys[i], self.zs[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = Point3D> + '_ {
        (0..self.len()).map(move |i| self.point_at(i))
    }

    /// Express every point in the parent frame of `pose`.
    pub fn transform(&self, pose: &Pose3D) -> PointCloud3D {
        let mut result = PointCloud3D::with_capacity(self.len());
        for p in self.iter() {
            result.push(pose.transform_point(&p));
        }
        result
    }

    /// Append all points of `other`.
    pub fn extend(&mut self, other: &PointCloud3D) {
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.zs.extend_from_slice(&other.zs);
    }

    /// Keep every `stride`-th point. A stride of 0 or 1 returns a copy.
    pub fn decimate(&self, stride: usize) -> PointCloud3D {
        if stride <= 1 {
            return self.clone();
        }
        let mut result = PointCloud3D::with_capacity(self.len() / stride + 1);
        for i in (0..self.len()).step_by(stride) {
            result.push(self.point_at(i));
        }
        result
    }

    pub fn centroid(&self) -> Option<Point3D> {
        if self.is_empty() {
            return None;
        }
        let inv_n = 1.0 / self.len() as f32;
        Some(Point3D::new(
            self.xs.iter().sum::<f32>() * inv_n,
            self.ys.iter().sum::<f32>() * inv_n,
            self.zs.iter().sum::<f32>() * inv_n,
        ))
    }
}
