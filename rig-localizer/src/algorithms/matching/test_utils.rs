//! Shared test clouds for the matcher test suites.
//!
//! The planar shapes carry a tiny ramp on the constant axis so the k-d tree
//! never sees long runs of identical coordinates.

use crate::core::types::{Point2D, PointCloud2D, PointCloud3D};

/// Two perpendicular walls, `2n - 1` points.
pub fn create_l_shape(n: usize, length: f32) -> PointCloud2D {
    let mut cloud = PointCloud2D::with_capacity(2 * n);
    for i in 0..n {
        let x = (i as f32 / (n - 1) as f32) * length;
        cloud.push(Point2D::new(x, i as f32 * 0.0001));
    }
    for i in 1..n {
        let y = (i as f32 / (n - 1) as f32) * length;
        cloud.push(Point2D::new(i as f32 * 0.0001, y));
    }
    cloud
}

/// Rectangular room with `n` points spread over the four walls.
pub fn create_room(n: usize, width: f32, height: f32) -> PointCloud2D {
    let mut cloud = PointCloud2D::with_capacity(n);
    let per_wall = n / 4;
    for i in 0..per_wall {
        let f = i as f32 / per_wall as f32;
        let noise = i as f32 * 0.0001;
        cloud.push(Point2D::new(f * width, noise));
        cloud.push(Point2D::new(width + noise, f * height));
        cloud.push(Point2D::new(width - f * width, height + noise));
        cloud.push(Point2D::new(noise, height - f * height));
    }
    cloud
}

/// A wavy floor patch bounded by two walls.
///
/// The surface is curved in both directions, so all six degrees of freedom
/// are observable to point-to-point alignment.
pub fn create_scene(spacing: f32) -> PointCloud3D {
    let mut cloud = PointCloud3D::new();
    let steps = (1.5 / spacing) as usize;
    for i in 0..steps {
        for j in 0..steps {
            let x = i as f32 * spacing;
            let y = j as f32 * spacing;
            let z = 0.15 * (2.0 * x).sin() * (1.5 * y).cos();
            cloud.push_xyz(x, y, z);
        }
    }
    for i in 0..steps {
        for k in 1..steps / 2 {
            let a = i as f32 * spacing;
            let h = k as f32 * spacing;
            cloud.push_xyz(a, -0.1 + 0.05 * (3.0 * h).sin(), h);
            cloud.push_xyz(-0.1 + 0.05 * (2.0 * h).cos(), a, h);
        }
    }
    cloud
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_l_shape() {
        assert_eq!(create_l_shape(50, 2.0).len(), 99);
    }

    #[test]
    fn test_create_room() {
        assert_eq!(create_room(100, 4.0, 3.0).len(), 100);
    }

    #[test]
    fn test_create_scene_is_dense() {
        let scene = create_scene(0.1);
        assert!(scene.len() > 300);
    }
}
