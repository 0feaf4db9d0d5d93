//! Voxel grid down-sampling.

use std::collections::HashMap;

use crate::core::types::PointCloud3D;

/// Replaces all points inside each cubic voxel by their centroid.
#[derive(Debug, Clone, Copy)]
pub struct VoxelGrid {
    leaf_size: f32,
}

impl VoxelGrid {
    /// A non-positive leaf size disables filtering.
    pub fn new(leaf_size: f32) -> Self {
        Self { leaf_size }
    }

    pub fn leaf_size(&self) -> f32 {
        self.leaf_size
    }

    /// Filtered copy of `cloud`. Voxels are emitted in first-seen order.
    pub fn filter(&self, cloud: &PointCloud3D) -> PointCloud3D {
        if self.leaf_size <= 0.0 || cloud.is_empty() {
            return cloud.clone();
        }

        let inv = 1.0 / self.leaf_size;
        let mut slots: HashMap<(i64, i64, i64), usize> = HashMap::new();
        let mut sums: Vec<([f64; 3], u32)> = Vec::new();

        for p in cloud.iter() {
            let key = (
                (p.x * inv).floor() as i64,
                (p.y * inv).floor() as i64,
                (p.z * inv).floor() as i64,
            );
            let slot = *slots.entry(key).or_insert_with(|| {
                sums.push(([0.0; 3], 0));
                sums.len() - 1
            });
            let (sum, count) = &mut sums[slot];
            sum[0] += p.x as f64;
            sum[1] += p.y as f64;
            sum[2] += p.z as f64;
            *count += 1;
        }

        let mut result = PointCloud3D::with_capacity(sums.len());
        for (sum, count) in sums {
            let n = count as f64;
            result.push_xyz((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32);
        }
        result
    }
}
