//! R-tree nearest-neighbour index over a 3D cloud.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::core::types::{Point3D, PointCloud3D};

/// A cloud point tagged with its index in the source cloud.
#[derive(Clone, Copy, Debug)]
struct IndexedPoint {
    position: [f32; 3],
    index: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Nearest-neighbour queries against a fixed cloud.
///
/// Unlike a bucketed k-d tree this tolerates any number of points sharing a
/// coordinate, which depth sensors produce on flat surfaces.
pub struct PointIndex3D {
    tree: RTree<IndexedPoint>,
}

impl PointIndex3D {
    pub fn new(cloud: &PointCloud3D) -> Self {
        let points: Vec<IndexedPoint> = cloud
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                position: p.to_array(),
                index,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Index and squared distance of the closest cloud point.
    pub fn nearest(&self, query: &Point3D) -> Option<(usize, f32)> {
        let q = query.to_array();
        self.tree
            .nearest_neighbor(&q)
            .map(|p| (p.index, p.distance_2(&q)))
    }

    /// Indices of the `k` closest cloud points, nearest first.
    pub fn k_nearest(&self, query: &Point3D, k: usize) -> Vec<usize> {
        self.tree
            .nearest_neighbor_iter(&query.to_array())
            .take(k)
            .map(|p| p.index)
            .collect()
    }
}
