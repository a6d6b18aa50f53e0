use mvr_core::nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A point in an [`RTree`] that remembers its position in the slice it was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IndexedPoint {
    pub position: [f64; 3],
    pub index: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.position
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

pub(crate) fn coordinates(point: Point3<f64>) -> [f64; 3] {
    [point.x, point.y, point.z]
}

pub(crate) fn index(points: impl Iterator<Item = Point3<f64>>) -> RTree<IndexedPoint> {
    RTree::bulk_load(
        points
            .enumerate()
            .map(|(index, point)| IndexedPoint {
                position: coordinates(point),
                index,
            })
            .collect(),
    )
}
