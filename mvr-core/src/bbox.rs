use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An axis-aligned box given by its minimum and maximum corner.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// All eight corners of the box.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// The overlap of two boxes, if they overlap at all.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = Point3::from(self.min.coords.sup(&other.min.coords));
        let max = Point3::from(self.max.coords.inf(&other.max.coords));
        if (0..3).all(|ix| min[ix] <= max[ix]) {
            Some(Self { min, max })
        } else {
            None
        }
    }
}
