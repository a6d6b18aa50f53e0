use crate::BoundingBox;
use nalgebra::{Affine3, Point3};

/// A coarse whole-image correspondence between two groups of views.
///
/// `transform` maps coordinates in the frame of `b` into the frame of `a`, so for a
/// translation-only link it is the offset of `b` relative to `a`. The bounding box describes
/// the overlap of the two groups and is expressed in the frame of `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link<G> {
    pub a: G,
    pub b: G,
    pub bounding_box: BoundingBox,
    pub transform: Affine3<f64>,
    /// Quality of the link, such as a cross-correlation coefficient.
    pub quality: f64,
}

impl<G> Link<G> {
    pub fn new(a: G, b: G, bounding_box: BoundingBox, transform: Affine3<f64>, quality: f64) -> Self {
        Self {
            a,
            b,
            bounding_box,
            transform,
            quality,
        }
    }

    /// Produces one `(point in a, point in b)` pair per bounding box corner.
    ///
    /// Returns `None` if the transform of the link cannot be inverted.
    pub fn corner_pairs(&self) -> Option<impl Iterator<Item = (Point3<f64>, Point3<f64>)>> {
        let inverse = self.transform.try_inverse()?;
        Some(
            self.bounding_box
                .corners()
                .into_iter()
                .map(move |corner| (corner, inverse.transform_point(&corner))),
        )
    }
}
