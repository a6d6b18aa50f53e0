mod affine;
mod any;
mod rigid;
mod translation;

pub use affine::*;
pub use any::*;
pub use rigid::*;
pub use translation::*;

use crate::{ModelError, WeightedMatch};
use core::fmt::Debug;
use nalgebra::{Matrix4, Point3};

/// This trait is implemented by every transform family a tile or a RANSAC run can fit.
///
/// Models are fit to [`WeightedMatch`]es and always map the source of a match onto its
/// target. `Clone` is how a prototype is copied into every tile.
pub trait TransformModel: Clone + Debug + Send + Sync + 'static {
    /// The smallest number of matches [`TransformModel::fit`] accepts.
    fn min_num_matches(&self) -> usize;

    /// Fits the model to the matches with weighted least squares.
    ///
    /// On failure the model is left exactly as it was.
    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError>;

    fn apply(&self, point: Point3<f64>) -> Point3<f64>;

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError>;

    /// The cost that was last assigned by whoever fit the model.
    ///
    /// A model that was never fit has a cost of `f64::MAX`.
    fn cost(&self) -> f64;

    fn set_cost(&mut self, cost: f64);

    /// Retrieve the homogeneous matrix.
    fn to_homogeneous(&self) -> Matrix4<f64>;

    /// Replaces `self` with the composition that first applies `self` and then `other`.
    fn preconcatenate(&mut self, other: &Self);

    /// Creates a copy with `other` preconcatenated.
    #[must_use]
    fn preconcatenated(&self, other: &Self) -> Self {
        let mut model = self.clone();
        model.preconcatenate(other);
        model
    }
}

/// Weighted centroids of the sources and targets and the total weight.
fn weighted_centroids(
    required: usize,
    matches: &[WeightedMatch],
) -> Result<(Point3<f64>, Point3<f64>, f64), ModelError> {
    if matches.len() < required {
        return Err(ModelError::NotEnoughData {
            required,
            found: matches.len(),
        });
    }
    let total: f64 = matches.iter().map(|&WeightedMatch(_, _, w)| w).sum();
    if !(total > 0.0) {
        return Err(ModelError::IllDefinedData);
    }
    let (source, target) = matches.iter().fold(
        (nalgebra::zero(), nalgebra::zero()),
        |(s, t): (nalgebra::Vector3<f64>, nalgebra::Vector3<f64>), &WeightedMatch(p, q, w)| {
            (s + p.coords * w, t + q.coords * w)
        },
    );
    Ok((
        Point3::from(source / total),
        Point3::from(target / total),
        total,
    ))
}
