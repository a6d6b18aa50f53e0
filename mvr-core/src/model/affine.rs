use super::{weighted_centroids, TransformModel};
use crate::{ModelError, WeightedMatch};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A general linear map followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AffineModel {
    pub linear: Matrix3<f64>,
    pub translation: Vector3<f64>,
    cost: f64,
}

impl AffineModel {
    pub fn new(linear: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            linear,
            translation,
            cost: f64::MAX,
        }
    }

    /// Takes the upper 3x4 block of a homogeneous matrix.
    pub fn from_homogeneous(matrix: &Matrix4<f64>) -> Self {
        Self::new(
            matrix.fixed_slice::<3, 3>(0, 0).into_owned(),
            matrix.fixed_slice::<3, 1>(0, 3).into_owned(),
        )
    }

    /// Converts any model into its affine equivalent.
    pub fn from_model<M: TransformModel>(model: &M) -> Self {
        let mut affine = Self::from_homogeneous(&model.to_homogeneous());
        affine.cost = model.cost();
        affine
    }
}

impl Default for AffineModel {
    fn default() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }
}

impl TransformModel for AffineModel {
    fn min_num_matches(&self) -> usize {
        4
    }

    /// Solves the weighted normal equations on centered coordinates.
    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError> {
        let (source, target, _) = weighted_centroids(self.min_num_matches(), matches)?;
        let (pp, qp) = matches.iter().fold(
            (Matrix3::zeros(), Matrix3::zeros()),
            |(pp, qp): (Matrix3<f64>, Matrix3<f64>), &WeightedMatch(p, q, w)| {
                let dp = p - source;
                let dq = q - target;
                (pp + dp * dp.transpose() * w, qp + dq * dp.transpose() * w)
            },
        );

        // Relative to the scale of the point cloud so that units do not matter.
        let scale = pp.trace() / 3.0;
        if !(scale > 0.0) || pp.determinant().abs() <= 1e-12 * scale.powi(3) {
            return Err(ModelError::IllDefinedData);
        }
        let inverse = pp.try_inverse().ok_or(ModelError::IllDefinedData)?;
        let linear = qp * inverse;
        self.translation = target.coords - linear * source.coords;
        self.linear = linear;
        Ok(())
    }

    #[inline(always)]
    fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        self.linear * point + self.translation
    }

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError> {
        let inverse = self.linear.try_inverse().ok_or(ModelError::Noninvertible)?;
        Ok(Point3::from(inverse * (point.coords - self.translation)))
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }

    fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut matrix = Matrix4::identity();
        matrix.fixed_slice_mut::<3, 3>(0, 0).copy_from(&self.linear);
        matrix.fixed_slice_mut::<3, 1>(0, 3).copy_from(&self.translation);
        matrix
    }

    fn preconcatenate(&mut self, other: &Self) {
        self.translation = other.linear * self.translation + other.translation;
        self.linear = other.linear * self.linear;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn truth() -> AffineModel {
        AffineModel::new(
            Matrix3::new(1.1, 0.2, -0.1, 0.05, 0.9, 0.3, -0.2, 0.1, 1.3),
            Vector3::new(10.0, -4.0, 2.5),
        )
    }

    #[test]
    fn recovers_exact_affine() {
        let truth = truth();
        let matches: Vec<_> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(7.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(2.0, 9.0, 4.0),
        ]
        .iter()
        .map(|&p| WeightedMatch(p, truth.apply(p), 1.0))
        .collect();
        let mut model = AffineModel::default();
        model.fit(&matches).unwrap();
        assert_relative_eq!(model.linear, truth.linear, epsilon = 1e-9);
        assert_relative_eq!(model.translation, truth.translation, epsilon = 1e-9);
    }

    #[test]
    fn coplanar_points_are_ill_defined() {
        let matches: Vec<_> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ]
        .iter()
        .map(|&p| WeightedMatch(p, p, 1.0))
        .collect();
        let mut model = AffineModel::default();
        assert_eq!(model.fit(&matches), Err(ModelError::IllDefinedData));
        assert_eq!(model, AffineModel::default());
    }

    #[test]
    fn preconcatenation_applies_self_first() {
        let a = truth();
        let b = AffineModel::new(Matrix3::from_diagonal_element(2.0), Vector3::new(1.0, 1.0, 1.0));
        let point = Point3::new(3.0, -2.0, 8.0);
        assert_relative_eq!(
            a.preconcatenated(&b).apply(point),
            b.apply(a.apply(point)),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            a.apply_inverse(a.apply(point)).unwrap(),
            point,
            epsilon = 1e-9
        );
    }
}
