use super::{weighted_centroids, TransformModel};
use crate::{ModelError, WeightedMatch};
use nalgebra::{IsometryMatrix3, Matrix3, Matrix4, Point3, Rotation3, Translation3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Singular values below this fraction of the largest one are treated as zero.
const RANK_EPSILON: f64 = 1e-9;

/// A rotation followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidModel {
    pub isometry: IsometryMatrix3<f64>,
    cost: f64,
}

impl RigidModel {
    pub fn new(isometry: IsometryMatrix3<f64>) -> Self {
        Self {
            isometry,
            cost: f64::MAX,
        }
    }
}

impl Default for RigidModel {
    fn default() -> Self {
        Self::new(IsometryMatrix3::identity())
    }
}

impl TransformModel for RigidModel {
    fn min_num_matches(&self) -> usize {
        3
    }

    /// Weighted Kabsch alignment.
    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError> {
        let (source, target, _) = weighted_centroids(self.min_num_matches(), matches)?;
        let covariance = matches
            .iter()
            .fold(Matrix3::zeros(), |h, &WeightedMatch(p, q, w)| {
                h + (p - source) * (q - target).transpose() * w
            });

        let svd = covariance.svd(true, true);
        let singular = svd.singular_values;
        let largest = singular.max();
        if !(largest > 0.0) || singular.iter().filter(|&&s| s > largest * RANK_EPSILON).count() < 2
        {
            return Err(ModelError::IllDefinedData);
        }
        let u = svd.u.ok_or(ModelError::IllDefinedData)?;
        let mut v = svd.v_t.ok_or(ModelError::IllDefinedData)?.transpose();
        // Flip the least significant axis to turn a reflection into a rotation.
        if (v * u.transpose()).determinant() < 0.0 {
            let weakest = singular.imin();
            let mut axis = v.column_mut(weakest);
            axis *= -1.0;
        }
        let rotation = Rotation3::from_matrix_unchecked(v * u.transpose());
        let translation = target.coords - rotation * source.coords;
        self.isometry = IsometryMatrix3::from_parts(Translation3::from(translation), rotation);
        Ok(())
    }

    #[inline(always)]
    fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        self.isometry * point
    }

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError> {
        Ok(self.isometry.inverse_transform_point(&point))
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }

    fn to_homogeneous(&self) -> Matrix4<f64> {
        self.isometry.to_homogeneous()
    }

    fn preconcatenate(&mut self, other: &Self) {
        self.isometry = other.isometry * self.isometry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn cube() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 20.0, 0.0),
            Point3::new(0.0, 0.0, 30.0),
            Point3::new(10.0, 20.0, 30.0),
        ]
    }

    #[test]
    fn recovers_rotation_and_translation() {
        let truth = IsometryMatrix3::from_parts(
            Translation3::new(5.0, -3.0, 12.0),
            Rotation3::from_euler_angles(0.3, -0.2, 1.1),
        );
        let matches: Vec<_> = cube()
            .into_iter()
            .map(|p| WeightedMatch(p, truth * p, 1.0))
            .collect();
        let mut model = RigidModel::default();
        model.fit(&matches).unwrap();
        assert_relative_eq!(
            model.to_homogeneous(),
            truth.to_homogeneous(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn planar_points_still_give_a_rotation() {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.5);
        let matches: Vec<_> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
        ]
        .iter()
        .map(|&p| WeightedMatch(p, rotation * p, 1.0))
        .collect();
        let mut model = RigidModel::default();
        model.fit(&matches).unwrap();
        assert_relative_eq!(model.isometry.rotation.matrix().determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            model.apply(Point3::new(1.0, 1.0, 0.0)),
            rotation * Point3::new(1.0, 1.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn collinear_points_are_ill_defined() {
        let matches: Vec<_> = (0..4)
            .map(|ix| {
                let p = Point3::new(ix as f64, 0.0, 0.0);
                WeightedMatch(p, p, 1.0)
            })
            .collect();
        let mut model = RigidModel::default();
        assert_eq!(model.fit(&matches), Err(ModelError::IllDefinedData));
    }
}
