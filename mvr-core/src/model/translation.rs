use super::{weighted_centroids, TransformModel};
use crate::{ModelError, WeightedMatch};
use nalgebra::{Matrix4, Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A pure 3D translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TranslationModel {
    pub translation: Vector3<f64>,
    cost: f64,
}

impl TranslationModel {
    pub fn new(translation: Vector3<f64>) -> Self {
        Self {
            translation,
            cost: f64::MAX,
        }
    }
}

impl Default for TranslationModel {
    fn default() -> Self {
        Self::new(Vector3::zeros())
    }
}

impl TransformModel for TranslationModel {
    fn min_num_matches(&self) -> usize {
        1
    }

    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError> {
        let (source, target, _) = weighted_centroids(self.min_num_matches(), matches)?;
        self.translation = target - source;
        Ok(())
    }

    #[inline(always)]
    fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        point + self.translation
    }

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError> {
        Ok(point - self.translation)
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }

    fn to_homogeneous(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation)
    }

    fn preconcatenate(&mut self, other: &Self) {
        self.translation += other.translation;
    }
}
