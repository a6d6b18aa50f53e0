use super::TransformModel;
use crate::{AffineModel, ModelError, RigidModel, TranslationModel, WeightedMatch};
use core::fmt;
use core::str::FromStr;
use nalgebra::{Matrix4, Point3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Selects one of the transform families at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum ModelKind {
    Translation,
    Rigid,
    Affine,
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::Affine
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Translation => "translation",
            Self::Rigid => "rigid",
            Self::Affine => "affine",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model kind {0:?}, expected translation, rigid or affine")]
pub struct UnknownModelKind(pub String);

impl FromStr for ModelKind {
    type Err = UnknownModelKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "translation" => Ok(Self::Translation),
            "rigid" => Ok(Self::Rigid),
            "affine" => Ok(Self::Affine),
            _ => Err(UnknownModelKind(s.to_owned())),
        }
    }
}

/// One of the transform families, chosen at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum AnyModel {
    Translation(TranslationModel),
    Rigid(RigidModel),
    Affine(AffineModel),
}

impl AnyModel {
    /// Creates the identity model of the given family.
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Translation => Self::Translation(TranslationModel::default()),
            ModelKind::Rigid => Self::Rigid(RigidModel::default()),
            ModelKind::Affine => Self::Affine(AffineModel::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Translation(_) => ModelKind::Translation,
            Self::Rigid(_) => ModelKind::Rigid,
            Self::Affine(_) => ModelKind::Affine,
        }
    }

    fn model(&self) -> &dyn DynModel {
        match self {
            Self::Translation(model) => model,
            Self::Rigid(model) => model,
            Self::Affine(model) => model,
        }
    }

    fn model_mut(&mut self) -> &mut dyn DynModel {
        match self {
            Self::Translation(model) => model,
            Self::Rigid(model) => model,
            Self::Affine(model) => model,
        }
    }
}

impl From<ModelKind> for AnyModel {
    fn from(kind: ModelKind) -> Self {
        Self::new(kind)
    }
}

/// The object safe part of [`TransformModel`].
trait DynModel {
    fn min_num_matches(&self) -> usize;
    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError>;
    fn apply(&self, point: Point3<f64>) -> Point3<f64>;
    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError>;
    fn cost(&self) -> f64;
    fn set_cost(&mut self, cost: f64);
    fn to_homogeneous(&self) -> Matrix4<f64>;
}

impl<M: TransformModel> DynModel for M {
    fn min_num_matches(&self) -> usize {
        TransformModel::min_num_matches(self)
    }

    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError> {
        TransformModel::fit(self, matches)
    }

    fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        TransformModel::apply(self, point)
    }

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError> {
        TransformModel::apply_inverse(self, point)
    }

    fn cost(&self) -> f64 {
        TransformModel::cost(self)
    }

    fn set_cost(&mut self, cost: f64) {
        TransformModel::set_cost(self, cost)
    }

    fn to_homogeneous(&self) -> Matrix4<f64> {
        TransformModel::to_homogeneous(self)
    }
}

impl TransformModel for AnyModel {
    fn min_num_matches(&self) -> usize {
        self.model().min_num_matches()
    }

    fn fit(&mut self, matches: &[WeightedMatch]) -> Result<(), ModelError> {
        self.model_mut().fit(matches)
    }

    #[inline(always)]
    fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        self.model().apply(point)
    }

    fn apply_inverse(&self, point: Point3<f64>) -> Result<Point3<f64>, ModelError> {
        self.model().apply_inverse(point)
    }

    fn cost(&self) -> f64 {
        self.model().cost()
    }

    fn set_cost(&mut self, cost: f64) {
        self.model_mut().set_cost(cost)
    }

    fn to_homogeneous(&self) -> Matrix4<f64> {
        self.model().to_homogeneous()
    }

    /// Composes within the family when both sides agree and falls back to an affine model otherwise.
    fn preconcatenate(&mut self, other: &Self) {
        match (self, other) {
            (Self::Translation(a), Self::Translation(b)) => a.preconcatenate(b),
            (Self::Rigid(a), Self::Rigid(b)) => a.preconcatenate(b),
            (Self::Affine(a), Self::Affine(b)) => a.preconcatenate(b),
            (this, other) => {
                let mut affine = AffineModel::from_model(&*this);
                affine.preconcatenate(&AffineModel::from_model(other));
                *this = Self::Affine(affine);
            }
        }
    }
}
