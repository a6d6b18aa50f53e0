use crate::{AffineModel, AnyModel, Located, RigidModel, TransformModel, TranslationModel};
use nalgebra::Point3;
use sample_consensus::Model;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A `(source, target, weight)` triple that a model is fit from.
///
/// A fit finds the model that maps each source as closely as possible onto its target,
/// with every squared distance scaled by the weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedMatch(pub Point3<f64>, pub Point3<f64>, pub f64);

impl WeightedMatch {
    pub fn new(source: Point3<f64>, target: Point3<f64>) -> Self {
        Self(source, target, 1.0)
    }

    /// Swaps source and target.
    #[must_use]
    pub fn flipped(self) -> Self {
        let Self(source, target, weight) = self;
        Self(target, source, weight)
    }
}

/// A weighted correspondence between a point `a` in one view and a point `b` in another.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PointMatch<P> {
    pub a: P,
    pub b: P,
    pub weight: f64,
}

impl<P> PointMatch<P> {
    pub fn new(a: P, b: P) -> Self {
        Self { a, b, weight: 1.0 }
    }

    pub fn with_weight(a: P, b: P, weight: f64) -> Self {
        Self { a, b, weight }
    }

    /// Swaps `a` and `b`, keeping the weight.
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            weight: self.weight,
        }
    }
}

impl<P: Located> PointMatch<P> {
    /// The residual of this match under `model`.
    pub fn distance<M: TransformModel>(&self, model: &M) -> f64 {
        nalgebra::distance(&model.apply(self.a.local()), &self.b.world())
    }

    /// The coordinates a model is fit from: `a.local()` onto `b.world()`.
    pub fn weighted(&self) -> WeightedMatch {
        WeightedMatch(self.a.local(), self.b.world(), self.weight)
    }
}

macro_rules! impl_consensus_model {
    ($($model:ty),*) => {
        $(
            impl<P: Located> Model<PointMatch<P>> for $model {
                #[inline(always)]
                fn residual(&self, data: &PointMatch<P>) -> f64 {
                    data.distance(self)
                }
            }
        )*
    };
}

impl_consensus_model!(TranslationModel, RigidModel, AffineModel, AnyModel);
