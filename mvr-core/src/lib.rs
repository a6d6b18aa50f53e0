//! # Multiview registration core
//!
//! This crate provides the common types every other `mvr` crate speaks: view identifiers,
//! groups of views that share one transform, interest points, weighted point matches,
//! coarse whole-image links and the low-dimensional [`TransformModel`]s that are fit
//! to them. It is intentionally small so that matchers, optimizers and the tools built
//! on top of them can exchange data without depending on each other.
//!
//! ## Coordinates
//!
//! Every point carries two coordinates:
//!
//! * `local` - the coordinate in the view it was detected in
//! * `world` - the coordinate after some transform has been applied to `local`
//!
//! A [`PointMatch`] pairs a point `a` with a point `b`. When a model is fit to a set of
//! matches it maps `a.local()` onto `b.world()`, and the residual of a match under a model
//! is the euclidean distance between `model(a.local())` and `b.world()`, expressed in the
//! same units as the input coordinates.
//!
//! ## Models
//!
//! Three transform families are provided, from the least to the most degrees of freedom:
//!
//! * [`TranslationModel`] - 3 DOF, needs at least one match
//! * [`RigidModel`] - 6 DOF, needs at least three non-collinear matches
//! * [`AffineModel`] - 12 DOF, needs at least four non-coplanar matches
//!
//! [`AnyModel`] wraps all three so the family can be chosen at runtime.

mod bbox;
mod error;
mod link;
mod matches;
mod model;
mod point;
mod view;

pub use bbox::*;
pub use error::*;
pub use link::*;
pub use matches::*;
pub use model::*;
pub use nalgebra;
pub use point::*;
pub use sample_consensus;
pub use view::*;
