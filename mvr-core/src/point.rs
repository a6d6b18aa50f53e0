use crate::TransformModel;
use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This trait is implemented by everything that can take part in a [`PointMatch`](crate::PointMatch).
///
/// The optimizer and the matchers only ever read these two coordinates. Any payload a point
/// carries is left untouched.
pub trait Located {
    /// The coordinate in the frame of the view the point belongs to.
    fn local(&self) -> Point3<f64>;

    /// The coordinate after the current transform of the view has been applied.
    fn world(&self) -> Point3<f64>;
}

/// A detection in one view.
///
/// Detectors create these with `world == local`. Once a view has a registration,
/// [`InterestPoint::transformed`] produces the copy that carries the registered coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct InterestPoint {
    /// The detection id, unique per view and label.
    pub id: usize,
    pub local: Point3<f64>,
    pub world: Point3<f64>,
}

impl InterestPoint {
    pub fn new(id: usize, local: Point3<f64>) -> Self {
        Self {
            id,
            local,
            world: local,
        }
    }

    /// Creates a copy whose world coordinate is `model` applied to the local coordinate.
    #[must_use]
    pub fn transformed<M: TransformModel>(&self, model: &M) -> Self {
        Self {
            world: model.apply(self.local),
            ..*self
        }
    }

    /// Creates a copy that treats the current world coordinate as its local coordinate.
    ///
    /// Matching is performed in world space, so this is how registered points enter a matcher.
    #[must_use]
    pub fn world_as_local(&self) -> Self {
        Self::new(self.id, self.world)
    }
}

impl Located for InterestPoint {
    #[inline(always)]
    fn local(&self) -> Point3<f64> {
        self.local
    }

    #[inline(always)]
    fn world(&self) -> Point3<f64> {
        self.world
    }
}

/// A point that carries an arbitrary payload next to its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct LinkedPoint<T> {
    pub local: Point3<f64>,
    pub world: Point3<f64>,
    pub link: T,
}

impl<T> LinkedPoint<T> {
    pub fn new(local: Point3<f64>, link: T) -> Self {
        Self {
            local,
            world: local,
            link,
        }
    }
}

impl<T> Located for LinkedPoint<T> {
    #[inline(always)]
    fn local(&self) -> Point3<f64> {
        self.local
    }

    #[inline(always)]
    fn world(&self) -> Point3<f64> {
        self.world
    }
}
