//! Turning correspondences into weighted edges of a [`TileGraph`].

mod interest;
mod link;
mod weak;

pub use interest::*;
pub use link::*;
pub use weak::*;

use crate::TileGraph;
use mvr_core::{TransformModel, ViewId};
use std::collections::BTreeSet;

/// This trait is implemented by every source of correspondences the optimizer understands.
pub trait PointMatchCreator {
    /// Every view this creator may connect.
    fn views(&self) -> BTreeSet<ViewId>;

    /// Inserts weighted matches between the tiles of the graph.
    ///
    /// Matches are added through [`TileGraph::connect`], which keeps both tiles consistent.
    fn assign_point_matches<M: TransformModel>(&self, graph: &mut TileGraph<M>);
}
