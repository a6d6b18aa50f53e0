//! # Global optimization
//!
//! Views are registered by optimizing a [`TileGraph`]. A tile holds one transform model for one
//! view or one group of views, and weighted point matches connect it to its neighbors. The
//! matches come from a [`PointMatchCreator`], for instance interest point correspondences
//! or whole-image links.
//!
//! Three optimizers build on each other:
//!
//! * [`GlobalOptimizer`] - one round of pre-alignment followed by iterative refitting
//! * [`IterativeOptimizer`] - repeats the single round, removing the worst link each time
//!   the result is not acceptable
//! * [`TwoRoundOptimizer`] - joins the connected components that remain after the iterative
//!   optimizer through weak links and composes the transforms of both rounds

mod convergence;
mod creator;
mod global;
mod iterative;
mod removal;
mod tile;
mod two_round;

pub use convergence::*;
pub use creator::*;
pub use global::*;
pub use iterative::*;
pub use removal::*;
pub use tile::*;
pub use two_round::*;

use mvr_core::{Group, ModelError, ViewId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    /// No tile is connected to any other tile.
    #[error("no connected tiles to optimize")]
    Disconnected,
    #[error("failed to fit the tile of views {views}: {source}")]
    Model {
        views: Group<ViewId>,
        #[source]
        source: ModelError,
    },
}
