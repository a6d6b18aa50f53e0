//! # Pairwise matching
//!
//! Every view carries interest points grouped by label. [`compute_pairwise`] matches the points
//! of each requested view pair for every combination of labels, runs all combinations as
//! independent tasks on a rayon pool and returns one [`PairwiseResult`] per combination once
//! every task has finished.
//!
//! Two matchers are provided:
//!
//! * [`DescriptorMatcher`] - geometric descriptors built from the nearest neighbors of each point,
//!   followed by RANSAC
//! * [`IcpMatcher`] - iterative closest point for views that are already roughly aligned
//!
//! The inliers of every result are moved into a [`CorrespondenceStore`], which is what the
//! optimizer builds its graph from.

mod descriptor;
mod driver;
mod error;
mod icp;
mod matcher;
mod result;
mod spatial;
mod store;

pub use descriptor::*;
pub use driver::*;
pub use error::*;
pub use icp::*;
pub use matcher::*;
pub use result::*;
pub use store::*;

/// The label of a set of interest points, such as the name of the detection that produced them.
pub type Label = String;
