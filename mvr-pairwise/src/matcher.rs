use crate::PairwiseError;
use mvr_core::{InterestPoint, PointMatch};
use rand::Rng;
use std::borrow::Cow;

/// The matches a [`PairwiseMatcher`] found between two point sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Matched {
    /// Every putative correspondence that was considered.
    pub candidates: Vec<PointMatch<InterestPoint>>,
    /// One set of consistent matches per consensus.
    pub inliers: Vec<Vec<PointMatch<InterestPoint>>>,
    /// The mean residual of the inliers, in world units.
    pub error: f64,
}

/// This trait is implemented by everything that can match the interest points of two views.
///
/// Matching happens in world coordinates. The returned matches carry the points unchanged, so
/// that their local coordinates are still available to the optimizer.
pub trait PairwiseMatcher: Sync {
    /// Whether [`PairwiseMatcher::compute`] modifies the points it is given.
    ///
    /// The driver only hands out owned copies of the points to matchers that set this.
    const MUTATES_POINTS: bool;

    fn compute<R: Rng>(
        &self,
        a: Cow<'_, [InterestPoint]>,
        b: Cow<'_, [InterestPoint]>,
        rng: &mut R,
    ) -> Result<Matched, PairwiseError>;
}
