use crate::Label;
use mvr_core::{PointMatch, ViewId};
use std::time::Duration;

/// The outcome of matching one label of one view against one label of another view.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseResult<P> {
    pub views: (ViewId, ViewId),
    pub labels: (Label, Label),
    pub candidates: Vec<PointMatch<P>>,
    inliers: Vec<Vec<PointMatch<P>>>,
    /// Mean inlier residual, or infinity if matching failed.
    pub error: f64,
    /// Names both views and labels and summarizes the outcome.
    pub description: String,
    pub elapsed: Duration,
}

impl<P> PairwiseResult<P> {
    pub fn new(
        views: (ViewId, ViewId),
        labels: (Label, Label),
        candidates: Vec<PointMatch<P>>,
        inliers: Vec<Vec<PointMatch<P>>>,
        error: f64,
    ) -> Self {
        let description = describe(views, &labels);
        Self {
            views,
            labels,
            candidates,
            inliers,
            error,
            description,
            elapsed: Duration::default(),
        }
    }

    /// A result without any matches that records why matching failed.
    pub fn failed(views: (ViewId, ViewId), labels: (Label, Label), reason: impl std::fmt::Display) -> Self {
        let mut result = Self::new(views, labels, vec![], vec![], f64::INFINITY);
        result.description = format!("{}: {}", result.description, reason);
        result
    }

    /// The consistent match sets, one per consensus.
    pub fn inliers(&self) -> &[Vec<PointMatch<P>>] {
        &self.inliers
    }

    pub fn num_inliers(&self) -> usize {
        self.inliers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_inliers() == 0
    }

    /// Moves the inliers out of the result, leaving it without any.
    pub fn take_inliers(&mut self) -> Vec<Vec<PointMatch<P>>> {
        std::mem::take(&mut self.inliers)
    }
}

fn describe(views: (ViewId, ViewId), labels: &(Label, Label)) -> String {
    format!(
        "{} [{}] <-> {} [{}]",
        views.0, labels.0, views.1, labels.1
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvr_core::nalgebra::Point3;
    use mvr_core::InterestPoint;

    #[test]
    fn inliers_are_taken_exactly_once() {
        let p = InterestPoint::new(0, Point3::origin());
        let mut result = PairwiseResult::new(
            (ViewId::new(0, 0), ViewId::new(0, 1)),
            ("beads".to_owned(), "beads".to_owned()),
            vec![PointMatch::new(p, p)],
            vec![vec![PointMatch::new(p, p)]],
            0.0,
        );
        assert_eq!(result.take_inliers().len(), 1);
        assert!(result.take_inliers().is_empty());
        assert!(result.is_empty());
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn failure_names_both_views() {
        let result = PairwiseResult::<InterestPoint>::failed(
            (ViewId::new(0, 0), ViewId::new(1, 2)),
            ("a".to_owned(), "b".to_owned()),
            "no model found",
        );
        assert_eq!(
            result.description,
            "(tp 0, setup 0) [a] <-> (tp 1, setup 2) [b]: no model found"
        );
    }
}
