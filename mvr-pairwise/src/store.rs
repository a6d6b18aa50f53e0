use crate::{Label, PairwiseResult};
use mvr_core::{InterestPoint, PointMatch, ViewId};
use std::collections::BTreeMap;

/// Identifies the correspondences between one label of one view and one label of another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrespondenceKey {
    pub views: (ViewId, ViewId),
    pub labels: (Label, Label),
}

/// The persistent home of the inliers found by pairwise matching.
///
/// Each consensus set is kept separately, so that independent motions between the same two
/// views remain distinguishable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceStore {
    sets: BTreeMap<CorrespondenceKey, Vec<Vec<PointMatch<InterestPoint>>>>,
}

impl CorrespondenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the inliers of `result` into the store and returns how many matches were moved.
    pub fn insert(&mut self, result: &mut PairwiseResult<InterestPoint>) -> usize {
        let sets: Vec<_> = result
            .take_inliers()
            .into_iter()
            .filter(|set| !set.is_empty())
            .collect();
        let moved = sets.iter().map(Vec::len).sum();
        if !sets.is_empty() {
            let key = CorrespondenceKey {
                views: result.views,
                labels: result.labels.clone(),
            };
            self.sets.entry(key).or_default().extend(sets);
        }
        moved
    }

    /// Moves the inliers of every result into the store.
    pub fn insert_all<'a>(
        &mut self,
        results: impl IntoIterator<Item = &'a mut PairwiseResult<InterestPoint>>,
    ) -> usize {
        results.into_iter().map(|result| self.insert(result)).sum()
    }

    /// Adds a consensus set directly.
    pub fn add(
        &mut self,
        views: (ViewId, ViewId),
        labels: (Label, Label),
        matches: Vec<PointMatch<InterestPoint>>,
    ) {
        if !matches.is_empty() {
            self.sets
                .entry(CorrespondenceKey { views, labels })
                .or_default()
                .push(matches);
        }
    }

    pub fn get(&self, key: &CorrespondenceKey) -> Option<&[Vec<PointMatch<InterestPoint>>]> {
        self.sets.get(key).map(Vec::as_slice)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&CorrespondenceKey, &[Vec<PointMatch<InterestPoint>>])> {
        self.sets.iter().map(|(key, sets)| (key, sets.as_slice()))
    }

    /// Every view that takes part in at least one correspondence.
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.sets
            .keys()
            .flat_map(|key| [key.views.0, key.views.1])
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn num_matches(&self) -> usize {
        self.sets.values().flatten().map(Vec::len).sum()
    }
}
