use derive_more::{Deref, From, Into};
use std::collections::BTreeSet;
use std::fmt;
use std::iter::FromIterator;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Identifies a single acquisition by its timepoint and view setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ViewId {
    pub timepoint: u32,
    pub setup: u32,
}

impl ViewId {
    pub fn new(timepoint: u32, setup: u32) -> Self {
        Self { timepoint, setup }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(tp {}, setup {})", self.timepoint, self.setup)
    }
}

/// A set of views which are constrained to share exactly one transform.
///
/// Groups handed to one optimization must not overlap. Use [`Group::merge_all_overlapping`]
/// to establish that before optimizing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde-serialize",
    serde(bound(deserialize = "V: Deserialize<'de> + Ord"))
)]
pub struct Group<V>(BTreeSet<V>);

impl<V: Ord> Group<V> {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, view: V) -> bool {
        self.0.insert(view)
    }

    /// Checks if any of the given views is part of this group.
    pub fn contains_any<'a>(&self, views: impl IntoIterator<Item = &'a V>) -> bool
    where
        V: 'a,
    {
        views.into_iter().any(|view| self.0.contains(view))
    }

    /// Checks if the two groups share at least one view.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Moves all views of `other` into this group.
    pub fn absorb(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Merges every set of transitively overlapping groups into one group.
    ///
    /// Empty groups are discarded. The returned groups are pairwise disjoint.
    pub fn merge_all_overlapping(groups: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut merged: Vec<Self> = vec![];
        for mut group in groups.into_iter().filter(|group| !group.is_empty()) {
            // The groups in `merged` are disjoint, so each one only has to be absorbed once.
            let (overlapping, disjoint): (Vec<Self>, Vec<Self>) = merged
                .into_iter()
                .partition(|existing| existing.overlaps(&group));
            for existing in overlapping {
                group.absorb(existing);
            }
            merged = disjoint;
            merged.push(group);
        }
        merged
    }
}

impl<V: Ord> Default for Group<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Ord> FromIterator<V> for Group<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Ord + fmt::Display> fmt::Display for Group<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (ix, view) in self.0.iter().enumerate() {
            if ix != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", view)?;
        }
        write!(f, "]")
    }
}
