use super::PointMatchCreator;
use crate::{TileGraph, TileKey};
use log::*;
use mvr_core::{TransformModel, ViewId, WeightedMatch};
use mvr_pairwise::{CorrespondenceStore, Label};
use std::collections::{BTreeMap, BTreeSet};

/// Creates matches from interest point correspondences.
///
/// The weight of a match is its own weight times the mean of the weights of the two labels it
/// connects (labels without a weight count as `1`). When views are grouped, a tile edge collects
/// matches from several view pairs and labels. Edge weights are then scaled by
/// `most / contributing`, where `contributing` is the number of view and label pairs that fed
/// the edge and `most` is the largest such number over all edges.
#[derive(Debug, Clone)]
pub struct InterestPointMatchCreator<'a> {
    store: &'a CorrespondenceStore,
    label_weights: BTreeMap<Label, f64>,
}

impl<'a> InterestPointMatchCreator<'a> {
    pub fn new(store: &'a CorrespondenceStore) -> Self {
        Self {
            store,
            label_weights: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn label_weight(mut self, label: impl Into<Label>, weight: f64) -> Self {
        self.label_weights.insert(label.into(), weight);
        self
    }

    fn weight_of(&self, label: &str) -> f64 {
        self.label_weights.get(label).copied().unwrap_or(1.0)
    }
}

impl PointMatchCreator for InterestPointMatchCreator<'_> {
    fn views(&self) -> BTreeSet<ViewId> {
        self.store.views().collect()
    }

    fn assign_point_matches<M: TransformModel>(&self, graph: &mut TileGraph<M>) {
        let mut edges: BTreeMap<(TileKey, TileKey), (Vec<WeightedMatch>, usize)> = BTreeMap::new();
        for (key, sets) in self.store.iter() {
            let (ta, tb) = match (graph.tile_of(key.views.0), graph.tile_of(key.views.1)) {
                (Some(ta), Some(tb)) if ta != tb => (ta, tb),
                _ => continue,
            };
            let label_weight = (self.weight_of(&key.labels.0) + self.weight_of(&key.labels.1)) / 2.0;
            let matches = sets.iter().flatten().map(|m| {
                WeightedMatch(m.a.local, m.b.local, m.weight * label_weight)
            });
            let (edge, flip) = if ta < tb { ((ta, tb), false) } else { ((tb, ta), true) };
            let (collected, contributing) = edges.entry(edge).or_default();
            collected.extend(matches.map(|m| if flip { m.flipped() } else { m }));
            *contributing += 1;
        }

        let most = edges.values().map(|(_, contributing)| *contributing).max().unwrap_or(1);
        for ((a, b), (matches, contributing)) in edges {
            let added = graph.connect(a, b, matches);
            if contributing != most {
                graph.scale_weights(a, b, most as f64 / contributing as f64);
            }
            debug!(
                "connected {:?} and {:?} with {} matches from {} pairs",
                graph.views_of(a),
                graph.views_of(b),
                added,
                contributing
            );
        }
    }
}
