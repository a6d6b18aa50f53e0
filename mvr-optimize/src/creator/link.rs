use super::PointMatchCreator;
use crate::{TileGraph, TileKey};
use log::*;
use mvr_core::{Group, Link, TransformModel, ViewId, WeightedMatch};
use std::collections::BTreeSet;

/// Creates matches from whole-image links such as cross-correlation or precomputed stitching results.
///
/// Each corner of the bounding box of a link becomes one match, weighted by the link quality.
/// Links with a quality below `min_quality` are skipped.
#[derive(Debug, Clone)]
pub struct LinkMatchCreator {
    links: Vec<Link<Group<ViewId>>>,
    min_quality: f64,
}

impl LinkMatchCreator {
    pub fn new(links: impl IntoIterator<Item = Link<Group<ViewId>>>) -> Self {
        Self {
            links: links.into_iter().collect(),
            min_quality: 0.0,
        }
    }

    #[must_use]
    pub fn min_quality(self, min_quality: f64) -> Self {
        Self {
            min_quality,
            ..self
        }
    }

    pub fn links(&self) -> &[Link<Group<ViewId>>] {
        &self.links
    }
}

/// The single tile all views of a group belong to.
pub(crate) fn tile_of_group<M>(graph: &TileGraph<M>, group: &Group<ViewId>) -> Option<TileKey> {
    let mut tiles = group.iter().filter_map(|&view| graph.tile_of(view));
    let first = tiles.next()?;
    if tiles.any(|tile| tile != first) {
        warn!("views of group {} are spread over several tiles", group);
        return None;
    }
    Some(first)
}

impl PointMatchCreator for LinkMatchCreator {
    fn views(&self) -> BTreeSet<ViewId> {
        self.links
            .iter()
            .flat_map(|link| link.a.iter().chain(link.b.iter()).copied())
            .collect()
    }

    fn assign_point_matches<M: TransformModel>(&self, graph: &mut TileGraph<M>) {
        for link in &self.links {
            if link.quality < self.min_quality {
                debug!(
                    "skipping link {} <-> {} with quality {}",
                    link.a, link.b, link.quality
                );
                continue;
            }
            let (a, b) = match (tile_of_group(graph, &link.a), tile_of_group(graph, &link.b)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    warn!("skipping link {} <-> {} between unknown tiles", link.a, link.b);
                    continue;
                }
            };
            match link.corner_pairs() {
                Some(pairs) => {
                    let quality = link.quality;
                    graph.connect(a, b, pairs.map(|(pa, pb)| WeightedMatch(pa, pb, quality)));
                }
                None => warn!(
                    "skipping link {} <-> {} with a singular transform",
                    link.a, link.b
                ),
            }
        }
    }
}
