use super::link::tile_of_group;
use super::PointMatchCreator;
use crate::TileGraph;
use log::*;
use mvr_core::{Group, Link, TransformModel, ViewId, WeightedMatch};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Matches between two groups in the space produced by a first optimization round.
#[derive(Debug, Clone, PartialEq)]
pub struct WeakLink {
    pub a: Group<ViewId>,
    pub b: Group<ViewId>,
    pub matches: Vec<WeightedMatch>,
}

/// Creates the matches of a second optimization round from precomputed weak links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeakLinkMatchCreator {
    links: Vec<WeakLink>,
}

impl WeakLinkMatchCreator {
    pub fn new(links: impl IntoIterator<Item = WeakLink>) -> Self {
        Self {
            links: links.into_iter().collect(),
        }
    }

    pub fn links(&self) -> &[WeakLink] {
        &self.links
    }
}

impl PointMatchCreator for WeakLinkMatchCreator {
    fn views(&self) -> BTreeSet<ViewId> {
        self.links
            .iter()
            .flat_map(|link| link.a.iter().chain(link.b.iter()).copied())
            .collect()
    }

    fn assign_point_matches<M: TransformModel>(&self, graph: &mut TileGraph<M>) {
        for link in &self.links {
            if let (Some(a), Some(b)) = (tile_of_group(graph, &link.a), tile_of_group(graph, &link.b)) {
                graph.connect(a, b, link.matches.iter().copied());
            }
        }
    }
}

/// Builds the weak links that join the connected components left after a first round.
///
/// Implementations decide how weak links are scored. The optimizer only hands over the
/// components and the transforms of the first round.
pub trait WeakLinkFactory<M> {
    type Creator: PointMatchCreator;

    fn create(
        &self,
        components: &[Group<ViewId>],
        transforms: &BTreeMap<ViewId, Arc<M>>,
    ) -> Self::Creator;
}

/// Lifts links between single views, such as ones derived from stage positions, onto components.
///
/// Links whose views end up in the same component are ignored. The corners of every other link
/// are mapped through the first round transforms of its two views, so that the resulting matches
/// live in the space the second round optimizes in.
#[derive(Debug, Clone)]
pub struct MetadataWeakLinkFactory {
    links: Vec<Link<ViewId>>,
}

impl MetadataWeakLinkFactory {
    pub fn new(links: impl IntoIterator<Item = Link<ViewId>>) -> Self {
        Self {
            links: links.into_iter().collect(),
        }
    }
}

impl<M: TransformModel> WeakLinkFactory<M> for MetadataWeakLinkFactory {
    type Creator = WeakLinkMatchCreator;

    fn create(
        &self,
        components: &[Group<ViewId>],
        transforms: &BTreeMap<ViewId, Arc<M>>,
    ) -> WeakLinkMatchCreator {
        let component_of = |view: &ViewId| components.iter().position(|c| c.contains(view));
        let mut weak = vec![];
        for link in &self.links {
            let (ca, cb) = match (component_of(&link.a), component_of(&link.b)) {
                (Some(ca), Some(cb)) if ca != cb => (ca, cb),
                _ => continue,
            };
            let (ta, tb) = match (transforms.get(&link.a), transforms.get(&link.b)) {
                (Some(ta), Some(tb)) => (ta, tb),
                _ => {
                    warn!("skipping weak link {} <-> {} without transforms", link.a, link.b);
                    continue;
                }
            };
            let pairs = match link.corner_pairs() {
                Some(pairs) => pairs,
                None => {
                    warn!("skipping weak link {} <-> {} with a singular transform", link.a, link.b);
                    continue;
                }
            };
            let matches = pairs
                .map(|(pa, pb)| WeightedMatch(ta.apply(pa), tb.apply(pb), link.quality))
                .collect();
            weak.push(WeakLink {
                a: components[ca].clone(),
                b: components[cb].clone(),
                matches,
            });
        }
        info!(
            "created {} weak links between {} components",
            weak.len(),
            components.len()
        );
        WeakLinkMatchCreator::new(weak)
    }
}
