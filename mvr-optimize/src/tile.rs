use crate::ErrorStatistics;
use itertools::{Itertools, MinMaxResult};
use average::Mean;
use log::*;
use mvr_core::nalgebra::Point3;
use mvr_core::{Group, TransformModel, ViewId, WeightedMatch};
use slotmap::{new_key_type, DenseSlotMap};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

new_key_type! {
    pub struct TileKey;
}

/// One half of a point match as seen from the tile that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMatch {
    /// The coordinate in the local frame of the owning tile.
    pub local: Point3<f64>,
    pub neighbor: TileKey,
    /// The corresponding coordinate in the local frame of the neighbor.
    pub neighbor_local: Point3<f64>,
    pub weight: f64,
}

/// A node of the graph: one transform model shared by one view or one group of views.
#[derive(Debug, Clone)]
pub struct Tile<M> {
    pub model: M,
    views: BTreeSet<ViewId>,
    matches: Vec<TileMatch>,
    neighbors: BTreeSet<TileKey>,
    fixed: bool,
}

impl<M> Tile<M> {
    pub fn views(&self) -> &BTreeSet<ViewId> {
        &self.views
    }

    pub fn matches(&self) -> &[TileMatch] {
        &self.matches
    }

    pub fn neighbors(&self) -> &BTreeSet<TileKey> {
        &self.neighbors
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn is_connected(&self) -> bool {
        !self.neighbors.is_empty()
    }
}

/// The optimization graph.
///
/// Every view belongs to exactly one tile. Point matches are always stored twice, once on each
/// of the two tiles they connect, and both tiles list each other as neighbors.
#[derive(Debug, Clone)]
pub struct TileGraph<M> {
    tiles: DenseSlotMap<TileKey, Tile<M>>,
    view_to_tile: BTreeMap<ViewId, TileKey>,
}

impl<M: TransformModel> TileGraph<M> {
    /// Creates one tile per group and one tile per view that is not part of any group.
    ///
    /// Overlapping groups are merged first and empty groups are dropped. Every tile starts with a
    /// copy of `prototype`.
    pub fn new(
        prototype: &M,
        views: impl IntoIterator<Item = ViewId>,
        groups: impl IntoIterator<Item = Group<ViewId>>,
    ) -> Self {
        let mut members: Vec<BTreeSet<ViewId>> = Group::merge_all_overlapping(groups)
            .into_iter()
            .map(Into::into)
            .collect();
        let grouped: BTreeSet<ViewId> = members.iter().flatten().copied().collect();
        let singles: BTreeSet<ViewId> = views
            .into_iter()
            .filter(|view| !grouped.contains(view))
            .collect();
        members.extend(singles.into_iter().map(|view| BTreeSet::from([view])));
        members.sort_unstable();

        let mut tiles = DenseSlotMap::with_key();
        let mut view_to_tile = BTreeMap::new();
        for views in members {
            let key = tiles.insert(Tile {
                model: prototype.clone(),
                views: views.clone(),
                matches: vec![],
                neighbors: BTreeSet::new(),
                fixed: false,
            });
            view_to_tile.extend(views.into_iter().map(|view| (view, key)));
        }
        Self {
            tiles,
            view_to_tile,
        }
    }
}

impl<M> TileGraph<M> {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_of(&self, view: ViewId) -> Option<TileKey> {
        self.view_to_tile.get(&view).copied()
    }

    pub fn tile(&self, key: TileKey) -> &Tile<M> {
        &self.tiles[key]
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileKey, &Tile<M>)> + '_ {
        self.tiles.iter()
    }

    /// All tile keys in ascending order.
    pub fn keys(&self) -> Vec<TileKey> {
        self.tiles.keys().sorted().collect()
    }

    pub fn views_of(&self, key: TileKey) -> &BTreeSet<ViewId> {
        &self.tiles[key].views
    }

    pub fn model(&self, key: TileKey) -> &M {
        &self.tiles[key].model
    }

    pub fn set_model(&mut self, key: TileKey, model: M) {
        self.tiles[key].model = model;
    }

    pub fn models(&self) -> impl Iterator<Item = (TileKey, &M)> + '_ {
        self.tiles.iter().map(|(key, tile)| (key, &tile.model))
    }

    pub fn fix(&mut self, key: TileKey) {
        self.tiles[key].fixed = true;
    }

    pub fn is_fixed(&self, key: TileKey) -> bool {
        self.tiles[key].fixed
    }

    /// Adds matches between two tiles, storing each one on both tiles.
    ///
    /// Each match maps a local coordinate of `a` to a local coordinate of `b`. Matches within one
    /// tile carry no information and are ignored. Returns the number of matches added.
    pub fn connect(
        &mut self,
        a: TileKey,
        b: TileKey,
        matches: impl IntoIterator<Item = WeightedMatch>,
    ) -> usize {
        if a == b {
            return 0;
        }
        let (forward, backward): (Vec<TileMatch>, Vec<TileMatch>) = matches
            .into_iter()
            .map(|WeightedMatch(pa, pb, weight)| {
                (
                    TileMatch {
                        local: pa,
                        neighbor: b,
                        neighbor_local: pb,
                        weight,
                    },
                    TileMatch {
                        local: pb,
                        neighbor: a,
                        neighbor_local: pa,
                        weight,
                    },
                )
            })
            .unzip();
        let added = forward.len();
        if added != 0 {
            let tile_a = &mut self.tiles[a];
            tile_a.matches.extend(forward);
            tile_a.neighbors.insert(b);
            let tile_b = &mut self.tiles[b];
            tile_b.matches.extend(backward);
            tile_b.neighbors.insert(a);
        }
        added
    }

    /// Removes every match between the two tiles and returns how many were removed from `a`.
    pub fn disconnect(&mut self, a: TileKey, b: TileKey) -> usize {
        let tile_a = &mut self.tiles[a];
        let before = tile_a.matches.len();
        tile_a.matches.retain(|m| m.neighbor != b);
        tile_a.neighbors.remove(&b);
        let removed = before - tile_a.matches.len();
        let tile_b = &mut self.tiles[b];
        tile_b.matches.retain(|m| m.neighbor != a);
        tile_b.neighbors.remove(&a);
        removed
    }

    /// Multiplies the weight of every match between the two tiles, in both directions.
    pub fn scale_weights(&mut self, a: TileKey, b: TileKey, factor: f64) {
        for (from, to) in [(a, b), (b, a)] {
            for m in self.tiles[from]
                .matches
                .iter_mut()
                .filter(|m| m.neighbor == to)
            {
                m.weight *= factor;
            }
        }
    }

    /// Every connected pair of tiles once, smaller key first.
    pub fn edges(&self) -> Vec<(TileKey, TileKey)> {
        self.keys()
            .into_iter()
            .flat_map(|a| {
                self.tiles[a]
                    .neighbors
                    .iter()
                    .filter(move |&&b| a < b)
                    .map(move |&b| (a, b))
            })
            .collect()
    }

    /// Groups the tiles into connected components, each sorted, ordered by their first tile.
    ///
    /// Tiles without neighbors form components of their own.
    pub fn connected_components(&self) -> Vec<Vec<TileKey>> {
        let mut visited = BTreeSet::new();
        let mut components = vec![];
        for start in self.keys() {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(key) = queue.pop_front() {
                for &neighbor in &self.tiles[key].neighbors {
                    if visited.insert(neighbor) {
                        component.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

impl<M: TransformModel> TileGraph<M> {
    /// The matches of a tile with every target mapped through the current model of its neighbor.
    ///
    /// Only matches whose neighbor passes `include` are returned.
    pub fn fit_targets(
        &self,
        key: TileKey,
        mut include: impl FnMut(TileKey) -> bool,
    ) -> Vec<WeightedMatch> {
        self.tiles[key]
            .matches
            .iter()
            .filter(|m| include(m.neighbor))
            .map(|m| {
                WeightedMatch(
                    m.local,
                    self.tiles[m.neighbor].model.apply(m.neighbor_local),
                    m.weight,
                )
            })
            .collect()
    }

    /// Fits a copy of the model of a tile to the current models of its neighbors.
    pub fn fitted(&self, key: TileKey) -> Result<M, mvr_core::ModelError> {
        let mut model = self.tiles[key].model.clone();
        model.fit(&self.fit_targets(key, |_| true))?;
        trace!("fit tile {:?} to {} neighbors", key, self.tiles[key].neighbors.len());
        Ok(model)
    }

    /// The weighted mean distance between the matches of a tile and their neighbors.
    ///
    /// Only matches towards `neighbor` are considered if it is given. Returns `None` if there are
    /// no such matches.
    pub fn match_error(&self, key: TileKey, neighbor: Option<TileKey>) -> Option<f64> {
        let tile = &self.tiles[key];
        let (weighted, total) = tile
            .matches
            .iter()
            .filter(|m| neighbor.map_or(true, |n| m.neighbor == n))
            .fold((0.0, 0.0), |(weighted, total), m| {
                let distance = mvr_core::nalgebra::distance(
                    &tile.model.apply(m.local),
                    &self.tiles[m.neighbor].model.apply(m.neighbor_local),
                );
                (weighted + m.weight * distance, total + m.weight)
            });
        (total > 0.0).then(|| weighted / total)
    }

    /// The mean, minimum and maximum tile error over the given tiles.
    pub fn error_statistics(&self, keys: &[TileKey]) -> ErrorStatistics {
        let errors: Vec<f64> = keys
            .iter()
            .filter_map(|&key| self.match_error(key, None))
            .collect();
        let mean: Mean = errors.iter().copied().collect();
        match errors.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => ErrorStatistics::default(),
            MinMaxResult::OneElement(only) => ErrorStatistics {
                mean: only,
                min: only,
                max: only,
            },
            MinMaxResult::MinMax(min, max) => ErrorStatistics {
                mean: mean.mean(),
                min,
                max,
            },
        }
    }
}
