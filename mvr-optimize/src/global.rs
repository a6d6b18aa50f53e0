use crate::{
    ConvergenceStrategy, ErrorStatistics, OptimizeError, PointMatchCreator, TileGraph, TileKey,
};
use log::*;
use mvr_core::{Group, TransformModel, ViewId};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// The outcome of one optimization round.
#[derive(Debug, Clone)]
pub struct GlobalOptResult<M> {
    /// The graph with the optimized models.
    pub graph: TileGraph<M>,
    /// The error over all connected tiles after the last iteration.
    pub error: ErrorStatistics,
    pub iterations: usize,
    /// Whether the mean error is acceptable to the convergence strategy.
    pub converged: bool,
    /// Tiles without connections that kept their initial model.
    pub excluded: Vec<TileKey>,
}

impl<M: Clone> GlobalOptResult<M> {
    /// One transform per view. The views of a tile share one allocation.
    pub fn transforms(&self) -> BTreeMap<ViewId, Arc<M>> {
        let mut transforms = BTreeMap::new();
        for (_, tile) in self.graph.tiles() {
            let model = Arc::new(tile.model.clone());
            for &view in tile.views() {
                transforms.insert(view, model.clone());
            }
        }
        transforms
    }

    pub fn excluded_views(&self) -> BTreeSet<ViewId> {
        self.excluded
            .iter()
            .flat_map(|&key| self.graph.views_of(key).iter().copied())
            .collect()
    }
}

/// A single optimization round over a tile graph.
///
/// Tiles are pre-aligned by a breadth first traversal from the fixed tiles and then refit to
/// their neighbors until the [`ConvergenceStrategy`] stops the iteration. By default tiles are
/// refit one after another, each seeing the updates made before it in the same iteration. With
/// `concurrent` all tiles are refit in parallel against the models of the previous iteration.
#[derive(Debug, Clone)]
pub struct GlobalOptimizer<M> {
    prototype: M,
    convergence: ConvergenceStrategy,
    fixed: BTreeSet<ViewId>,
    groups: Vec<Group<ViewId>>,
    initial: BTreeMap<ViewId, M>,
    concurrent: bool,
}

impl<M: TransformModel> GlobalOptimizer<M> {
    pub fn new(prototype: M, convergence: ConvergenceStrategy) -> Self {
        Self {
            prototype,
            convergence,
            fixed: BTreeSet::new(),
            groups: vec![],
            initial: BTreeMap::new(),
            concurrent: false,
        }
    }

    /// Views whose tiles never change their model.
    #[must_use]
    pub fn fixed_views(self, fixed: impl IntoIterator<Item = ViewId>) -> Self {
        Self {
            fixed: fixed.into_iter().collect(),
            ..self
        }
    }

    /// Views that share one transform. Overlapping groups are merged.
    #[must_use]
    pub fn groups(self, groups: impl IntoIterator<Item = Group<ViewId>>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
            ..self
        }
    }

    /// The models tiles start from instead of the prototype.
    ///
    /// A tile takes the transform of the first of its views that has one.
    #[must_use]
    pub fn initial_transforms(self, initial: BTreeMap<ViewId, M>) -> Self {
        Self { initial, ..self }
    }

    #[must_use]
    pub fn concurrent(self, concurrent: bool) -> Self {
        Self { concurrent, ..self }
    }

    #[must_use]
    pub fn convergence(self, convergence: ConvergenceStrategy) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    pub fn prototype(&self) -> &M {
        &self.prototype
    }

    pub fn convergence_strategy(&self) -> &ConvergenceStrategy {
        &self.convergence
    }

    pub fn fixed(&self) -> &BTreeSet<ViewId> {
        &self.fixed
    }

    /// Builds the graph, lets the creator connect it and marks the fixed tiles.
    pub fn build_graph<C: PointMatchCreator>(&self, creator: &C) -> TileGraph<M> {
        let mut graph = TileGraph::new(&self.prototype, creator.views(), self.groups.iter().cloned());
        creator.assign_point_matches(&mut graph);
        for key in graph.keys() {
            let initial = graph
                .views_of(key)
                .iter()
                .find_map(|view| self.initial.get(view))
                .cloned();
            if let Some(model) = initial {
                graph.set_model(key, model);
            }
            if graph.views_of(key).iter().any(|view| self.fixed.contains(view)) {
                graph.fix(key);
            }
        }
        graph
    }

    pub fn optimize<C: PointMatchCreator>(
        &self,
        creator: &C,
    ) -> Result<GlobalOptResult<M>, OptimizeError> {
        self.solve(self.build_graph(creator))
    }

    /// Optimizes an already connected graph.
    pub fn solve(&self, mut graph: TileGraph<M>) -> Result<GlobalOptResult<M>, OptimizeError> {
        let (active, unconnected): (Vec<TileKey>, Vec<TileKey>) = graph
            .keys()
            .into_iter()
            .partition(|&key| graph.tile(key).is_connected());
        let excluded: Vec<TileKey> = unconnected
            .into_iter()
            .filter(|&key| !graph.is_fixed(key))
            .collect();
        if active.is_empty() {
            warn!(
                "none of the {} tiles is connected, nothing to optimize",
                graph.len()
            );
            return Err(OptimizeError::Disconnected);
        }
        let free: Vec<TileKey> = active
            .iter()
            .copied()
            .filter(|&key| !graph.is_fixed(key))
            .collect();
        info!(
            "optimizing {} tiles, {} connected tiles are fixed, {} tiles are excluded",
            free.len(),
            active.len() - free.len(),
            excluded.len()
        );

        self.pre_align(&mut graph, &active);

        let mut history = vec![];
        let mut error = graph.error_statistics(&active);
        while !free.is_empty() {
            if self.concurrent {
                update_concurrent(&mut graph, &free)?;
            } else {
                update_sequential(&mut graph, &free)?;
            }
            error = graph.error_statistics(&active);
            history.push(error.mean);
            debug!(
                "iteration {}: mean error {}, min {}, max {}",
                history.len(),
                error.mean,
                error.min,
                error.max
            );
            if !self.convergence.should_continue(&history) {
                break;
            }
        }
        let converged = self.convergence.is_converged(&error);
        info!(
            "stopped after {} iterations with mean error {} (min {}, max {}), converged: {}",
            history.len(),
            error.mean,
            error.min,
            error.max,
            converged
        );
        Ok(GlobalOptResult {
            graph,
            error,
            iterations: history.len(),
            converged,
            excluded,
        })
    }

    /// Gives every connected tile an initial model consistent with an already aligned neighbor.
    ///
    /// The traversal starts from the fixed tiles. Components without a fixed tile start from
    /// their first tile, which keeps its current model.
    fn pre_align(&self, graph: &mut TileGraph<M>, active: &[TileKey]) {
        let mut aligned: BTreeSet<TileKey> = active
            .iter()
            .copied()
            .filter(|&key| graph.is_fixed(key))
            .collect();
        let mut queue: VecDeque<TileKey> = aligned.iter().copied().collect();
        let mut roots = active.iter().copied();
        loop {
            while let Some(key) = queue.pop_front() {
                let neighbors: Vec<TileKey> = graph.tile(key).neighbors().iter().copied().collect();
                for neighbor in neighbors {
                    if aligned.contains(&neighbor) {
                        continue;
                    }
                    let targets = graph.fit_targets(neighbor, |k| aligned.contains(&k));
                    let mut model = graph.model(neighbor).clone();
                    match model.fit(&targets) {
                        Ok(()) => graph.set_model(neighbor, model),
                        Err(e) => warn!(
                            "failed to pre-align the tile of views {:?}: {}",
                            graph.views_of(neighbor),
                            e
                        ),
                    }
                    aligned.insert(neighbor);
                    queue.push_back(neighbor);
                }
            }
            match roots.find(|key| !aligned.contains(key)) {
                Some(root) => {
                    debug!(
                        "pre-aligning a component without fixed tiles from {:?}",
                        graph.views_of(root)
                    );
                    aligned.insert(root);
                    queue.push_back(root);
                }
                None => break,
            }
        }
    }
}

fn fit_error<M>(graph: &TileGraph<M>, key: TileKey, source: mvr_core::ModelError) -> OptimizeError {
    OptimizeError::Model {
        views: graph.views_of(key).iter().copied().collect(),
        source,
    }
}

/// Refits the tiles in order, each against the latest models of its neighbors.
fn update_sequential<M: TransformModel>(
    graph: &mut TileGraph<M>,
    free: &[TileKey],
) -> Result<(), OptimizeError> {
    for &key in free {
        match graph.fitted(key) {
            Ok(model) => graph.set_model(key, model),
            Err(source) => return Err(fit_error(graph, key, source)),
        }
    }
    Ok(())
}

/// Refits all tiles in parallel against the models of the previous iteration.
fn update_concurrent<M: TransformModel>(
    graph: &mut TileGraph<M>,
    free: &[TileKey],
) -> Result<(), OptimizeError> {
    let shared: &TileGraph<M> = graph;
    let models = free
        .par_iter()
        .map(|&key| {
            shared
                .fitted(key)
                .map(|model| (key, model))
                .map_err(|source| fit_error(shared, key, source))
        })
        .collect::<Result<Vec<_>, _>>()?;
    for (key, model) in models {
        graph.set_model(key, model);
    }
    Ok(())
}
