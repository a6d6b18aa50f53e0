use crate::{
    ConvergenceStrategy, ErrorStatistics, GlobalOptResult, GlobalOptimizer, IterativeOptimizer,
    IterativeResult, LinkRemovalStrategy, OptimizeError, PointMatchCreator, TileGraph,
    WeakLinkFactory,
};
use log::*;
use mvr_core::{Group, TransformModel, ViewId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The outcome of a [`TwoRoundOptimizer`].
#[derive(Debug, Clone)]
pub struct TwoRoundResult<M> {
    pub round_one: IterativeResult<M>,
    /// Absent if the first round left a single component or no weak link joined the components.
    pub round_two: Option<GlobalOptResult<M>>,
    /// The views of every connected component after the first round.
    pub components: Vec<Group<ViewId>>,
    transforms: BTreeMap<ViewId, Arc<M>>,
}

impl<M> TwoRoundResult<M> {
    /// The final transform of every view, first round applied first.
    pub fn transforms(&self) -> &BTreeMap<ViewId, Arc<M>> {
        &self.transforms
    }

    pub fn into_transforms(self) -> BTreeMap<ViewId, Arc<M>> {
        self.transforms
    }
}

/// Registers a graph that may fall apart into several connected components.
///
/// The first round is an [`IterativeOptimizer`]. If it has no connected tiles at all, every tile
/// keeps its initial model and forms a component of its own. If more than one connected component
/// remains, every component becomes a group, the [`WeakLinkFactory`] connects the groups and a
/// second round aligns them with an unconstrained convergence strategy. The final transform of a
/// view applies its first round transform and then the second round transform of its component.
#[derive(Debug, Clone)]
pub struct TwoRoundOptimizer<M, L, W> {
    iterative: IterativeOptimizer<M, L>,
    weak: W,
}

impl<M, L, W> TwoRoundOptimizer<M, L, W>
where
    M: TransformModel,
    L: LinkRemovalStrategy,
    W: WeakLinkFactory<M>,
{
    pub fn new(iterative: IterativeOptimizer<M, L>, weak: W) -> Self {
        Self { iterative, weak }
    }

    pub fn optimize<C: PointMatchCreator>(
        &mut self,
        creator: &C,
    ) -> Result<TwoRoundResult<M>, OptimizeError> {
        let graph = self.iterative.global().build_graph(creator);
        let round_one = match self.iterative.solve(graph.clone()) {
            Ok(round_one) => round_one,
            Err(OptimizeError::Disconnected) => {
                warn!("no strong link connects any tiles, relying on weak links alone");
                unsolved(graph)
            }
            Err(e) => return Err(e),
        };
        let graph = &round_one.result.graph;
        let components: Vec<Group<ViewId>> = graph
            .connected_components()
            .into_iter()
            .map(|keys| {
                keys.into_iter()
                    .flat_map(|key| graph.views_of(key).iter().copied())
                    .collect()
            })
            .collect();
        let first = round_one.transforms();
        if components.len() <= 1 {
            info!("the first round left a single component");
            return Ok(TwoRoundResult {
                round_one,
                round_two: None,
                components,
                transforms: first,
            });
        }

        info!(
            "the first round left {} components, joining them with weak links",
            components.len()
        );
        let creator = self.weak.create(&components, &first);
        let global = self.iterative.global();
        let second = GlobalOptimizer::new(
            global.prototype().clone(),
            ConvergenceStrategy::unconstrained(),
        )
        .groups(components.iter().cloned())
        .fixed_views(global.fixed().iter().copied());
        let round_two = match second.optimize(&creator) {
            Ok(round_two) => round_two,
            Err(OptimizeError::Disconnected) => {
                warn!("no weak link joins the components, keeping the first round");
                return Ok(TwoRoundResult {
                    round_one,
                    round_two: None,
                    components,
                    transforms: first,
                });
            }
            Err(e) => return Err(e),
        };

        let mut transforms = BTreeMap::new();
        for (_, tile) in round_one.result.graph.tiles() {
            let second_tile = tile
                .views()
                .iter()
                .next()
                .and_then(|&view| round_two.graph.tile_of(view));
            let model = match second_tile {
                Some(key) => tile.model.preconcatenated(round_two.graph.model(key)),
                None => tile.model.clone(),
            };
            let model = Arc::new(model);
            for &view in tile.views() {
                transforms.insert(view, model.clone());
            }
        }
        Ok(TwoRoundResult {
            round_one,
            round_two: Some(round_two),
            components,
            transforms,
        })
    }
}

/// Stands in for a first round that had nothing to optimize. Every tile keeps its initial model.
fn unsolved<M>(graph: TileGraph<M>) -> IterativeResult<M> {
    let excluded = graph
        .keys()
        .into_iter()
        .filter(|&key| !graph.is_fixed(key))
        .collect();
    IterativeResult {
        result: GlobalOptResult {
            graph,
            error: ErrorStatistics::default(),
            iterations: 0,
            converged: false,
            excluded,
        },
        removed: vec![],
        converged: false,
    }
}
