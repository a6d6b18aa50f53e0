use crate::{
    GlobalOptResult, GlobalOptimizer, IterativeConvergenceStrategy, LinkRemovalStrategy,
    OptimizeError, PointMatchCreator, RemovedLink, TileGraph,
};
use log::*;
use mvr_core::{TransformModel, ViewId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The outcome of an [`IterativeOptimizer`].
#[derive(Debug, Clone)]
pub struct IterativeResult<M> {
    /// The last optimization round.
    pub result: GlobalOptResult<M>,
    /// Links in the order they were removed.
    pub removed: Vec<RemovedLink>,
    /// Whether the last round satisfied the iterative convergence strategy.
    pub converged: bool,
}

impl<M: Clone> IterativeResult<M> {
    pub fn transforms(&self) -> BTreeMap<ViewId, Arc<M>> {
        self.result.transforms()
    }
}

/// Repeats a single optimization round and removes one link after every unacceptable round.
///
/// Iteration ends once a round is acceptable or the removal strategy finds nothing left to
/// remove. Every removal deletes an edge, so the number of rounds is bounded by the number of
/// edges.
#[derive(Debug, Clone)]
pub struct IterativeOptimizer<M, L> {
    global: GlobalOptimizer<M>,
    strategy: IterativeConvergenceStrategy,
    removal: L,
}

impl<M, L> IterativeOptimizer<M, L>
where
    M: TransformModel,
    L: LinkRemovalStrategy,
{
    /// The convergence strategy of `global` is replaced by the one of `strategy`.
    pub fn new(global: GlobalOptimizer<M>, strategy: IterativeConvergenceStrategy, removal: L) -> Self {
        Self {
            global: global.convergence(strategy.convergence),
            strategy,
            removal,
        }
    }

    pub fn global(&self) -> &GlobalOptimizer<M> {
        &self.global
    }

    pub fn optimize<C: PointMatchCreator>(
        &mut self,
        creator: &C,
    ) -> Result<IterativeResult<M>, OptimizeError> {
        let graph = self.global.build_graph(creator);
        self.solve(graph)
    }

    pub fn solve(&mut self, graph: TileGraph<M>) -> Result<IterativeResult<M>, OptimizeError> {
        let mut result = self.global.solve(graph)?;
        let mut removed = vec![];
        loop {
            if self.strategy.is_converged(&result.error) {
                info!("converged after removing {} links", removed.len());
                return Ok(IterativeResult {
                    result,
                    removed,
                    converged: true,
                });
            }
            let mut graph = result.graph;
            match self.removal.remove_link(&mut graph) {
                Some(link) => {
                    removed.push(link);
                    result = self.global.solve(graph)?;
                }
                None => {
                    warn!(
                        "no further link can be removed, mean error {} and max error {} remain",
                        result.error.mean, result.error.max
                    );
                    result.graph = graph;
                    return Ok(IterativeResult {
                        result,
                        removed,
                        converged: false,
                    });
                }
            }
        }
    }
}
