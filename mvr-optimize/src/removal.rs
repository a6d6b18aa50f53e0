use crate::{TileGraph, TileKey};
use log::*;
use mvr_core::{TransformModel, ViewId};
use std::collections::BTreeSet;

/// A link that was removed from a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedLink {
    pub tiles: (TileKey, TileKey),
    pub views: (BTreeSet<ViewId>, BTreeSet<ViewId>),
    /// The weighted mean residual of the link when it was removed.
    pub error: f64,
}

/// Picks the link to remove when an optimization does not converge.
pub trait LinkRemovalStrategy {
    /// Removes one link from the graph, or returns `None` if no link can be removed.
    fn remove_link<M: TransformModel>(&mut self, graph: &mut TileGraph<M>) -> Option<RemovedLink>;
}

/// Removes the link with the largest weighted mean residual.
///
/// A link is only removed if both of its tiles keep at least one other neighbor, so no tile is
/// ever left without neighbors. Removing a bridge still splits its component in two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxErrorLinkRemoval;

impl LinkRemovalStrategy for MaxErrorLinkRemoval {
    fn remove_link<M: TransformModel>(&mut self, graph: &mut TileGraph<M>) -> Option<RemovedLink> {
        let (a, b, error) = graph
            .edges()
            .into_iter()
            .filter(|&(a, b)| {
                graph.tile(a).neighbors().len() > 1 && graph.tile(b).neighbors().len() > 1
            })
            .filter_map(|(a, b)| {
                let forward = graph.match_error(a, Some(b))?;
                let backward = graph.match_error(b, Some(a))?;
                Some((a, b, forward.max(backward)))
            })
            .fold(None, |worst: Option<(TileKey, TileKey, f64)>, edge| match worst {
                Some(worst) if worst.2 >= edge.2 => Some(worst),
                _ => Some(edge),
            })?;
        let views = (graph.views_of(a).clone(), graph.views_of(b).clone());
        graph.disconnect(a, b);
        info!(
            "removed link between tiles {:?} and {:?} with error {}",
            views.0, views.1, error
        );
        Some(RemovedLink {
            tiles: (a, b),
            views,
            error,
        })
    }
}
