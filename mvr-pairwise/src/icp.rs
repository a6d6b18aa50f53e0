use crate::{spatial, Matched, PairwiseError, PairwiseMatcher};
use log::*;
use mvr_core::nalgebra::Point3;
use mvr_core::{InterestPoint, Located, PointMatch, TransformModel, WeightedMatch};
use rand::Rng;
use std::borrow::Cow;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Iterative closest point matching for views that are already roughly aligned.
///
/// Each iteration pairs every point of `a` with the closest point of `b` within `max_distance`,
/// refits the model to those pairs and moves the working copy of `a` accordingly. Iteration
/// stops once the mean pair distance improves by less than `convergence`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IcpMatcher<M> {
    pub model: M,
    pub max_distance: f64,
    pub max_iterations: usize,
    /// `0` means three times the minimum of the model.
    pub min_num_matches: usize,
    pub convergence: f64,
}

impl<M: TransformModel> IcpMatcher<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_distance: 5.0,
            max_iterations: 100,
            min_num_matches: 0,
            convergence: 1e-4,
        }
    }

    #[must_use]
    pub fn max_distance(self, max_distance: f64) -> Self {
        Self {
            max_distance,
            ..self
        }
    }

    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn min_num_matches(self, min_num_matches: usize) -> Self {
        Self {
            min_num_matches,
            ..self
        }
    }

    #[must_use]
    pub fn convergence(self, convergence: f64) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    fn required(&self) -> usize {
        if self.min_num_matches == 0 {
            3 * self.model.min_num_matches()
        } else {
            self.min_num_matches.max(self.model.min_num_matches())
        }
    }
}

impl<M: TransformModel> PairwiseMatcher for IcpMatcher<M> {
    const MUTATES_POINTS: bool = true;

    fn compute<R: Rng>(
        &self,
        a: Cow<'_, [InterestPoint]>,
        b: Cow<'_, [InterestPoint]>,
        _rng: &mut R,
    ) -> Result<Matched, PairwiseError> {
        let mut moving = a.into_owned();
        let initial: Vec<Point3<f64>> = moving.iter().map(Located::world).collect();
        let tree = spatial::index(b.iter().map(Located::world));
        let max_distance_2 = self.max_distance * self.max_distance;
        let required = self.required();

        let closest = |moving: &[InterestPoint]| -> Vec<(usize, usize, f64)> {
            moving
                .iter()
                .enumerate()
                .filter_map(|(ia, point)| {
                    let query = spatial::coordinates(point.world());
                    let nearest = tree.nearest_neighbor(&query)?;
                    let distance_2 = rstar::PointDistance::distance_2(nearest, &query);
                    (distance_2 <= max_distance_2).then(|| (ia, nearest.index, distance_2.sqrt()))
                })
                .collect()
        };

        let mut model = self.model.clone();
        let mut previous = f64::INFINITY;
        let mut pairs = closest(&moving);
        for iteration in 0..self.max_iterations {
            if pairs.len() < required {
                return Err(PairwiseError::TooFewMatches {
                    required,
                    found: pairs.len(),
                });
            }
            let matches: Vec<WeightedMatch> = pairs
                .iter()
                .map(|&(ia, ib, _)| WeightedMatch(initial[ia], b[ib].world(), 1.0))
                .collect();
            if let Err(e) = model.fit(&matches) {
                debug!("ICP stopped at iteration {}: {}", iteration, e);
                break;
            }
            for (point, &origin) in moving.iter_mut().zip(&initial) {
                point.world = model.apply(origin);
            }
            pairs = closest(&moving);
            let error = mean_distance(&pairs);
            trace!("ICP iteration {} has {} pairs, error {}", iteration, pairs.len(), error);
            if (previous - error).abs() < self.convergence {
                break;
            }
            previous = error;
        }
        if pairs.len() < required {
            return Err(PairwiseError::TooFewMatches {
                required,
                found: pairs.len(),
            });
        }

        let inliers: Vec<PointMatch<InterestPoint>> = pairs
            .iter()
            .map(|&(ia, ib, _)| {
                let point = InterestPoint {
                    world: initial[ia],
                    ..moving[ia]
                };
                PointMatch::new(point, b[ib])
            })
            .collect();
        Ok(Matched {
            candidates: inliers.clone(),
            inliers: vec![inliers],
            error: mean_distance(&pairs),
        })
    }
}

fn mean_distance(pairs: &[(usize, usize, f64)]) -> f64 {
    if pairs.is_empty() {
        return f64::INFINITY;
    }
    pairs.iter().map(|&(_, _, d)| d).sum::<f64>() / pairs.len() as f64
}
