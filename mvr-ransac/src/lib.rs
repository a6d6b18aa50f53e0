//! # RANSAC for point matches
//!
//! [`Ransac`] fits a [`TransformModel`] to a pool of candidate [`PointMatch`]es that is
//! contaminated with outliers. A run proceeds in three stages:
//!
//! 1. Minimal random samples are fit and every candidate closer than `max_epsilon` to the
//!    model counts as an inlier. Samples whose inlier set is large enough are refit on their
//!    inliers until the set stops growing. The model with the largest inlier ratio wins.
//! 2. The winning inlier set passes a consistency filter that repeatedly refits and drops every
//!    match whose residual exceeds `max_trust` times the median residual.
//! 3. If the filter leaves too few matches, every point that takes part in more than one
//!    candidate is removed and the first two stages are retried once.
//!
//! In multi-consensus mode the stages are repeated on whatever candidates remain after each
//! inlier set is removed, which yields one [`ConsensusSet`] per independent motion.

use float_ord::FloatOrd;
use log::*;
use mvr_core::sample_consensus::Model;
use mvr_core::{nalgebra::Point3, Located, PointMatch, TransformModel, WeightedMatch};
use rand::{seq::index, Rng};
use std::collections::HashMap;
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Filter thresholds never drop below this fraction of `max_epsilon`.
///
/// Matches that fit exactly have residuals at the level of rounding noise, and the median of
/// rounding noise is not a meaningful scale.
const FILTER_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RansacError {
    /// Fewer candidates than the model needs for a single fit.
    #[error("not enough candidates to fit the model: found {found}, required {required}")]
    NotEnoughData { required: usize, found: usize },
    /// No sample produced a model with enough inliers.
    #[error("no model found")]
    NoModelFound,
}

/// Parameters of a [`Ransac`] run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(default))]
pub struct RansacParameters {
    /// The largest residual an inlier may have, in the units of the input coordinates.
    pub max_epsilon: f64,
    /// The smallest fraction of candidates that must be inliers.
    pub min_inlier_ratio: f64,
    /// The smallest number of inliers to accept.
    ///
    /// `0` means the minimum of the model times `min_inlier_factor`. With the default factor of 3
    /// an affine model needs at least 12 inliers and a rigid one 9, so smaller overlaps must set
    /// this explicitly.
    pub min_num_matches: usize,
    pub min_inlier_factor: usize,
    pub num_iterations: usize,
    /// Extract every consistent inlier set instead of only the best one.
    pub multi_consensus: bool,
    /// Residuals above `max_trust` times the median are removed by the consistency filter.
    pub max_trust: f64,
}

impl Default for RansacParameters {
    fn default() -> Self {
        Self {
            max_epsilon: 5.0,
            min_inlier_ratio: 0.1,
            min_num_matches: 0,
            min_inlier_factor: 3,
            num_iterations: 10_000,
            multi_consensus: false,
            max_trust: 3.0,
        }
    }
}

impl RansacParameters {
    #[must_use]
    pub fn max_epsilon(self, max_epsilon: f64) -> Self {
        Self {
            max_epsilon,
            ..self
        }
    }

    #[must_use]
    pub fn min_inlier_ratio(self, min_inlier_ratio: f64) -> Self {
        Self {
            min_inlier_ratio,
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
    pub fn min_inlier_factor(self, min_inlier_factor: usize) -> Self {
        Self {
            min_inlier_factor,
            ..self
        }
    }

    #[must_use]
    pub fn num_iterations(self, num_iterations: usize) -> Self {
        Self {
            num_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn multi_consensus(self, multi_consensus: bool) -> Self {
        Self {
            multi_consensus,
            ..self
        }
    }

    #[must_use]
    pub fn max_trust(self, max_trust: f64) -> Self {
        Self { max_trust, ..self }
    }

    /// The number of inliers a model with the given minimum must gather to be accepted.
    pub fn required_inliers(&self, model_minimum: usize) -> usize {
        if self.min_num_matches == 0 {
            model_minimum * self.min_inlier_factor
        } else {
            self.min_num_matches.max(model_minimum)
        }
    }
}

/// A fitted model and the candidate indices that support it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSet<M> {
    /// The model fit to all inliers. Its cost is the mean inlier residual.
    pub model: M,
    /// Indices into the candidate slice, in ascending order.
    pub inliers: Vec<usize>,
}

/// A RANSAC estimator that owns its parameters and its random number generator.
///
/// Reusing one estimator for several pools continues its random sequence, so seeding the
/// generator once per pool keeps results reproducible.
#[derive(Debug, Clone)]
pub struct Ransac<R> {
    parameters: RansacParameters,
    rng: R,
}

impl<R: Rng> Ransac<R> {
    pub fn new(parameters: RansacParameters, rng: R) -> Self {
        Self { parameters, rng }
    }

    pub fn parameters(&self) -> &RansacParameters {
        &self.parameters
    }

    /// Runs either [`Ransac::consensus`] or [`Ransac::multi_consensus`] depending on the parameters.
    pub fn estimate<M, P>(
        &mut self,
        prototype: &M,
        candidates: &[PointMatch<P>],
    ) -> Result<Vec<ConsensusSet<M>>, RansacError>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        if self.parameters.multi_consensus {
            self.multi_consensus(prototype, candidates)
        } else {
            self.consensus(prototype, candidates).map(|set| vec![set])
        }
    }

    /// Finds the single best consensus set among all candidates.
    pub fn consensus<M, P>(
        &mut self,
        prototype: &M,
        candidates: &[PointMatch<P>],
    ) -> Result<ConsensusSet<M>, RansacError>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        let pool: Vec<usize> = (0..candidates.len()).collect();
        self.consensus_in(prototype, candidates, &pool)
    }

    /// Extracts disjoint consensus sets until no further model is accepted.
    ///
    /// Fails only if not even the first set can be found.
    pub fn multi_consensus<M, P>(
        &mut self,
        prototype: &M,
        candidates: &[PointMatch<P>],
    ) -> Result<Vec<ConsensusSet<M>>, RansacError>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        let mut pool: Vec<usize> = (0..candidates.len()).collect();
        let mut sets = vec![];
        loop {
            match self.consensus_in(prototype, candidates, &pool) {
                Ok(set) => {
                    pool.retain(|ix| set.inliers.binary_search(ix).is_err());
                    debug!(
                        "consensus set {} has {} inliers, {} candidates remain",
                        sets.len(),
                        set.inliers.len(),
                        pool.len()
                    );
                    sets.push(set);
                }
                Err(e) if sets.is_empty() => return Err(e),
                Err(_) => break,
            }
        }
        Ok(sets)
    }

    fn consensus_in<M, P>(
        &mut self,
        prototype: &M,
        candidates: &[PointMatch<P>],
        pool: &[usize],
    ) -> Result<ConsensusSet<M>, RansacError>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        let minimum = prototype.min_num_matches();
        if pool.len() < minimum {
            return Err(RansacError::NotEnoughData {
                required: minimum,
                found: pool.len(),
            });
        }
        let required = self.parameters.required_inliers(minimum);

        let (model, inliers) = self
            .sample(prototype, candidates, pool, required)
            .ok_or(RansacError::NoModelFound)?;
        if let Some(set) = self.filter(model, candidates, inliers, required) {
            return Ok(set);
        }

        let unique = remove_collisions(candidates, pool);
        if unique.len() == pool.len() || unique.len() < minimum {
            return Err(RansacError::NoModelFound);
        }
        debug!(
            "retrying without {} colliding candidates",
            pool.len() - unique.len()
        );
        let (model, inliers) = self
            .sample(prototype, candidates, &unique, required)
            .ok_or(RansacError::NoModelFound)?;
        self.filter(model, candidates, inliers, required)
            .ok_or(RansacError::NoModelFound)
    }

    /// The sample, test and refit loop. Returns the model with the lowest cost.
    fn sample<M, P>(
        &mut self,
        prototype: &M,
        candidates: &[PointMatch<P>],
        pool: &[usize],
        required: usize,
    ) -> Option<(M, Vec<usize>)>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        let minimum = prototype.min_num_matches();
        let mut best: Option<(M, Vec<usize>)> = None;
        let mut sample = Vec::with_capacity(minimum);
        for _ in 0..self.parameters.num_iterations {
            sample.clear();
            sample.extend(
                index::sample(&mut self.rng, pool.len(), minimum)
                    .into_iter()
                    .map(|ix| candidates[pool[ix]].weighted()),
            );
            let mut model = prototype.clone();
            if model.fit(&sample).is_err() {
                continue;
            }
            let mut inliers = self.inliers(&model, candidates, pool);
            if !self.acceptable(inliers.len(), pool.len(), required) {
                continue;
            }
            loop {
                let count = inliers.len();
                if model.fit(&weighted(candidates, &inliers)).is_err() {
                    break;
                }
                inliers = self.inliers(&model, candidates, pool);
                if inliers.len() <= count {
                    break;
                }
            }
            if !self.acceptable(inliers.len(), pool.len(), required) {
                continue;
            }
            model.set_cost(1.0 - inliers.len() as f64 / pool.len() as f64);
            if best
                .as_ref()
                .map_or(true, |(best, _)| model.cost() < best.cost())
            {
                trace!(
                    "new best model with {} of {} inliers",
                    inliers.len(),
                    pool.len()
                );
                best = Some((model, inliers));
            }
        }
        best
    }

    /// The consistency filter.
    fn filter<M, P>(
        &self,
        mut model: M,
        candidates: &[PointMatch<P>],
        mut inliers: Vec<usize>,
        required: usize,
    ) -> Option<ConsensusSet<M>>
    where
        M: TransformModel + Model<PointMatch<P>>,
        P: Located,
    {
        let floor = self.parameters.max_epsilon * FILTER_FLOOR;
        loop {
            let count = inliers.len();
            model.fit(&weighted(candidates, &inliers)).ok()?;
            let residuals: Vec<f64> = inliers
                .iter()
                .map(|&ix| model.residual(&candidates[ix]))
                .collect();
            let threshold = (median(&residuals) * self.parameters.max_trust).max(floor);
            let (kept, kept_residuals): (Vec<usize>, Vec<f64>) = inliers
                .iter()
                .zip(&residuals)
                .filter(|&(_, &residual)| residual <= threshold)
                .map(|(&ix, &residual)| (ix, residual))
                .unzip();
            inliers = kept;
            if inliers.len() < required {
                trace!(
                    "consistency filter left {} of {} required inliers",
                    inliers.len(),
                    required
                );
                return None;
            }
            if inliers.len() == count {
                let mean = kept_residuals.iter().sum::<f64>() / kept_residuals.len() as f64;
                model.set_cost(mean);
                return Some(ConsensusSet { model, inliers });
            }
        }
    }

    fn inliers<M, P>(&self, model: &M, candidates: &[PointMatch<P>], pool: &[usize]) -> Vec<usize>
    where
        M: Model<PointMatch<P>>,
    {
        let mut inliers: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|&ix| model.residual(&candidates[ix]) < self.parameters.max_epsilon)
            .collect();
        inliers.sort_unstable();
        inliers
    }

    fn acceptable(&self, inliers: usize, total: usize, required: usize) -> bool {
        inliers >= required && inliers as f64 / total as f64 >= self.parameters.min_inlier_ratio
    }
}

fn weighted<P: Located>(candidates: &[PointMatch<P>], indices: &[usize]) -> Vec<WeightedMatch> {
    indices.iter().map(|&ix| candidates[ix].weighted()).collect()
}

/// The median, averaging the two middle values for an even count.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by_key(|&v| FloatOrd(v));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn coordinate_key(point: Point3<f64>) -> [u64; 3] {
    [point.x.to_bits(), point.y.to_bits(), point.z.to_bits()]
}

/// Keeps only the candidates whose source and target both occur in no other candidate of the pool.
///
/// Points are identified by their exact coordinates.
pub fn remove_collisions<P: Located>(candidates: &[PointMatch<P>], pool: &[usize]) -> Vec<usize> {
    let mut sources: HashMap<[u64; 3], usize> = HashMap::new();
    let mut targets: HashMap<[u64; 3], usize> = HashMap::new();
    for &ix in pool {
        *sources
            .entry(coordinate_key(candidates[ix].a.local()))
            .or_default() += 1;
        *targets
            .entry(coordinate_key(candidates[ix].b.world()))
            .or_default() += 1;
    }
    pool.iter()
        .copied()
        .filter(|&ix| {
            sources.get(&coordinate_key(candidates[ix].a.local())) == Some(&1)
                && targets.get(&coordinate_key(candidates[ix].b.world())) == Some(&1)
        })
        .collect()
}
