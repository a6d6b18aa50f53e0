use crate::{spatial, Matched, PairwiseError, PairwiseMatcher};
use float_ord::FloatOrd;
use log::*;
use mvr_core::sample_consensus::Model;
use mvr_core::{InterestPoint, Located, PointMatch, TransformModel};
use mvr_ransac::{Ransac, RansacParameters};
use rand::Rng;
use std::borrow::Cow;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Matches points by the shape of their neighborhoods and verifies the matches with RANSAC.
///
/// The descriptor of a point is the sorted list of distances to its `num_neighbors` nearest
/// neighbors, which does not change under rotation and translation. A point of `a` is matched to
/// the point of `b` with the closest descriptor if the second closest descriptor is at least
/// `ratio_of_distance` times further away.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct DescriptorMatcher<M> {
    pub model: M,
    pub ransac: RansacParameters,
    pub num_neighbors: usize,
    pub ratio_of_distance: f64,
}

impl<M> DescriptorMatcher<M> {
    pub fn new(model: M, ransac: RansacParameters) -> Self {
        Self {
            model,
            ransac,
            num_neighbors: 3,
            ratio_of_distance: 3.0,
        }
    }

    #[must_use]
    pub fn num_neighbors(self, num_neighbors: usize) -> Self {
        Self {
            num_neighbors,
            ..self
        }
    }

    #[must_use]
    pub fn ratio_of_distance(self, ratio_of_distance: f64) -> Self {
        Self {
            ratio_of_distance,
            ..self
        }
    }

    /// Computes the descriptor of every point that has enough neighbors.
    fn descriptors(&self, points: &[InterestPoint]) -> Vec<(usize, Vec<f64>)> {
        if points.len() <= self.num_neighbors {
            return vec![];
        }
        let tree = spatial::index(points.iter().map(Located::world));
        points
            .iter()
            .enumerate()
            .map(|(ix, point)| {
                let query = spatial::coordinates(point.world());
                let distances = tree
                    .nearest_neighbor_iter(&query)
                    .filter(|neighbor| neighbor.index != ix)
                    .take(self.num_neighbors)
                    .map(|neighbor| euclidean(&neighbor.position, &query))
                    .collect();
                (ix, distances)
            })
            .collect()
    }

    /// Pairs every descriptor of `a` with its nearest descriptor of `b` if it passes the ratio test.
    fn candidates(&self, a: &[InterestPoint], b: &[InterestPoint]) -> Vec<PointMatch<InterestPoint>> {
        let descriptors_b = self.descriptors(b);
        if descriptors_b.len() < 2 {
            return vec![];
        }
        self.descriptors(a)
            .into_iter()
            .filter_map(|(ia, da)| {
                let (best, second) = nearest_two(
                    descriptors_b
                        .iter()
                        .map(|(ib, db)| (euclidean(&da, db), *ib)),
                );
                let (best, ib) = best?;
                (best * self.ratio_of_distance < second)
                    .then(|| PointMatch::new(a[ia], b[ib]))
            })
            .collect()
    }
}

/// The closest entry and the distance of the runner-up, in one pass.
fn nearest_two(ranked: impl Iterator<Item = (f64, usize)>) -> (Option<(f64, usize)>, f64) {
    let mut best: Option<(f64, usize)> = None;
    let mut second = f64::INFINITY;
    for (distance, ix) in ranked {
        match best {
            Some((closest, _)) if FloatOrd(distance) >= FloatOrd(closest) => {
                if FloatOrd(distance) < FloatOrd(second) {
                    second = distance;
                }
            }
            _ => {
                if let Some((closest, _)) = best {
                    second = closest;
                }
                best = Some((distance, ix));
            }
        }
    }
    (best, second)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl<M> PairwiseMatcher for DescriptorMatcher<M>
where
    M: TransformModel + Model<PointMatch<InterestPoint>>,
{
    const MUTATES_POINTS: bool = false;

    fn compute<R: Rng>(
        &self,
        a: Cow<'_, [InterestPoint]>,
        b: Cow<'_, [InterestPoint]>,
        rng: &mut R,
    ) -> Result<Matched, PairwiseError> {
        let candidates = self.candidates(&a, &b);
        trace!("{} descriptor candidates", candidates.len());

        // RANSAC fits `a.local` onto `b.world`, so both sides move into world space.
        let world: Vec<PointMatch<InterestPoint>> = candidates
            .iter()
            .map(|m| PointMatch::with_weight(m.a.world_as_local(), m.b.world_as_local(), m.weight))
            .collect();
        let sets = Ransac::new(self.ransac, rng)
            .estimate(&self.model, &world)
            .map_err(|source| PairwiseError::Ransac {
                source,
                candidates: candidates.len(),
            })?;

        let total: usize = sets.iter().map(|set| set.inliers.len()).sum();
        let error = sets
            .iter()
            .map(|set| set.model.cost() * set.inliers.len() as f64)
            .sum::<f64>()
            / total as f64;
        let inliers = sets
            .into_iter()
            .map(|set| set.inliers.into_iter().map(|ix| candidates[ix]).collect())
            .collect();
        Ok(Matched {
            candidates,
            inliers,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvr_core::nalgebra::Point3;

    #[test]
    fn descriptors_ignore_the_point_itself() {
        let points: Vec<_> = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 4.0]]
            .iter()
            .enumerate()
            .map(|(id, &p)| InterestPoint::new(id, Point3::from(p)))
            .collect();
        let matcher = DescriptorMatcher::new(
            mvr_core::TranslationModel::default(),
            RansacParameters::default(),
        );
        let descriptors = matcher.descriptors(&points);
        assert_eq!(descriptors.len(), 4);
        assert_eq!(descriptors[0].1, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn too_few_points_have_no_descriptors() {
        let points = vec![InterestPoint::new(0, Point3::origin()); 3];
        let matcher = DescriptorMatcher::new(
            mvr_core::TranslationModel::default(),
            RansacParameters::default(),
        );
        assert!(matcher.descriptors(&points).is_empty());
    }

    #[test]
    fn runner_up_tracks_the_second_smallest_distance() {
        let ranked = [(4.0, 0), (1.0, 1), (3.0, 2), (0.5, 3), (2.0, 4)];
        assert_eq!(nearest_two(ranked.into_iter()), (Some((0.5, 3)), 1.0));
        assert_eq!(nearest_two([(2.0, 7)].into_iter()), (Some((2.0, 7)), f64::INFINITY));
        assert_eq!(nearest_two(std::iter::empty()), (None, f64::INFINITY));
    }

    fn shape(offset: [f64; 3], first_id: usize) -> Vec<InterestPoint> {
        [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 2.5, 0.0],
            [0.0, 0.0, 4.5],
            [3.0, 3.5, 0.0],
            [6.0, 0.0, 7.0],
        ]
        .iter()
        .enumerate()
        .map(|(ix, p)| {
            let p = Point3::new(p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]);
            InterestPoint::new(first_id + ix, p)
        })
        .collect()
    }

    #[test]
    fn candidates_pair_points_with_identical_neighborhoods() {
        let matcher = DescriptorMatcher::new(
            mvr_core::TranslationModel::default(),
            RansacParameters::default(),
        );
        let a = shape([0.0; 3], 0);
        let b = shape([20.0, -5.0, 3.0], 100);
        let candidates = matcher.candidates(&a, &b);
        assert!(!candidates.is_empty());
        for m in &candidates {
            assert_eq!(m.a.id + 100, m.b.id);
        }
    }

    #[test]
    fn repeated_neighborhoods_fail_the_ratio_test() {
        let matcher = DescriptorMatcher::new(
            mvr_core::TranslationModel::default(),
            RansacParameters::default(),
        );
        let a = shape([0.0; 3], 0);
        let mut b = shape([0.0; 3], 100);
        b.extend(shape([1000.0, 0.0, 0.0], 200));
        assert!(matcher.candidates(&a, &b).is_empty());
    }
}
