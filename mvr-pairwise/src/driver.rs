use crate::{Label, PairwiseError, PairwiseMatcher, PairwiseResult};
use log::*;
use mvr_core::{InterestPoint, TransformModel, ViewId};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Instant;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The interest points of every view, grouped by label.
pub type ViewPoints = BTreeMap<ViewId, BTreeMap<Label, Vec<InterestPoint>>>;

/// Which labels of two views are matched against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum LabelPairing {
    /// Every label of the first view against every label of the second.
    All,
    /// Only labels with the same name.
    Equal,
}

impl Default for LabelPairing {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(default))]
pub struct PairwiseSettings {
    pub labels: LabelPairing,
    /// The size of a dedicated pool, or `None` for the global rayon pool.
    pub num_threads: Option<usize>,
    /// Task `i` is seeded with `seed + i`.
    pub seed: u64,
}

impl Default for PairwiseSettings {
    fn default() -> Self {
        Self {
            labels: LabelPairing::All,
            num_threads: None,
            seed: 0,
        }
    }
}

impl PairwiseSettings {
    #[must_use]
    pub fn labels(self, labels: LabelPairing) -> Self {
        Self { labels, ..self }
    }

    #[must_use]
    pub fn num_threads(self, num_threads: Option<usize>) -> Self {
        Self {
            num_threads,
            ..self
        }
    }

    #[must_use]
    pub fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

struct Task<'a> {
    views: (ViewId, ViewId),
    labels: (&'a Label, &'a Label),
    a: &'a [InterestPoint],
    b: &'a [InterestPoint],
}

/// Builds one task per view pair and label combination, ordered by views and then labels.
fn tasks<'a>(
    points: &'a ViewPoints,
    pairs: &[(ViewId, ViewId)],
    pairing: LabelPairing,
) -> Vec<Task<'a>> {
    let mut pairs = pairs.to_vec();
    pairs.sort_unstable();
    pairs.dedup();
    let mut tasks = vec![];
    for (va, vb) in pairs {
        let (labels_a, labels_b) = match (points.get(&va), points.get(&vb)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                warn!("skipping pair {} <-> {} without interest points", va, vb);
                continue;
            }
        };
        for (la, a) in labels_a {
            for (lb, b) in labels_b {
                if pairing == LabelPairing::Equal && la != lb {
                    continue;
                }
                tasks.push(Task {
                    views: (va, vb),
                    labels: (la, lb),
                    a,
                    b,
                });
            }
        }
    }
    tasks
}

fn run_task<Mt: PairwiseMatcher>(matcher: &Mt, task: &Task<'_>, seed: u64) -> PairwiseResult<InterestPoint> {
    let start = Instant::now();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let (a, b) = if Mt::MUTATES_POINTS {
        (Cow::Owned(task.a.to_vec()), Cow::Owned(task.b.to_vec()))
    } else {
        (Cow::Borrowed(task.a), Cow::Borrowed(task.b))
    };
    let labels = (task.labels.0.clone(), task.labels.1.clone());
    let mut result = match matcher.compute(a, b, &mut rng) {
        Ok(matched) => {
            let mut result = PairwiseResult::new(
                task.views,
                labels,
                matched.candidates,
                matched.inliers,
                matched.error,
            );
            result.description = format!(
                "{}: {}/{} inliers, error {:.4}",
                result.description,
                result.num_inliers(),
                result.candidates.len(),
                result.error
            );
            debug!("{}", result.description);
            result
        }
        Err(e) => {
            let result = PairwiseResult::failed(task.views, labels, e);
            info!("{}", result.description);
            result
        }
    };
    result.elapsed = start.elapsed();
    result
}

/// Matches every requested view pair for every label combination.
///
/// Returns after all tasks have finished, with results ordered by views and then labels. A task
/// that fails contributes a result without inliers. Only failing to build a dedicated thread
/// pool is an error.
pub fn compute_pairwise<Mt: PairwiseMatcher>(
    points: &ViewPoints,
    pairs: &[(ViewId, ViewId)],
    matcher: &Mt,
    settings: &PairwiseSettings,
) -> Result<Vec<PairwiseResult<InterestPoint>>, PairwiseError> {
    let tasks = tasks(points, pairs, settings.labels);
    info!("scheduling {} pairwise matching tasks", tasks.len());

    let run = || -> Vec<PairwiseResult<InterestPoint>> {
        tasks
            .par_iter()
            .enumerate()
            .map(|(ix, task)| run_task(matcher, task, settings.seed.wrapping_add(ix as u64)))
            .collect()
    };
    let results = match settings.num_threads {
        Some(num_threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?
            .install(run),
        None => run(),
    };

    let succeeded = results.iter().filter(|result| !result.is_empty()).count();
    info!(
        "{} of {} pairwise tasks found correspondences",
        succeeded,
        results.len()
    );
    Ok(results)
}

/// Moves every point into world space using the transform of its view.
///
/// Views without a transform keep their points as they are.
pub fn transform_points<M: TransformModel>(
    points: &ViewPoints,
    transforms: &BTreeMap<ViewId, M>,
) -> ViewPoints {
    points
        .iter()
        .map(|(view, labels)| {
            let labels = match transforms.get(view) {
                Some(model) => labels
                    .iter()
                    .map(|(label, points)| {
                        let points = points.iter().map(|p| p.transformed(model)).collect();
                        (label.clone(), points)
                    })
                    .collect(),
                None => labels.clone(),
            };
            (*view, labels)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use mvr_core::nalgebra::Point3;

    fn points() -> ViewPoints {
        let p = vec![InterestPoint::new(0, Point3::origin())];
        btreemap! {
            ViewId::new(0, 0) => btreemap! { "beads".to_owned() => p.clone(), "nuclei".to_owned() => p.clone() },
            ViewId::new(0, 1) => btreemap! { "beads".to_owned() => p.clone(), "nuclei".to_owned() => p },
        }
    }

    #[test]
    fn all_label_combinations_are_scheduled() {
        let points = points();
        let pairs = [(ViewId::new(0, 0), ViewId::new(0, 1))];
        assert_eq!(tasks(&points, &pairs, LabelPairing::All).len(), 4);
        let equal = tasks(&points, &pairs, LabelPairing::Equal);
        assert_eq!(equal.len(), 2);
        assert!(equal.iter().all(|task| task.labels.0 == task.labels.1));
    }

    #[test]
    fn unknown_views_are_skipped() {
        let points = points();
        let pairs = [(ViewId::new(0, 0), ViewId::new(5, 5))];
        assert!(tasks(&points, &pairs, LabelPairing::All).is_empty());
    }
}
