use approx::assert_relative_eq;
use maplit::btreemap;
use mvr_core::nalgebra::{Point3, Vector3};
use mvr_core::{InterestPoint, TransformModel, TranslationModel, ViewId};
use mvr_pairwise::{
    compute_pairwise, transform_points, CorrespondenceStore, DescriptorMatcher, IcpMatcher,
    LabelPairing, PairwiseSettings, ViewPoints,
};
use mvr_ransac::RansacParameters;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::BTreeMap;

fn beads(seed: u64, n: usize) -> Vec<Point3<f64>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(0.0..200.0),
                rng.gen_range(0.0..200.0),
                rng.gen_range(0.0..200.0),
            )
        })
        .collect()
}

fn view(points: &[Point3<f64>], offset: Vector3<f64>) -> Vec<InterestPoint> {
    points
        .iter()
        .enumerate()
        .map(|(id, &p)| InterestPoint::new(id, p - offset))
        .collect()
}

fn scene() -> ViewPoints {
    let points = beads(0, 60);
    let noise = beads(1, 60);
    btreemap! {
        ViewId::new(0, 0) => btreemap! {
            "beads".to_owned() => view(&points, Vector3::zeros()),
            "noise".to_owned() => view(&noise, Vector3::zeros()),
        },
        ViewId::new(0, 1) => btreemap! {
            "beads".to_owned() => view(&points, Vector3::new(20.0, -5.0, 3.0)),
        },
        ViewId::new(0, 2) => btreemap! {
            "beads".to_owned() => view(&beads(2, 60), Vector3::zeros()),
        },
    }
}

#[test]
fn descriptor_matching_recovers_the_shift() {
    let points = scene();
    let pairs = [(ViewId::new(0, 0), ViewId::new(0, 1))];
    let matcher = DescriptorMatcher::new(
        TranslationModel::default(),
        RansacParameters::default().max_epsilon(1.0),
    );
    let settings = PairwiseSettings::default()
        .labels(LabelPairing::Equal)
        .num_threads(Some(2));
    let mut results = compute_pairwise(&points, &pairs, &matcher, &settings).unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.num_inliers() >= 30, "{}", result.description);
    for m in &result.inliers()[0] {
        assert_eq!(m.a.id, m.b.id);
        assert_relative_eq!(
            m.a.local - m.b.local,
            Vector3::new(20.0, -5.0, 3.0),
            epsilon = 1e-9
        );
    }

    let mut store = CorrespondenceStore::new();
    let moved = store.insert_all(results.iter_mut());
    assert!(moved >= 30);
    assert_eq!(store.num_matches(), moved);
    assert!(results[0].inliers().is_empty());
}

#[test]
fn failed_pairs_do_not_abort_their_siblings() {
    let points = scene();
    let pairs = [
        (ViewId::new(0, 0), ViewId::new(0, 2)),
        (ViewId::new(0, 0), ViewId::new(0, 1)),
    ];
    let matcher = DescriptorMatcher::new(
        TranslationModel::default(),
        RansacParameters::default()
            .max_epsilon(1.0)
            .num_iterations(1000),
    );
    let results = compute_pairwise(&points, &pairs, &matcher, &PairwiseSettings::default()).unwrap();

    // Two labels of view 0 against one label of each partner, ordered by views.
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].views.1, ViewId::new(0, 1));
    assert_eq!(results[0].labels.0, "beads");
    assert!(!results[0].is_empty());
    for failed in &results[1..] {
        assert!(failed.is_empty(), "{}", failed.description);
    }
    assert!(results[3].description.contains("(tp 0, setup 2)"));
}

#[test]
fn icp_refines_points_that_were_moved_into_world_space() {
    let points = scene();
    let mut transforms = BTreeMap::new();
    transforms.insert(
        ViewId::new(0, 1),
        TranslationModel::new(Vector3::new(19.0, -4.0, 2.0)),
    );
    let world = transform_points(&points, &transforms);
    let moved = &world[&ViewId::new(0, 1)]["beads"][0];
    assert_relative_eq!(
        moved.world,
        transforms[&ViewId::new(0, 1)].apply(moved.local)
    );

    let matcher = IcpMatcher::new(TranslationModel::default()).max_distance(4.0);
    let results = compute_pairwise(
        &world,
        &[(ViewId::new(0, 1), ViewId::new(0, 0))],
        &matcher,
        &PairwiseSettings::default().labels(LabelPairing::Equal),
    )
    .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].num_inliers() >= 50, "{}", results[0].description);
    assert_relative_eq!(results[0].error, 0.0, epsilon = 1e-6);
}
