use approx::assert_relative_eq;
use maplit::btreemap;
use mvr_core::nalgebra::{
    Affine3, IsometryMatrix3, Matrix4, Point3, Rotation3, Translation3, Vector3,
};
use mvr_core::{BoundingBox, Group, Link, RigidModel, TranslationModel, ViewId};
use mvr_optimize::{
    ConvergenceStrategy, GlobalOptimizer, IterativeConvergenceStrategy, IterativeOptimizer,
    LinkMatchCreator, MaxErrorLinkRemoval, MetadataWeakLinkFactory, OptimizeError,
    TwoRoundOptimizer,
};
use std::sync::Arc;

fn view(setup: u32) -> ViewId {
    ViewId::new(0, setup)
}

fn offset(v: Vector3<f64>) -> Affine3<f64> {
    Affine3::from_matrix_unchecked(Matrix4::new_translation(&v))
}

fn overlap() -> BoundingBox {
    BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(50.0, 40.0, 30.0))
}

/// A link between two single views placed at the given world positions.
fn view_link(a: u32, b: u32, positions: &[Vector3<f64>]) -> Link<ViewId> {
    let delta = positions[b as usize] - positions[a as usize];
    Link::new(view(a), view(b), overlap(), offset(delta), 1.0)
}

fn group_link(link: Link<ViewId>) -> Link<Group<ViewId>> {
    Link::new(
        [link.a].into_iter().collect(),
        [link.b].into_iter().collect(),
        link.bounding_box,
        link.transform,
        link.quality,
    )
}

fn triangle() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(100.0, 0.0, 0.0),
        Vector3::new(50.0, 86.6, 0.0),
    ]
}

fn triangle_links() -> LinkMatchCreator {
    let positions = triangle();
    LinkMatchCreator::new(
        [(0, 1), (0, 2), (1, 2)]
            .iter()
            .map(|&(a, b)| group_link(view_link(a, b, &positions))),
    )
}

#[test]
fn equilateral_triangle_is_recovered() {
    let optimizer = GlobalOptimizer::new(
        TranslationModel::default(),
        ConvergenceStrategy::default().max_allowed_error(0.01),
    )
    .fixed_views([view(0)]);
    let result = optimizer.optimize(&triangle_links()).unwrap();
    assert!(result.converged);
    assert!(result.excluded.is_empty());

    let transforms = result.transforms();
    for (setup, expected) in triangle().into_iter().enumerate() {
        assert_relative_eq!(
            transforms[&view(setup as u32)].translation,
            expected,
            epsilon = 1e-3
        );
    }
}

#[test]
fn concurrent_updates_reach_the_same_solution() {
    let optimizer = GlobalOptimizer::new(
        TranslationModel::default(),
        ConvergenceStrategy::default().max_allowed_error(0.01),
    )
    .fixed_views([view(0)])
    .concurrent(true);
    let transforms = optimizer.optimize(&triangle_links()).unwrap().transforms();
    for (setup, expected) in triangle().into_iter().enumerate() {
        assert_relative_eq!(
            transforms[&view(setup as u32)].translation,
            expected,
            epsilon = 1e-3
        );
    }
}

#[test]
fn overlapping_groups_share_one_transform() {
    let positions = vec![Vector3::zeros(), Vector3::new(80.0, 10.0, 0.0)];
    let creator = LinkMatchCreator::new([group_link(view_link(0, 1, &positions))]);
    let groups: Vec<Group<ViewId>> = vec![
        [view(1), view(2)].into_iter().collect(),
        [view(2), view(3)].into_iter().collect(),
    ];
    let result = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)])
        .groups(groups)
        .optimize(&creator)
        .unwrap();

    let transforms = result.transforms();
    assert!(Arc::ptr_eq(&transforms[&view(1)], &transforms[&view(2)]));
    assert!(Arc::ptr_eq(&transforms[&view(2)], &transforms[&view(3)]));
    assert_relative_eq!(transforms[&view(3)].translation, positions[1], epsilon = 1e-6);
}

#[test]
fn fixed_tiles_keep_their_model_exactly() {
    let initial = RigidModel::new(IsometryMatrix3::from_parts(
        Translation3::new(0.1, 0.2, 0.3),
        Rotation3::from_euler_angles(0.01, 0.02, 0.03),
    ));
    let positions = vec![Vector3::zeros(), Vector3::new(90.0, 0.0, 0.0)];
    let mut links = vec![group_link(view_link(0, 1, &positions))];
    // An inconsistent third view pulls on the fixed one.
    links.push(group_link(Link::new(
        view(2),
        view(0),
        overlap(),
        offset(Vector3::new(-3.0, 7.0, 1.0)),
        1.0,
    )));
    links.push(group_link(Link::new(
        view(2),
        view(1),
        overlap(),
        offset(Vector3::new(50.0, 0.0, 0.0)),
        1.0,
    )));

    let seeds = btreemap! { view(0) => initial };
    let result = GlobalOptimizer::new(RigidModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)])
        .initial_transforms(seeds)
        .optimize(&LinkMatchCreator::new(links))
        .unwrap();

    let transforms = result.transforms();
    let fixed = &transforms[&view(0)];
    assert_eq!(**fixed, initial);
    assert_eq!(
        fixed.isometry.to_homogeneous().map(f64::to_bits),
        initial.isometry.to_homogeneous().map(f64::to_bits)
    );
}

#[test]
fn unconnected_views_are_excluded_not_errors() {
    let positions = triangle();
    let mut links = vec![group_link(view_link(0, 1, &positions))];
    let mut weak = group_link(view_link(1, 2, &positions));
    weak.quality = 0.1;
    links.push(weak);

    let result = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)])
        .optimize(&LinkMatchCreator::new(links).min_quality(0.5))
        .unwrap();
    assert_eq!(result.excluded_views(), [view(2)].into_iter().collect());
    let transforms = result.transforms();
    assert_eq!(transforms[&view(2)].translation, Vector3::zeros());
}

#[test]
fn no_connections_is_disconnected() {
    let positions = triangle();
    let mut link = group_link(view_link(0, 1, &positions));
    link.quality = 0.0;
    let result = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .optimize(&LinkMatchCreator::new([link]).min_quality(0.5));
    assert_eq!(result.unwrap_err(), OptimizeError::Disconnected);
}

#[test]
fn corrupted_link_is_removed_exactly_once() {
    let positions = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(100.0, 0.0, 0.0),
        Vector3::new(0.0, 100.0, 0.0),
        Vector3::new(100.0, 100.0, 0.0),
    ];
    let mut links = vec![];
    for a in 0..4 {
        for b in a + 1..4 {
            let mut link = view_link(a, b, &positions);
            if (a, b) == (1, 2) {
                let corrupted = positions[2] - positions[1] + Vector3::new(10_000.0, 0.0, 0.0);
                link.transform = offset(corrupted);
            }
            links.push(group_link(link));
        }
    }

    let global = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)]);
    let strategy = IterativeConvergenceStrategy::default();
    let mut optimizer = IterativeOptimizer::new(global, strategy, MaxErrorLinkRemoval);
    let result = optimizer.optimize(&LinkMatchCreator::new(links)).unwrap();

    assert!(result.converged);
    assert_eq!(result.removed.len(), 1);
    let removed = &result.removed[0];
    assert_eq!(
        removed.views,
        (
            [view(1)].into_iter().collect(),
            [view(2)].into_iter().collect()
        )
    );
    let transforms = result.transforms();
    for (setup, expected) in positions.iter().enumerate() {
        assert_relative_eq!(
            transforms[&view(setup as u32)].translation,
            *expected,
            epsilon = 1e-3
        );
    }
}

#[test]
fn second_round_is_skipped_for_one_component() {
    let convergence = ConvergenceStrategy::default().max_allowed_error(0.01);
    let single = GlobalOptimizer::new(TranslationModel::default(), convergence)
        .fixed_views([view(0)])
        .optimize(&triangle_links())
        .unwrap()
        .transforms();

    let global = GlobalOptimizer::new(TranslationModel::default(), convergence)
        .fixed_views([view(0)]);
    let iterative = IterativeOptimizer::new(
        global,
        IterativeConvergenceStrategy::new(convergence, 3.5, 7.0),
        MaxErrorLinkRemoval,
    );
    let mut two_round = TwoRoundOptimizer::new(iterative, MetadataWeakLinkFactory::new([]));
    let result = two_round.optimize(&triangle_links()).unwrap();

    assert!(result.round_two.is_none());
    assert_eq!(result.components.len(), 1);
    assert_eq!(result.transforms().len(), single.len());
    for (id, model) in result.transforms() {
        assert_eq!(**model, *single[id]);
    }
}

#[test]
fn weak_links_join_components() {
    let positions = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(100.0, 0.0, 0.0),
        Vector3::new(200.0, 0.0, 0.0),
        Vector3::new(300.0, 0.0, 0.0),
    ];
    let strong = LinkMatchCreator::new([
        group_link(view_link(0, 1, &positions)),
        group_link(view_link(2, 3, &positions)),
    ]);
    let weak = MetadataWeakLinkFactory::new([view_link(1, 2, &positions)]);

    let global = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)]);
    let iterative = IterativeOptimizer::new(
        global,
        IterativeConvergenceStrategy::default(),
        MaxErrorLinkRemoval,
    );
    let result = TwoRoundOptimizer::new(iterative, weak)
        .optimize(&strong)
        .unwrap();

    assert_eq!(result.components.len(), 2);
    assert!(result.round_two.is_some());
    // Without the second round the far component stays where it was detected.
    let round_one = result.round_one.transforms();
    assert_relative_eq!(round_one[&view(2)].translation, Vector3::zeros(), epsilon = 1e-9);
    for (setup, expected) in positions.iter().enumerate() {
        assert_relative_eq!(
            result.transforms()[&view(setup as u32)].translation,
            *expected,
            epsilon = 1e-6
        );
    }
}

#[test]
fn weak_links_alone_register_unconnected_views() {
    let positions = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(100.0, 0.0, 0.0),
        Vector3::new(100.0, 100.0, 0.0),
    ];
    let mut rejected = group_link(view_link(0, 1, &positions));
    rejected.quality = 0.1;
    let mut also_rejected = group_link(view_link(1, 2, &positions));
    also_rejected.quality = 0.1;
    let strong = LinkMatchCreator::new([rejected, also_rejected]).min_quality(0.5);
    let weak = MetadataWeakLinkFactory::new([
        view_link(0, 1, &positions),
        view_link(1, 2, &positions),
    ]);

    let global = GlobalOptimizer::new(TranslationModel::default(), ConvergenceStrategy::default())
        .fixed_views([view(0)]);
    let iterative = IterativeOptimizer::new(
        global,
        IterativeConvergenceStrategy::default(),
        MaxErrorLinkRemoval,
    );
    let result = TwoRoundOptimizer::new(iterative, weak)
        .optimize(&strong)
        .unwrap();

    assert!(!result.round_one.converged);
    assert_eq!(result.components.len(), 3);
    let round_two = result.round_two.as_ref().unwrap();
    assert!(round_two.converged);
    for (setup, expected) in positions.iter().enumerate() {
        assert_relative_eq!(
            result.transforms()[&view(setup as u32)].translation,
            *expected,
            epsilon = 1e-6
        );
    }
}
