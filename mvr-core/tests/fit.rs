use approx::assert_relative_eq;
use mvr_core::{
    AffineModel, AnyModel, ModelKind, RigidModel, TransformModel, TranslationModel, WeightedMatch,
};
use nalgebra::{IsometryMatrix3, Matrix3, Point3, Rotation3, Translation3, Vector3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn cloud(rng: &mut impl Rng, n: usize) -> Vec<Point3<f64>> {
    (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            )
        })
        .collect()
}

fn matches_under<M: TransformModel>(truth: &M, points: &[Point3<f64>]) -> Vec<WeightedMatch> {
    points
        .iter()
        .map(|&p| WeightedMatch(p, truth.apply(p), 1.0))
        .collect()
}

#[test]
fn every_family_recovers_itself() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
    let points = cloud(&mut rng, 32);

    let translation = TranslationModel::new(Vector3::new(3.0, -7.0, 11.0));
    let mut model = TranslationModel::default();
    model.fit(&matches_under(&translation, &points)).unwrap();
    assert_relative_eq!(model.translation, translation.translation, epsilon = 1e-9);

    let rigid = RigidModel::new(IsometryMatrix3::from_parts(
        Translation3::new(-20.0, 4.0, 1.0),
        Rotation3::from_euler_angles(-1.2, 0.4, 2.9),
    ));
    let mut model = RigidModel::default();
    model.fit(&matches_under(&rigid, &points)).unwrap();
    assert_relative_eq!(
        model.to_homogeneous(),
        rigid.to_homogeneous(),
        epsilon = 1e-9
    );

    let affine = AffineModel::new(
        Matrix3::new(0.9, 0.1, 0.0, -0.3, 1.2, 0.05, 0.0, 0.2, 0.7),
        Vector3::new(1.0, 2.0, 3.0),
    );
    let mut model = AnyModel::new(ModelKind::Affine);
    model.fit(&matches_under(&affine, &points)).unwrap();
    assert_relative_eq!(
        model.to_homogeneous(),
        affine.to_homogeneous(),
        epsilon = 1e-9
    );
}

#[test]
fn rigid_fit_of_a_mirror_image_is_still_a_rotation() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let points = cloud(&mut rng, 16);
    let matches: Vec<_> = points
        .iter()
        .map(|&p| WeightedMatch(p, Point3::new(-p.x, p.y, p.z), 1.0))
        .collect();
    let mut model = RigidModel::default();
    model.fit(&matches).unwrap();
    assert_relative_eq!(
        model.isometry.rotation.matrix().determinant(),
        1.0,
        epsilon = 1e-9
    );
}

#[test]
fn weights_pull_the_fit() {
    let matches = [
        WeightedMatch(Point3::origin(), Point3::new(10.0, 0.0, 0.0), 1.0),
        WeightedMatch(Point3::origin(), Point3::new(0.0, 0.0, 0.0), 9.0),
    ];
    let mut model = AnyModel::new(ModelKind::Translation);
    model.fit(&matches).unwrap();
    assert_relative_eq!(model.apply(Point3::origin()), Point3::new(1.0, 0.0, 0.0));
}

#[test]
fn rigid_composition_matches_sequential_application() {
    let a = RigidModel::new(IsometryMatrix3::from_parts(
        Translation3::new(1.0, 0.0, 0.0),
        Rotation3::from_euler_angles(0.0, 0.0, 0.5),
    ));
    let b = RigidModel::new(IsometryMatrix3::from_parts(
        Translation3::new(0.0, 5.0, 0.0),
        Rotation3::from_euler_angles(0.3, 0.0, 0.0),
    ));
    let p = Point3::new(2.0, 3.0, 4.0);
    assert_relative_eq!(
        a.preconcatenated(&b).apply(p),
        b.apply(a.apply(p)),
        epsilon = 1e-12
    );
    let inverse = a.preconcatenated(&b).apply_inverse(b.apply(a.apply(p))).unwrap();
    assert_relative_eq!(inverse, p, epsilon = 1e-9);
}
