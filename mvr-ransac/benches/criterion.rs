use criterion::{criterion_group, criterion_main, Criterion};
use mvr_core::nalgebra::{Matrix3, Point3, Vector3};
use mvr_core::{AffineModel, InterestPoint, PointMatch, RigidModel, TransformModel};
use mvr_ransac::{Ransac, RansacParameters};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn candidates(inliers: usize, outliers: usize) -> Vec<PointMatch<InterestPoint>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
    let truth = AffineModel::new(
        Matrix3::new(1.0, 0.05, 0.0, 0.0, 1.0, 0.05, 0.05, 0.0, 1.0),
        Vector3::new(30.0, 0.0, -8.0),
    );
    let mut point = |extent: f64| {
        Point3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        )
    };
    let mut matches = vec![];
    for id in 0..inliers {
        let p = point(100.0);
        matches.push(PointMatch::new(
            InterestPoint::new(id, p),
            InterestPoint::new(id, truth.apply(p)),
        ));
    }
    for id in inliers..inliers + outliers {
        matches.push(PointMatch::new(
            InterestPoint::new(id, point(100.0)),
            InterestPoint::new(id, point(1000.0)),
        ));
    }
    matches
}

fn affine(c: &mut Criterion) {
    let data = candidates(100, 300);
    c.bench_function("affine 100 inliers 300 outliers", |b| {
        b.iter(|| {
            Ransac::new(
                RansacParameters::default().num_iterations(1000),
                Xoshiro256PlusPlus::seed_from_u64(1),
            )
            .consensus(&AffineModel::default(), &data)
        })
    });
}

fn rigid(c: &mut Criterion) {
    let data = candidates(100, 300);
    c.bench_function("rigid 100 inliers 300 outliers", |b| {
        b.iter(|| {
            Ransac::new(
                RansacParameters::default().num_iterations(1000),
                Xoshiro256PlusPlus::seed_from_u64(1),
            )
            .consensus(&RigidModel::default(), &data)
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = affine, rigid
);
criterion_main!(benches);
