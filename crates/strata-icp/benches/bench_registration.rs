use criterion::{criterion_group, criterion_main, Criterion};

use strata_3d::transforms::{axis_angle_to_rotation_matrix, RigidTransform};
use strata_icp::{register_point_to_point, IcpCriteria, TargetIndex};

fn bench_registration(c: &mut Criterion) {
    let points_src: Vec<[f64; 3]> = (0..2000)
        .map(|_| {
            [
                rand::random::<f64>(),
                rand::random::<f64>(),
                rand::random::<f64>(),
            ]
        })
        .collect();

    let truth = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.05).expect("valid axis"),
        [0.02, -0.01, 0.0],
    );
    let mut points_dst = vec![[0.0; 3]; points_src.len()];
    truth.transform_points(&points_src, &mut points_dst);

    let target = TargetIndex::new(&points_dst);
    let criteria = IcpCriteria::default();

    c.bench_function("register_point_to_point_2k", |b| {
        b.iter(|| {
            register_point_to_point(
                std::hint::black_box(&points_src),
                &target,
                &RigidTransform::identity(),
                &criteria,
            )
            .expect("registration succeeds")
        })
    });
}

criterion_group!(benches, bench_registration);
criterion_main!(benches);
