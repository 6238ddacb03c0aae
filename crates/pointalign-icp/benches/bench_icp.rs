use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pointalign_3d::{linalg, pointcloud::PointCloud, transforms};
use pointalign_icp::{
    find_correspondences, fit_transformation, icp_align, ICPConfig, KdTree, UniformSampler,
};

fn create_clouds(num_points: usize) -> (PointCloud, PointCloud) {
    let mut rng = StdRng::seed_from_u64(0);
    let model = (0..num_points)
        .map(|_| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
        .collect::<Vec<_>>();

    let rotation = transforms::axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.05).unwrap();
    let mut data = vec![[0.0; 3]; num_points];
    linalg::transform_points(&model, &rotation, &[0.02, -0.01, 0.0], &mut data);

    (PointCloud::new(data), PointCloud::new(model))
}

fn bench_correspondences(c: &mut Criterion) {
    let mut group = c.benchmark_group("correspondences");

    for num_points in [1000, 10000, 100000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);

        let (data, model) = create_clouds(*num_points);
        let config = ICPConfig::default();
        let kdtree = KdTree::build(model.points(), config.metric).unwrap();

        group.bench_with_input(
            BenchmarkId::new("find_correspondences", &parameter_string),
            &(&data, &kdtree),
            |b, i| {
                let (data, kdtree) = (i.0, i.1);
                let mut sampler = UniformSampler::seeded(0);
                b.iter(|| {
                    let res = find_correspondences(
                        data.points(),
                        kdtree,
                        &mut sampler,
                        data.len(),
                        config.rejection_sigma,
                    );
                    black_box(res)
                });
            },
        );

        let correspondences = find_correspondences(
            data.points(),
            &kdtree,
            &mut UniformSampler::seeded(0),
            data.len(),
            config.rejection_sigma,
        )
        .unwrap();

        group.bench_with_input(
            BenchmarkId::new("fit_transformation", &parameter_string),
            &(&data, &model, &correspondences.map),
            |b, i| {
                let (data, model, map) = (i.0, i.1, i.2);
                b.iter(|| {
                    black_box(fit_transformation(
                        data.points(),
                        model.points(),
                        map,
                        config.degeneracy_tolerance,
                    ))
                });
            },
        );
    }
}

fn bench_icp_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp_align");
    group.sample_size(10);

    for (num_points, sampling_fraction) in [(10000, 1.0), (10000, 0.25), (100000, 0.1)] {
        let parameter_string = format!("{}/{}", num_points, sampling_fraction);
        let (data, model) = create_clouds(num_points);
        let config = ICPConfig::default()
            .with_sampling_fraction(sampling_fraction)
            .with_seed(0);

        group.bench_with_input(
            BenchmarkId::new("icp_align", &parameter_string),
            &(&data, &model),
            |b, i| {
                let (data, model) = (i.0, i.1);
                b.iter(|| black_box(icp_align(data.clone(), model, config.clone())));
            },
        );
    }
}

criterion_group!(benches, bench_correspondences, bench_icp_align);
criterion_main!(benches);
