//! Benchmarks for phys-space
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phys_space::{CollisionShape, RigidBody, SimulationSpace, SpaceConfig, Vector3};
use std::sync::Arc;

const STEP: f32 = 1.0 / 60.0;

/// A space with `count` unit spheres scattered over a 40 x 40 x 40 box
fn scattered_space(count: usize) -> Arc<SimulationSpace> {
    let space = SimulationSpace::with_reference_kernel(SpaceConfig::default()).expect("space");
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..count {
        let position = Vector3::new(
            rng.gen_range(-20.0..20.0),
            rng.gen_range(0.0..40.0),
            rng.gen_range(-20.0..20.0),
        );
        let body = RigidBody::new_dynamic(CollisionShape::sphere(0.5), 1.0, position);
        space.add(Arc::new(body)).expect("add");
    }
    space
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for count in [10, 100] {
        group.bench_function(format!("{}_spheres_one_second", count), |b| {
            b.iter(|| {
                let space = scattered_space(count);
                for _ in 0..60 {
                    space.update(black_box(STEP));
                    space.distribute_events();
                }
                space.object_count()
            });
        });
    }

    group.bench_function("drain_100_tasks", |b| {
        let space = scattered_space(0);
        b.iter(|| {
            for i in 0..100 {
                space.enqueue(move |_| i * 2);
            }
            space.update(black_box(STEP))
        });
    });

    group.finish();
}

fn bench_ray_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("ray_test");
    let space = scattered_space(200);
    let from = Vector3::new(-25.0, 20.0, 0.0);
    let to = Vector3::new(25.0, 20.0, 0.0);

    group.bench_function("sorted", |b| {
        b.iter(|| space.ray_test(black_box(from), black_box(to)));
    });

    group.bench_function("raw", |b| {
        b.iter(|| space.ray_test_raw(black_box(from), black_box(to)));
    });

    group.bench_function("sorted_into_reused_buffer", |b| {
        let mut results = Vec::new();
        b.iter(|| {
            space.ray_test_into(black_box(from), black_box(to), &mut results);
            results.len()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_update, bench_ray_test);
criterion_main!(benches);
