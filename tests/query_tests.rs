mod common;

use approx::assert_relative_eq;
use common::{ray_hit, static_sphere_at, weightless_space, RecordingKernel};
use phys_space::bodies::ObjectId;
use phys_space::core::SweepTestResult;
use phys_space::math::translation;
use phys_space::{CollisionShape, RayTestResult, SimulationSpace, StepContext, TickListener, Vector3};
use std::sync::{Arc, Mutex};
use std::thread;

const STEP: f32 = 1.0 / 60.0;

/// Three static spheres of radius 0.5 strung along the x axis, out of order
fn spheres_on_a_line() -> (Arc<SimulationSpace>, Vec<ObjectId>) {
    let space = weightless_space();
    let mut ids = Vec::new();
    for x in [8.5, 1.5, 5.5] {
        let sphere = static_sphere_at(Vector3::new(x, 0.0, 0.0), 0.5);
        ids.push(sphere.id());
        space.add(sphere).unwrap();
    }
    (space, ids)
}

fn fractions(results: &[RayTestResult]) -> Vec<f32> {
    results.iter().map(|hit| hit.hit_fraction).collect()
}

#[test]
fn test_ray_test_sorts_nearest_first() {
    let (space, ids) = spheres_on_a_line();
    let hits = space.ray_test(Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0));

    assert_eq!(hits.len(), 3);
    let expected = [0.1, 0.5, 0.8];
    for (hit, fraction) in hits.iter().zip(expected) {
        assert_relative_eq!(hit.hit_fraction, fraction, epsilon = 1e-4);
    }
    assert_eq!(hits[0].object, ids[1]);
    assert_eq!(hits[1].object, ids[2]);
    assert_eq!(hits[2].object, ids[0]);

    // Entering from -x, every normal faces back along the ray
    for hit in &hits {
        assert!(hit.normal_in_world_space);
        assert_relative_eq!(hit.hit_normal, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-4);
    }
}

#[test]
fn test_raw_ray_test_returns_the_same_hits() {
    let (space, _) = spheres_on_a_line();
    let from = Vector3::zeros();
    let to = Vector3::new(10.0, 0.0, 0.0);

    let mut raw = fractions(&space.ray_test_raw(from, to));
    raw.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(raw, fractions(&space.ray_test(from, to)));
}

#[test]
fn test_ray_test_misses_outside_the_segment() {
    let (space, _) = spheres_on_a_line();

    // Stops short of the first sphere
    assert!(space.ray_test(Vector3::zeros(), Vector3::new(0.9, 0.0, 0.0)).is_empty());
    // Passes above every sphere
    assert!(space
        .ray_test(Vector3::new(0.0, 2.0, 0.0), Vector3::new(10.0, 2.0, 0.0))
        .is_empty());
}

#[test]
fn test_ray_test_into_replaces_previous_contents() {
    let (space, _) = spheres_on_a_line();
    let mut results = vec![ray_hit(ObjectId(999), 0.0); 5];

    space.ray_test_into(Vector3::zeros(), Vector3::new(6.0, 0.0, 0.0), &mut results);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|hit| hit.object != ObjectId(999)));

    space.ray_test_raw_into(Vector3::new(0.0, 5.0, 0.0), Vector3::new(10.0, 5.0, 0.0), &mut results);
    assert!(results.is_empty());
}

#[test]
fn test_equal_fractions_keep_kernel_order() {
    let hits = vec![
        ray_hit(ObjectId(3), 0.5),
        ray_hit(ObjectId(1), 0.2),
        ray_hit(ObjectId(2), 0.5),
        ray_hit(ObjectId(4), 0.5),
    ];
    let (kernel, _log) = RecordingKernel::new();
    let space = kernel.with_ray_hits(hits.clone()).into_space();

    let sorted: Vec<ObjectId> = space
        .ray_test(Vector3::zeros(), Vector3::x())
        .iter()
        .map(|hit| hit.object)
        .collect();
    assert_eq!(sorted, vec![ObjectId(1), ObjectId(3), ObjectId(2), ObjectId(4)]);

    assert_eq!(space.ray_test_raw(Vector3::zeros(), Vector3::x()), hits);
}

#[test]
fn test_sweep_results_are_not_sorted() {
    let hits = vec![
        SweepTestResult {
            object: ObjectId(7),
            hit_fraction: 0.9,
            hit_normal: Vector3::x(),
            normal_in_world_space: true,
        },
        SweepTestResult {
            object: ObjectId(8),
            hit_fraction: 0.1,
            hit_normal: Vector3::x(),
            normal_in_world_space: true,
        },
    ];
    let (kernel, _log) = RecordingKernel::new();
    let space = kernel.with_sweep_hits(hits.clone()).into_space();

    let shape = CollisionShape::sphere(0.5);
    let results = space.sweep_test(&shape, &translation(Vector3::zeros()), &translation(Vector3::x()));
    assert_eq!(results, hits);
}

#[test]
fn test_short_sweeps_miss() {
    let space = weightless_space();
    space.add(static_sphere_at(Vector3::new(1.6, 0.0, 0.0), 1.0)).unwrap();
    let shape = CollisionShape::sphere(0.5);

    let short = space.sweep_test(&shape, &translation(Vector3::zeros()), &translation(Vector3::new(0.3, 0.0, 0.0)));
    assert!(short.is_empty());

    let long = space.sweep_test(&shape, &translation(Vector3::zeros()), &translation(Vector3::new(1.0, 0.0, 0.0)));
    assert_eq!(long.len(), 1);
    assert_relative_eq!(long[0].hit_fraction, 0.1, epsilon = 1e-4);
}

#[test]
fn test_sweep_from_inside_only_hits_toward_the_center() {
    let space = weightless_space();
    let target = static_sphere_at(Vector3::zeros(), 1.0);
    let target_id = target.id();
    space.add(target).unwrap();
    let shape = CollisionShape::sphere(0.5);
    let start = translation(Vector3::new(0.5, 0.0, 0.0));

    let away = space.sweep_test(&shape, &start, &translation(Vector3::new(2.5, 0.0, 0.0)));
    assert!(away.is_empty());

    let toward = space.sweep_test(&shape, &start, &translation(Vector3::new(-1.5, 0.0, 0.0)));
    assert_eq!(toward.len(), 1);
    assert_eq!(toward[0].object, target_id);
    assert_eq!(toward[0].hit_fraction, 0.0);
}

#[test]
fn test_allowed_penetration_shrinks_the_sweep() {
    let space = weightless_space();
    space.add(static_sphere_at(Vector3::new(3.0, 1.4, 0.0), 1.0)).unwrap();
    let shape = CollisionShape::sphere(0.5);
    let start = translation(Vector3::zeros());
    let end = translation(Vector3::new(6.0, 0.0, 0.0));

    assert_eq!(space.sweep_test(&shape, &start, &end).len(), 1);
    assert!(space.sweep_test_with_penetration(&shape, &start, &end, 0.2).is_empty());
}

#[test]
fn test_queries_from_another_thread() {
    let (space, _) = spheres_on_a_line();
    let remote = Arc::clone(&space);

    let hits = thread::spawn(move || remote.ray_test(Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0)))
        .join()
        .unwrap();
    assert_eq!(hits.len(), 3);
}

struct ContextQuery {
    hits: Mutex<Option<usize>>,
}

impl TickListener for ContextQuery {
    fn pre_tick(&self, ctx: &mut StepContext<'_>, _time_step: f32) {
        let hits = ctx.ray_test(Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0));
        *self.hits.lock().unwrap() = Some(hits.len());
    }

    fn post_tick(&self, _ctx: &mut StepContext<'_>, _time_step: f32) {}
}

#[test]
fn test_step_context_queries_mid_step() {
    let (space, _) = spheres_on_a_line();
    let listener = Arc::new(ContextQuery {
        hits: Mutex::new(None),
    });
    space.add_tick_listener(listener.clone());

    space.update(STEP);
    assert_eq!(*listener.hits.lock().unwrap(), Some(3));
}

struct SpaceQuery;

impl TickListener for SpaceQuery {
    fn pre_tick(&self, ctx: &mut StepContext<'_>, _time_step: f32) {
        ctx.space().ray_test(Vector3::zeros(), Vector3::x());
    }

    fn post_tick(&self, _ctx: &mut StepContext<'_>, _time_step: f32) {}
}

#[test]
#[should_panic(expected = "use the StepContext")]
fn test_querying_through_the_space_mid_step_panics() {
    let space = weightless_space();
    space.add_tick_listener(Arc::new(SpaceQuery));
    space.update(STEP);
}
