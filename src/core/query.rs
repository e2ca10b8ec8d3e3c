use crate::bodies::ObjectId;
use crate::core::RayTestFlags;
use crate::kernel::SimulationKernel;
use crate::math::{Transform, Vector3};
use crate::shapes::CollisionShape;
use std::cmp::Ordering;

/// One hit of a ray test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTestResult {
    /// The object that was hit
    pub object: ObjectId,

    /// Position of the hit along the ray, 0 at `from` and 1 at `to`
    pub hit_fraction: f32,

    /// Surface normal at the hit
    pub hit_normal: Vector3,

    /// Whether `hit_normal` is expressed in world space
    pub normal_in_world_space: bool,
}

/// One hit of a sweep test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepTestResult {
    /// The object that was hit
    pub object: ObjectId,

    /// Position of the hit along the sweep, 0 at the start transform and 1 at the end
    pub hit_fraction: f32,

    /// Surface normal at the hit
    pub hit_normal: Vector3,

    /// Whether `hit_normal` is expressed in world space
    pub normal_in_world_space: bool,
}

fn by_fraction(a: f32, b: f32) -> Ordering {
    a.total_cmp(&b)
}

/// Stateless ray and sweep queries against a kernel's current world.
///
/// `*_into` variants clear the destination first and reuse its allocation.
pub struct QueryEngine;

impl QueryEngine {
    /// Hits along `from -> to`, nearest first. Ties keep discovery order.
    pub fn ray_test(
        kernel: &dyn SimulationKernel,
        from: Vector3,
        to: Vector3,
        flags: RayTestFlags,
    ) -> Vec<RayTestResult> {
        let mut results = Vec::new();
        Self::ray_test_into(kernel, from, to, flags, &mut results);
        results
    }

    pub fn ray_test_into(
        kernel: &dyn SimulationKernel,
        from: Vector3,
        to: Vector3,
        flags: RayTestFlags,
        results: &mut Vec<RayTestResult>,
    ) {
        Self::ray_test_raw_into(kernel, from, to, flags, results);
        results.sort_by(|a, b| by_fraction(a.hit_fraction, b.hit_fraction));
    }

    /// Hits along `from -> to` in whatever order the kernel found them
    pub fn ray_test_raw(
        kernel: &dyn SimulationKernel,
        from: Vector3,
        to: Vector3,
        flags: RayTestFlags,
    ) -> Vec<RayTestResult> {
        kernel.ray_test(from, to, flags)
    }

    pub fn ray_test_raw_into(
        kernel: &dyn SimulationKernel,
        from: Vector3,
        to: Vector3,
        flags: RayTestFlags,
        results: &mut Vec<RayTestResult>,
    ) {
        results.clear();
        results.extend(kernel.ray_test(from, to, flags));
    }

    /// Sweeps `shape` from `start` to `end`.
    ///
    /// Sweeps shorter than the kernel's minimum distance, and sweeps that
    /// start inside a target and move away from its center, report nothing.
    pub fn sweep_test(
        kernel: &dyn SimulationKernel,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
    ) -> Vec<SweepTestResult> {
        kernel.sweep_test(shape, start, end, allowed_penetration)
    }

    pub fn sweep_test_into(
        kernel: &dyn SimulationKernel,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
        results: &mut Vec<SweepTestResult>,
    ) {
        results.clear();
        results.extend(kernel.sweep_test(shape, start, end, allowed_penetration));
    }
}
