//! Boundary between a simulation space and the engine that does the math.
//!
//! A space drives exactly one kernel. The kernel owns the world, steps it and
//! calls back into the space at fixed points of every sub-step through
//! [`KernelCallbacks`].

mod reference;

pub use self::reference::{ReferenceKernel, MIN_SWEEP_DISTANCE};

use crate::bodies::{Character, ConstraintId, GhostObject, ObjectId, ObjectKind, RigidBody, Vehicle};
use crate::constraints::Joint;
use crate::core::{ContactPoint, RayTestFlags, RayTestResult, SpaceConfig, SpaceId, SweepTestResult};
use crate::math::{Transform, Vector3};
use crate::shapes::CollisionShape;
use crate::Result;
use std::sync::Arc;

/// Hooks a kernel invokes synchronously while it steps
pub trait KernelCallbacks {
    /// Start of a sub-step; the kernel lends itself so deferred work can edit the world
    fn pre_tick(&mut self, kernel: &mut dyn SimulationKernel, time_step: f32);

    /// End of a sub-step
    fn post_tick(&mut self, kernel: &mut dyn SimulationKernel, time_step: f32);

    /// A contact point between two objects was found
    fn on_contact(&mut self, object_a: ObjectId, object_b: ObjectId, contact: &ContactPoint);

    /// Asks whether a broadphase pair should be tested at all
    fn need_collision(&mut self, object_a: ObjectId, object_b: ObjectId) -> bool;
}

/// The native simulation engine behind a space.
///
/// Every object passed in is identified by its [`ObjectId`]; the kernel may
/// keep the `Arc`s it receives until the matching remove call.
pub trait SimulationKernel: Send {
    /// Builds the world and returns its handle
    fn create_world(&mut self, config: &SpaceConfig) -> Result<SpaceId>;

    /// Frees the world; objects still inside are dropped by the kernel
    fn destroy_world(&mut self);

    /// Returns whether objects of this kind can be added
    fn supports(&self, _kind: ObjectKind) -> bool {
        true
    }

    /// Advances the world by `time`, in at most `max_steps` sub-steps of `accuracy`
    /// seconds. Returns the number of sub-steps taken.
    fn step_simulation(
        &mut self,
        time: f32,
        max_steps: u32,
        accuracy: f32,
        callbacks: &mut dyn KernelCallbacks,
    ) -> u32;

    /// Sets the gravity given to bodies added from now on
    fn set_gravity(&mut self, gravity: Vector3);

    fn set_solver_iterations(&mut self, iterations: u32);

    fn add_collision_object(&mut self, ghost: &Arc<GhostObject>) -> Result<()>;

    fn remove_collision_object(&mut self, id: ObjectId) -> Result<()>;

    fn add_rigid_body(&mut self, body: &Arc<RigidBody>) -> Result<()>;

    fn remove_rigid_body(&mut self, id: ObjectId) -> Result<()>;

    /// Adds the character's collision object and its controller action
    fn add_character(&mut self, character: &Arc<Character>) -> Result<()>;

    fn remove_character(&mut self, id: ObjectId) -> Result<()>;

    /// Creates the raycast-vehicle constraint for a vehicle whose chassis is in the world.
    /// Constraint ids are only meaningful to the kernel that created them.
    fn create_vehicle(&mut self, vehicle: &Arc<Vehicle>) -> Result<ConstraintId>;

    fn add_vehicle(&mut self, constraint: ConstraintId) -> Result<()>;

    /// Takes the constraint out of the world and releases it
    fn remove_vehicle(&mut self, constraint: ConstraintId) -> Result<()>;

    /// Adds a joint; `disable_linked_collision` suppresses contacts between its bodies
    fn add_joint(&mut self, joint: &Arc<Joint>, disable_linked_collision: bool) -> Result<()>;

    fn remove_joint(&mut self, id: ObjectId) -> Result<()>;

    /// Casts a ray over the segment `from -> to`; results are in discovery order
    fn ray_test(&self, from: Vector3, to: Vector3, flags: RayTestFlags) -> Vec<RayTestResult>;

    /// Sweeps a convex shape from `start` to `end`
    fn sweep_test(
        &self,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
    ) -> Vec<SweepTestResult>;
}
