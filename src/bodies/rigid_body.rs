use crate::bodies::{GroupFilter, ObjectId};
use crate::constraints::Joint;
use crate::core::lock;
use crate::math::{position_of, translation, Transform, Vector3};
use crate::shapes::CollisionShape;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Kinematic state of a body, shared between the application and the kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    /// The body's transform in world space
    pub transform: Transform,

    /// The body's linear velocity
    pub linear_velocity: Vector3,

    /// Forces accumulated since the last sub-step
    pub total_force: Vector3,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            linear_velocity: Vector3::zeros(),
            total_force: Vector3::zeros(),
        }
    }
}

/// A rigid body taking part in the simulation.
///
/// A mass of zero makes the body static. The kinematic flag can be toggled
/// at any time; a kinematic body is moved by the application only.
#[derive(Debug)]
pub struct RigidBody {
    /// Stable id of this body
    id: ObjectId,

    /// The body's collision shape
    shape: CollisionShape,

    /// The body's mass
    mass: f32,

    /// Whether the body is driven by the application rather than the kernel
    kinematic: AtomicBool,

    /// Collision group and mask
    filter: GroupFilter,

    /// Transform, velocity and pending forces
    motion: Mutex<MotionState>,

    /// Joints referencing this body (either end)
    joints: Mutex<Vec<Weak<Joint>>>,
}

impl RigidBody {
    /// Creates a new rigid body with the given shape and mass
    pub fn new(shape: CollisionShape, mass: f32) -> Self {
        Self {
            id: ObjectId::next(),
            shape,
            mass: mass.max(0.0),
            kinematic: AtomicBool::new(false),
            filter: GroupFilter::new(),
            motion: Mutex::new(MotionState::default()),
            joints: Mutex::new(Vec::new()),
        }
    }

    /// Creates a new dynamic rigid body at the given position
    pub fn new_dynamic(shape: CollisionShape, mass: f32, position: Vector3) -> Self {
        Self::new(shape, mass).with_position(position)
    }

    /// Creates a new static (zero mass) rigid body at the given position
    pub fn new_static(shape: CollisionShape, position: Vector3) -> Self {
        Self::new(shape, 0.0).with_position(position)
    }

    /// Sets the initial position
    pub fn with_position(self, position: Vector3) -> Self {
        self.set_physics_location(position);
        self
    }

    /// Sets the initial kinematic flag
    pub fn with_kinematic(self, kinematic: bool) -> Self {
        self.set_kinematic(kinematic);
        self
    }

    /// Returns the body's id
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the body's collision shape
    pub fn shape(&self) -> CollisionShape {
        self.shape
    }

    /// Returns the body's mass
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Returns whether the body is static (zero mass)
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    /// Returns whether the body is kinematic
    pub fn is_kinematic(&self) -> bool {
        self.kinematic.load(Ordering::Acquire)
    }

    /// Sets whether the body is kinematic
    pub fn set_kinematic(&self, kinematic: bool) {
        self.kinematic.store(kinematic, Ordering::Release);
    }

    /// Returns the collision filter
    pub fn filter(&self) -> &GroupFilter {
        &self.filter
    }

    /// Runs `f` with exclusive access to the motion state
    pub fn update_motion<R>(&self, f: impl FnOnce(&mut MotionState) -> R) -> R {
        f(&mut lock(&self.motion))
    }

    /// Returns the body's transform
    pub fn transform(&self) -> Transform {
        lock(&self.motion).transform
    }

    /// Sets the body's transform
    pub fn set_transform(&self, transform: Transform) {
        lock(&self.motion).transform = transform;
    }

    /// Returns the body's position
    pub fn physics_location(&self) -> Vector3 {
        position_of(&lock(&self.motion).transform)
    }

    /// Teleports the body, keeping its rotation
    pub fn set_physics_location(&self, position: Vector3) {
        let mut motion = lock(&self.motion);
        let rotation = motion.transform.rotation;
        motion.transform = translation(position);
        motion.transform.rotation = rotation;
    }

    /// Returns the body's linear velocity
    pub fn linear_velocity(&self) -> Vector3 {
        lock(&self.motion).linear_velocity
    }

    /// Sets the body's linear velocity
    pub fn set_linear_velocity(&self, velocity: Vector3) {
        lock(&self.motion).linear_velocity = velocity;
    }

    /// Accumulates a force applied at the center of mass for the next sub-step
    pub fn apply_central_force(&self, force: Vector3) {
        lock(&self.motion).total_force += force;
    }

    /// Applies an impulse at the center of mass (no effect on static bodies)
    pub fn apply_central_impulse(&self, impulse: Vector3) {
        if self.is_static() {
            return;
        }
        lock(&self.motion).linear_velocity += impulse / self.mass;
    }

    /// Returns the joints that still reference this body
    pub fn joints(&self) -> Vec<Arc<Joint>> {
        let mut joints = lock(&self.joints);
        joints.retain(|joint| joint.strong_count() > 0);
        joints.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn attach_joint(&self, joint: &Arc<Joint>) {
        lock(&self.joints).push(Arc::downgrade(joint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn impulse_changes_velocity_by_inverse_mass() {
        let body = RigidBody::new(CollisionShape::sphere(1.0), 2.0);
        body.apply_central_impulse(Vector3::new(4.0, 0.0, 0.0));
        assert_relative_eq!(body.linear_velocity().x, 2.0);
    }

    #[test]
    fn static_body_ignores_impulse() {
        let body = RigidBody::new_static(CollisionShape::sphere(1.0), Vector3::zeros());
        body.apply_central_impulse(Vector3::new(4.0, 0.0, 0.0));
        assert!(body.linear_velocity().norm() < 1e-6);
    }

    #[test]
    fn location_round_trips() {
        let body = RigidBody::new_dynamic(CollisionShape::sphere(1.0), 1.0, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(body.physics_location(), Vector3::new(1.0, 2.0, 3.0));
    }
}
