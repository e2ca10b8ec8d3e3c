use crate::bodies::{ObjectId, RigidBody};
use crate::math::Vector3;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The kind of constraint a joint represents
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Ball-and-socket: pivots are kept together
    Point,

    /// Rotation about a single axis
    Hinge {
        /// Hinge axis in body A space
        axis: Vector3,
    },

    /// Translation along a single axis
    Slider,

    /// No relative motion
    Fixed,
}

/// A constraint between two rigid bodies.
///
/// A joint keeps strong references to both bodies, so its endpoints are
/// always resolvable. Each body keeps a weak back-reference, which is how
/// scene walkers find the joints attached to a body. Removing a body from a
/// space never removes its joints; callers remove joints first.
#[derive(Debug)]
pub struct Joint {
    id: ObjectId,
    kind: JointKind,
    body_a: Arc<RigidBody>,
    body_b: Arc<RigidBody>,
    pivot_a: Vector3,
    pivot_b: Vector3,
    collision_between_linked_bodies: AtomicBool,
}

impl Joint {
    /// Creates a joint between two bodies and registers it with both
    pub fn new(
        kind: JointKind,
        body_a: &Arc<RigidBody>,
        body_b: &Arc<RigidBody>,
        pivot_a: Vector3,
        pivot_b: Vector3,
    ) -> Arc<Self> {
        let joint = Arc::new(Self {
            id: ObjectId::next(),
            kind,
            body_a: Arc::clone(body_a),
            body_b: Arc::clone(body_b),
            pivot_a,
            pivot_b,
            collision_between_linked_bodies: AtomicBool::new(true),
        });

        body_a.attach_joint(&joint);
        body_b.attach_joint(&joint);
        joint
    }

    /// Creates a ball-and-socket joint
    pub fn point(body_a: &Arc<RigidBody>, body_b: &Arc<RigidBody>, pivot_a: Vector3, pivot_b: Vector3) -> Arc<Self> {
        Self::new(JointKind::Point, body_a, body_b, pivot_a, pivot_b)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// Returns the first endpoint
    pub fn body_a(&self) -> &Arc<RigidBody> {
        &self.body_a
    }

    /// Returns the second endpoint
    pub fn body_b(&self) -> &Arc<RigidBody> {
        &self.body_b
    }

    pub fn pivot_a(&self) -> Vector3 {
        self.pivot_a
    }

    pub fn pivot_b(&self) -> Vector3 {
        self.pivot_b
    }

    /// Returns whether the two linked bodies may collide with each other
    pub fn is_collision_between_linked_bodies(&self) -> bool {
        self.collision_between_linked_bodies.load(Ordering::Acquire)
    }

    /// Sets whether the two linked bodies may collide; read when the joint is added
    pub fn set_collision_between_linked_bodies(&self, enabled: bool) {
        self.collision_between_linked_bodies.store(enabled, Ordering::Release);
    }

    /// Returns whether `body` is one of the two endpoints
    pub fn involves_body(&self, body: ObjectId) -> bool {
        self.body_a.id() == body || self.body_b.id() == body
    }
}
