use crate::bodies::{GroupFilter, ObjectId};
use crate::core::lock;
use crate::math::{translation, Transform, Vector3};
use crate::shapes::CollisionShape;

use std::sync::Mutex;

/// A kinematic character controller.
///
/// The kernel moves the character by its walk direction once per sub-step.
/// Besides its collision-object id the character owns a controller (action)
/// id that the kernel registers separately.
#[derive(Debug)]
pub struct Character {
    id: ObjectId,
    controller_id: ObjectId,
    shape: CollisionShape,
    filter: GroupFilter,
    transform: Mutex<Transform>,
    walk_direction: Mutex<Vector3>,
}

impl Character {
    /// Creates a character at the origin
    pub fn new(shape: CollisionShape) -> Self {
        Self {
            id: ObjectId::next(),
            controller_id: ObjectId::next(),
            shape,
            filter: GroupFilter::new(),
            transform: Mutex::new(Transform::identity()),
            walk_direction: Mutex::new(Vector3::zeros()),
        }
    }

    /// Sets the initial position
    pub fn with_position(self, position: Vector3) -> Self {
        self.set_transform(translation(position));
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the id of the controller action driving this character
    pub fn controller_id(&self) -> ObjectId {
        self.controller_id
    }

    pub fn shape(&self) -> CollisionShape {
        self.shape
    }

    pub fn filter(&self) -> &GroupFilter {
        &self.filter
    }

    pub fn transform(&self) -> Transform {
        *lock(&self.transform)
    }

    pub fn set_transform(&self, transform: Transform) {
        *lock(&self.transform) = transform;
    }

    /// Returns the per-sub-step displacement
    pub fn walk_direction(&self) -> Vector3 {
        *lock(&self.walk_direction)
    }

    /// Sets the per-sub-step displacement
    pub fn set_walk_direction(&self, direction: Vector3) {
        *lock(&self.walk_direction) = direction;
    }
}
