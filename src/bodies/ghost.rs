use crate::bodies::{GroupFilter, ObjectId};
use crate::core::lock;
use crate::math::{translation, Transform, Vector3};
use crate::shapes::CollisionShape;

use std::sync::Mutex;

/// A collision object that reports overlaps but never takes part in the
/// dynamic response
#[derive(Debug)]
pub struct GhostObject {
    id: ObjectId,
    shape: CollisionShape,
    filter: GroupFilter,
    transform: Mutex<Transform>,
}

impl GhostObject {
    /// Creates a ghost object at the origin
    pub fn new(shape: CollisionShape) -> Self {
        Self {
            id: ObjectId::next(),
            shape,
            filter: GroupFilter::new(),
            transform: Mutex::new(Transform::identity()),
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
}
