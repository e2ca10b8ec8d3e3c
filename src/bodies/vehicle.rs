use crate::bodies::{ObjectId, RigidBody};
use crate::math::Vector3;

use std::sync::Arc;

/// Static description of one wheel of a raycast vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleWheel {
    /// Where the suspension connects to the chassis (chassis space)
    pub connection_point: Vector3,

    /// Suspension direction (chassis space, typically down)
    pub direction: Vector3,

    /// Axle direction (chassis space)
    pub axle: Vector3,

    /// Rest length of the suspension
    pub suspension_rest_length: f32,

    /// Wheel radius
    pub radius: f32,

    /// Whether this is a steering wheel
    pub front_wheel: bool,
}

/// A rigid-body chassis plus a kernel-side vehicle constraint.
///
/// Every space the vehicle is added to creates its own constraint and
/// records it in its registry; removing the vehicle releases it again.
#[derive(Debug)]
pub struct Vehicle {
    chassis: Arc<RigidBody>,
    wheels: Vec<VehicleWheel>,
}

impl Vehicle {
    /// Creates a vehicle around the given chassis
    pub fn new(chassis: RigidBody) -> Self {
        Self {
            chassis: Arc::new(chassis),
            wheels: Vec::new(),
        }
    }

    /// Adds a wheel; wheels must be added before the vehicle is shared
    pub fn with_wheel(mut self, wheel: VehicleWheel) -> Self {
        self.wheels.push(wheel);
        self
    }

    /// Returns the id of the chassis, which identifies the vehicle
    pub fn id(&self) -> ObjectId {
        self.chassis.id()
    }

    /// Returns the chassis body
    pub fn chassis(&self) -> &Arc<RigidBody> {
        &self.chassis
    }

    /// Returns the wheels
    pub fn wheels(&self) -> &[VehicleWheel] {
        &self.wheels
    }
}
