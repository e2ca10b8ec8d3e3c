use crate::bodies::{ObjectId, ObjectKind, RigidBody, SpaceObject, Vehicle};
use crate::core::query::{QueryEngine, RayTestResult, SweepTestResult};
use crate::core::scene::{self, SceneNode};
use crate::core::space::SimulationSpace;
use crate::core::task_queue::TaskHandle;
use crate::core::ContactPoint;
use crate::kernel::{KernelCallbacks, SimulationKernel};
use crate::math::{Transform, Vector3};
use crate::shapes::CollisionShape;
use crate::Result;

use log::{debug, error, warn};
use std::sync::Arc;

/// Access to a space while its kernel is lent out.
///
/// Tasks and tick listeners receive a context during a step; the space also
/// builds one when a mutation can be applied right away. Everything here
/// runs on the thread that owns the space.
pub struct StepContext<'a> {
    space: &'a SimulationSpace,
    kernel: &'a mut dyn SimulationKernel,
    time_step: f32,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(space: &'a SimulationSpace, kernel: &'a mut dyn SimulationKernel, time_step: f32) -> Self {
        Self {
            space,
            kernel,
            time_step,
        }
    }

    /// Returns the space being stepped
    pub fn space(&self) -> &'a SimulationSpace {
        self.space
    }

    /// Returns the length of the current sub-step (0 outside a step)
    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Adds an object to the space; a duplicate add only logs a warning
    pub fn add(&mut self, object: impl Into<SpaceObject>) -> Result<()> {
        add_object(self.space, &mut *self.kernel, object.into())
    }

    /// Removes an object from the space; removing an absent object only logs a warning.
    ///
    /// Joints attached to a removed body are left in place.
    pub fn remove(&mut self, object: impl Into<SpaceObject>) -> Result<()> {
        remove_object(self.space, &mut *self.kernel, object.into())
    }

    /// Adds every physics control under `root`, depth first, parent before children
    pub fn add_all(&mut self, root: &dyn SceneNode) -> Result<()> {
        for object in scene::collect_for_add(root) {
            self.add(object)?;
        }
        Ok(())
    }

    /// Removes every physics control under `root` and the joints they anchor
    pub fn remove_all(&mut self, root: &dyn SceneNode) -> Result<()> {
        for object in scene::collect_for_remove(root) {
            self.remove(object)?;
        }
        Ok(())
    }

    /// Ray test against the world as it is right now, nearest hit first
    pub fn ray_test(&self, from: Vector3, to: Vector3) -> Vec<RayTestResult> {
        QueryEngine::ray_test(&*self.kernel, from, to, self.space.ray_test_flags())
    }

    /// Ray test in discovery order
    pub fn ray_test_raw(&self, from: Vector3, to: Vector3) -> Vec<RayTestResult> {
        QueryEngine::ray_test_raw(&*self.kernel, from, to, self.space.ray_test_flags())
    }

    pub fn sweep_test(
        &self,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
    ) -> Vec<SweepTestResult> {
        QueryEngine::sweep_test(&*self.kernel, shape, start, end, allowed_penetration)
    }

    /// Queues follow-up work for the next step
    pub fn enqueue<V, F>(&self, work: F) -> TaskHandle<V>
    where
        V: Send + 'static,
        F: FnOnce(&mut StepContext<'_>) -> V + Send + 'static,
    {
        self.space.enqueue(work)
    }

    pub(crate) fn kernel(&mut self) -> &mut dyn SimulationKernel {
        &mut *self.kernel
    }
}

/// Adds a rigid body, inserting kinematic bodies as dynamic first
fn add_rigid_body(kernel: &mut dyn SimulationKernel, body: &Arc<RigidBody>) -> Result<()> {
    let kinematic = body.is_kinematic();
    if kinematic {
        body.set_kinematic(false);
    }
    let added = kernel.add_rigid_body(body);
    if kinematic {
        body.set_kinematic(true);
    }
    added
}

fn add_to_kernel(space: &SimulationSpace, kernel: &mut dyn SimulationKernel, object: &SpaceObject) -> Result<()> {
    match object {
        SpaceObject::Ghost(ghost) => kernel.add_collision_object(ghost),
        SpaceObject::RigidBody(body) => add_rigid_body(kernel, body),
        SpaceObject::Character(character) => kernel.add_character(character),
        SpaceObject::Joint(joint) => kernel.add_joint(joint, !joint.is_collision_between_linked_bodies()),
        SpaceObject::Vehicle(vehicle) => {
            add_rigid_body(kernel, vehicle.chassis())?;
            match add_vehicle_constraint(space, kernel, vehicle) {
                Ok(()) => Ok(()),
                Err(err) => {
                    // Leave the kernel as it was
                    let _ = kernel.remove_rigid_body(vehicle.id());
                    Err(err)
                }
            }
        }
    }
}

/// Creates this space's constraint for a vehicle whose chassis is already in the kernel
fn add_vehicle_constraint(space: &SimulationSpace, kernel: &mut dyn SimulationKernel, vehicle: &Arc<Vehicle>) -> Result<()> {
    let constraint = kernel.create_vehicle(vehicle)?;
    if let Err(err) = kernel.add_vehicle(constraint) {
        let _ = kernel.remove_vehicle(constraint);
        return Err(err);
    }

    space.registry_mut().insert_vehicle_constraint(vehicle.id(), constraint);
    debug!("Added vehicle constraint {} for {} to space {}", constraint, vehicle.id(), space.id());
    Ok(())
}

/// Removes a vehicle's constraint, then its chassis. If the chassis cannot be
/// removed, a new constraint is put back so the vehicle stays whole.
fn remove_vehicle(space: &SimulationSpace, kernel: &mut dyn SimulationKernel, vehicle: &Arc<Vehicle>) -> Result<()> {
    let id = vehicle.id();
    let constraint = space.registry().vehicle_constraint(id);
    if let Some(constraint) = constraint {
        kernel.remove_vehicle(constraint)?;
        space.registry_mut().remove_vehicle_constraint(id);
        debug!("Removed vehicle constraint {} of {} from space {}", constraint, id, space.id());
    }

    if let Err(err) = kernel.remove_rigid_body(id) {
        if constraint.is_some() {
            if let Err(restore) = add_vehicle_constraint(space, kernel, vehicle) {
                error!("Vehicle {} in space {} lost its constraint: {}", id, space.id(), restore);
            }
        }
        return Err(err);
    }
    Ok(())
}

pub(crate) fn add_object(space: &SimulationSpace, kernel: &mut dyn SimulationKernel, object: SpaceObject) -> Result<()> {
    space.check_supported(object.kind(), "add")?;

    let id = object.id();
    let kind = object.kind();
    if !space.registry_mut().insert(object.clone()) {
        warn!("{} {} is already in space {}; not adding it again", kind, id, space.id());
        return Ok(());
    }

    if let Err(err) = add_to_kernel(space, kernel, &object) {
        space.registry_mut().remove(id);
        return Err(err);
    }

    debug!("Added {} {:x} to space {}", kind, id, space.id());
    Ok(())
}

pub(crate) fn remove_object(space: &SimulationSpace, kernel: &mut dyn SimulationKernel, object: SpaceObject) -> Result<()> {
    space.check_supported(object.kind(), "remove")?;

    let id = object.id();
    // A vehicle and its chassis share an id; the registered kind decides
    let registered = space.registry().kind_of(id);
    let kind = match registered {
        Some(kind) => kind,
        None => {
            warn!("{} {} is not in space {}; nothing to remove", object.kind(), id, space.id());
            return Ok(());
        }
    };

    match kind {
        ObjectKind::Ghost => kernel.remove_collision_object(id)?,
        ObjectKind::RigidBody => kernel.remove_rigid_body(id)?,
        ObjectKind::Character => kernel.remove_character(id)?,
        ObjectKind::Joint => kernel.remove_joint(id)?,
        ObjectKind::Vehicle => {
            let vehicle = space.registry().get(id).and_then(|o| o.as_vehicle().cloned());
            match vehicle {
                Some(vehicle) => remove_vehicle(space, kernel, &vehicle)?,
                None => kernel.remove_rigid_body(id)?,
            }
        }
    }

    space.registry_mut().remove(id);
    debug!("Removed {} {:x} from space {}", kind, id, space.id());
    Ok(())
}

/// Translates kernel callbacks into queue drains, listener calls and events
pub(crate) struct StepDriver<'s> {
    space: &'s SimulationSpace,
}

impl<'s> StepDriver<'s> {
    pub(crate) fn new(space: &'s SimulationSpace) -> Self {
        Self { space }
    }
}

impl KernelCallbacks for StepDriver<'_> {
    fn pre_tick(&mut self, kernel: &mut dyn SimulationKernel, time_step: f32) {
        let mut ctx = StepContext::new(self.space, kernel, time_step);
        self.space.task_queue().drain(&mut ctx);

        let listeners = self.space.listeners().tick_snapshot();
        for listener in listeners.iter() {
            listener.pre_tick(&mut ctx, time_step);
        }
    }

    fn post_tick(&mut self, kernel: &mut dyn SimulationKernel, time_step: f32) {
        let mut ctx = StepContext::new(self.space, kernel, time_step);
        let listeners = self.space.listeners().tick_snapshot();
        for listener in listeners.iter() {
            listener.post_tick(&mut ctx, time_step);
        }
    }

    fn on_contact(&mut self, object_a: ObjectId, object_b: ObjectId, contact: &ContactPoint) {
        self.space.push_event(object_a, object_b, contact);
    }

    fn need_collision(&mut self, object_a: ObjectId, object_b: ObjectId) -> bool {
        self.space.need_collision(object_a, object_b)
    }
}
