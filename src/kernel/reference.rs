use crate::bodies::{Character, ConstraintId, GhostObject, ObjectId, ObjectKind, RigidBody, Vehicle};
use crate::constraints::Joint;
use crate::core::{ContactPoint, RayTestFlags, RayTestResult, SpaceConfig, SpaceId, SweepTestResult};
use crate::error::PhysicsError;
use crate::kernel::{KernelCallbacks, SimulationKernel};
use crate::math::{position_of, Aabb, Ray, Transform, Vector3, EPSILON};
use crate::shapes::CollisionShape;
use crate::Result;

use log::trace;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sweeps shorter than this report no hits
pub const MIN_SWEEP_DISTANCE: f32 = 0.4;

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Slack added to `accumulated / accuracy` so exact multiples are not lost to rounding
const STEP_ROUNDING: f32 = 1.0e-4;

#[derive(Debug)]
struct BodyEntry {
    body: Arc<RigidBody>,

    /// Gravity in effect when the body was added
    gravity: Vector3,
}

#[derive(Debug)]
struct JointEntry {
    joint: Arc<Joint>,
    disable_linked_collision: bool,
}

/// Snapshot of one collidable taken at the start of pair generation
struct Collider {
    id: ObjectId,
    shape: CollisionShape,
    transform: Transform,
    body: Option<Arc<RigidBody>>,
    responds: bool,
}

impl Collider {
    fn inverse_mass(&self) -> f32 {
        match &self.body {
            Some(body) if self.responds => 1.0 / body.mass(),
            _ => 0.0,
        }
    }
}

/// Software kernel with fixed sub-stepping and simple sphere/box contacts.
///
/// Integration is semi-implicit Euler. Every body keeps the gravity that was
/// in effect when it was added, so changing the gravity only affects bodies
/// added afterwards. Joints are registered and suppress collisions between
/// their bodies when asked to, but are not solved. Vehicle constraints are
/// tracked by id only. A body that is already kinematic when it is inserted
/// is refused.
#[derive(Debug)]
pub struct ReferenceKernel {
    world: Option<SpaceId>,
    world_bounds: Option<Aabb>,
    unsupported: Vec<ObjectKind>,
    gravity: Vector3,
    solver_iterations: u32,
    accumulator: f32,
    bodies: BTreeMap<ObjectId, BodyEntry>,
    ghosts: BTreeMap<ObjectId, Arc<GhostObject>>,
    characters: BTreeMap<ObjectId, Arc<Character>>,
    joints: BTreeMap<ObjectId, JointEntry>,
    vehicles: HashMap<ConstraintId, Arc<Vehicle>>,
    active_vehicles: HashSet<ConstraintId>,
    next_constraint: u64,
    contact_lifetimes: HashMap<(ObjectId, ObjectId), u32>,
    steps_taken: u64,
}

impl Default for ReferenceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceKernel {
    /// Creates a kernel with no world yet
    pub fn new() -> Self {
        Self {
            world: None,
            world_bounds: None,
            unsupported: Vec::new(),
            gravity: Vector3::zeros(),
            solver_iterations: 10,
            accumulator: 0.0,
            bodies: BTreeMap::new(),
            ghosts: BTreeMap::new(),
            characters: BTreeMap::new(),
            joints: BTreeMap::new(),
            vehicles: HashMap::new(),
            active_vehicles: HashSet::new(),
            next_constraint: 1,
            contact_lifetimes: HashMap::new(),
            steps_taken: 0,
        }
    }

    /// Returns a kernel that refuses objects of `kind`
    pub fn without(mut self, kind: ObjectKind) -> Self {
        if !self.unsupported.contains(&kind) {
            self.unsupported.push(kind);
        }
        self
    }

    /// Returns the total number of sub-steps taken since the world was created
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    fn ensure_world(&self) -> Result<()> {
        match self.world {
            Some(_) => Ok(()),
            None => Err(PhysicsError::KernelError("no world has been created".into())),
        }
    }

    fn ensure_supported(&self, kind: ObjectKind) -> Result<()> {
        if self.unsupported.contains(&kind) {
            return Err(PhysicsError::KernelError(format!("{} objects are not supported", kind)));
        }
        Ok(())
    }

    fn sub_step(&mut self, time_step: f32, callbacks: &mut dyn KernelCallbacks) {
        callbacks.pre_tick(&mut *self, time_step);

        self.integrate(time_step);
        self.move_characters();

        let colliders = self.colliders();
        let contacts = self.find_contacts(&colliders, callbacks);
        self.resolve_contacts(&colliders, &contacts);

        self.steps_taken += 1;
        trace!("Sub-step {} took {} contacts", self.steps_taken, contacts.len());

        callbacks.post_tick(&mut *self, time_step);
    }

    fn integrate(&mut self, time_step: f32) {
        for entry in self.bodies.values() {
            let body = &entry.body;
            let movable = !body.is_static() && !body.is_kinematic();
            let mass = body.mass();
            let gravity = entry.gravity;

            body.update_motion(|motion| {
                if movable {
                    let acceleration = gravity + motion.total_force / mass;
                    motion.linear_velocity += acceleration * time_step;
                    motion.transform.translation.vector += motion.linear_velocity * time_step;
                }
                motion.total_force = Vector3::zeros();
            });
        }
    }

    fn move_characters(&mut self) {
        for character in self.characters.values() {
            let walk = character.walk_direction();
            if walk.norm_squared() > 0.0 {
                let mut transform = character.transform();
                transform.translation.vector += walk;
                character.set_transform(transform);
            }
        }
    }

    fn colliders(&self) -> Vec<Collider> {
        let mut colliders: Vec<Collider> = Vec::with_capacity(
            self.bodies.len() + self.ghosts.len() + self.characters.len(),
        );

        for (id, entry) in &self.bodies {
            let body = &entry.body;
            colliders.push(Collider {
                id: *id,
                shape: body.shape(),
                transform: body.transform(),
                body: Some(Arc::clone(body)),
                responds: !body.is_static() && !body.is_kinematic(),
            });
        }
        for (id, ghost) in &self.ghosts {
            colliders.push(Collider {
                id: *id,
                shape: ghost.shape(),
                transform: ghost.transform(),
                body: None,
                responds: false,
            });
        }
        for (id, character) in &self.characters {
            colliders.push(Collider {
                id: *id,
                shape: character.shape(),
                transform: character.transform(),
                body: None,
                responds: false,
            });
        }

        if let Some(bounds) = &self.world_bounds {
            colliders.retain(|collider| {
                bounds.contains_point(position_of(&collider.transform))
            });
        }

        colliders.sort_by_key(|collider| collider.id);
        colliders
    }

    fn linked_without_collision(&self, a: ObjectId, b: ObjectId) -> bool {
        self.joints.values().any(|entry| {
            entry.disable_linked_collision && entry.joint.involves_body(a) && entry.joint.involves_body(b)
        })
    }

    fn find_contacts(
        &mut self,
        colliders: &[Collider],
        callbacks: &mut dyn KernelCallbacks,
    ) -> Vec<(usize, usize, ContactPoint)> {
        let mut contacts = Vec::new();
        let mut touching = HashSet::new();

        for i in 0..colliders.len() {
            for j in (i + 1)..colliders.len() {
                let a = &colliders[i];
                let b = &colliders[j];

                // Two bodies the kernel never moves generate nothing
                let a_moves = a.responds || a.body.is_none();
                let b_moves = b.responds || b.body.is_none();
                if !a_moves && !b_moves {
                    continue;
                }

                let bounds_a = a.shape.world_bounds(&a.transform);
                let bounds_b = b.shape.world_bounds(&b.transform);
                if !bounds_a.intersects(&bounds_b) {
                    continue;
                }

                if self.linked_without_collision(a.id, b.id) {
                    continue;
                }

                if !callbacks.need_collision(a.id, b.id) {
                    continue;
                }

                if let Some(mut contact) = contact_between(a, b) {
                    let key = (a.id, b.id);
                    let lifetime = self.contact_lifetimes.entry(key).or_insert(0);
                    *lifetime += 1;
                    contact.lifetime = *lifetime;
                    touching.insert(key);

                    callbacks.on_contact(a.id, b.id, &contact);
                    contacts.push((i, j, contact));
                }
            }
        }

        self.contact_lifetimes.retain(|key, _| touching.contains(key));
        contacts
    }

    fn resolve_contacts(&self, colliders: &[Collider], contacts: &[(usize, usize, ContactPoint)]) {
        for (i, j, contact) in contacts {
            let a = &colliders[*i];
            let b = &colliders[*j];
            let inv_a = a.inverse_mass();
            let inv_b = b.inverse_mass();
            let inv_sum = inv_a + inv_b;
            if inv_sum <= 0.0 {
                continue;
            }

            let normal = contact.normal_world_on_b;
            let depth = (-contact.distance).max(0.0);

            // Push apart along the normal, proportionally to inverse mass
            if depth > 0.0 {
                let correction = normal * (depth / inv_sum);
                if let Some(body) = a.body.as_ref().filter(|_| inv_a > 0.0) {
                    body.update_motion(|m| m.transform.translation.vector += correction * inv_a);
                }
                if let Some(body) = b.body.as_ref().filter(|_| inv_b > 0.0) {
                    body.update_motion(|m| m.transform.translation.vector -= correction * inv_b);
                }
            }

            for _ in 0..self.solver_iterations.max(1) {
                let velocity_a = a.body.as_ref().map(|body| body.linear_velocity()).unwrap_or_else(Vector3::zeros);
                let velocity_b = b.body.as_ref().map(|body| body.linear_velocity()).unwrap_or_else(Vector3::zeros);
                let approaching = (velocity_a - velocity_b).dot(&normal);
                if approaching >= 0.0 {
                    break;
                }

                let impulse = normal * (-approaching / inv_sum);
                if let Some(body) = a.body.as_ref().filter(|_| inv_a > 0.0) {
                    body.set_linear_velocity(velocity_a + impulse * inv_a);
                }
                if let Some(body) = b.body.as_ref().filter(|_| inv_b > 0.0) {
                    body.set_linear_velocity(velocity_b - impulse * inv_b);
                }
            }
        }
    }

    fn sweep_targets(&self) -> Vec<(ObjectId, Vector3, f32)> {
        let mut targets: Vec<(ObjectId, Vector3, f32)> = Vec::new();
        for (id, entry) in &self.bodies {
            targets.push((*id, entry.body.physics_location(), entry.body.shape().bounding_radius()));
        }
        for (id, ghost) in &self.ghosts {
            targets.push((*id, position_of(&ghost.transform()), ghost.shape().bounding_radius()));
        }
        for (id, character) in &self.characters {
            targets.push((*id, position_of(&character.transform()), character.shape().bounding_radius()));
        }
        targets.sort_by_key(|(id, _, _)| *id);
        targets
    }
}

impl SimulationKernel for ReferenceKernel {
    fn create_world(&mut self, config: &SpaceConfig) -> Result<SpaceId> {
        if self.world.is_some() {
            return Err(PhysicsError::KernelError("world already created".into()));
        }
        config.validate()?;

        let raw = NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed);
        let id = NonZeroU64::new(raw)
            .map(SpaceId)
            .ok_or_else(|| PhysicsError::KernelError("world id space exhausted".into()))?;

        self.world = Some(id);
        self.world_bounds = if config.broadphase.is_bounded() {
            Some(Aabb::new(config.world_min, config.world_max))
        } else {
            None
        };
        self.gravity = config.gravity;
        self.solver_iterations = config.solver_iterations;
        self.accumulator = 0.0;
        Ok(id)
    }

    fn destroy_world(&mut self) {
        self.world = None;
        self.world_bounds = None;
        self.bodies.clear();
        self.ghosts.clear();
        self.characters.clear();
        self.joints.clear();
        self.vehicles.clear();
        self.active_vehicles.clear();
        self.contact_lifetimes.clear();
        self.accumulator = 0.0;
    }

    fn supports(&self, kind: ObjectKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    fn step_simulation(
        &mut self,
        time: f32,
        max_steps: u32,
        accuracy: f32,
        callbacks: &mut dyn KernelCallbacks,
    ) -> u32 {
        if self.world.is_none() || !(time > 0.0) {
            return 0;
        }

        if max_steps == 0 {
            self.sub_step(time, callbacks);
            return 1;
        }

        self.accumulator += time;
        let due = (self.accumulator / accuracy + STEP_ROUNDING).floor() as u32;
        self.accumulator = (self.accumulator - due as f32 * accuracy).max(0.0);

        // Time beyond the cap is dropped
        let steps = due.min(max_steps);
        for _ in 0..steps {
            self.sub_step(accuracy, callbacks);
        }
        steps
    }

    fn set_gravity(&mut self, gravity: Vector3) {
        self.gravity = gravity;
    }

    fn set_solver_iterations(&mut self, iterations: u32) {
        self.solver_iterations = iterations;
    }

    fn add_collision_object(&mut self, ghost: &Arc<GhostObject>) -> Result<()> {
        self.ensure_world()?;
        self.ensure_supported(ObjectKind::Ghost)?;
        if self.ghosts.insert(ghost.id(), Arc::clone(ghost)).is_some() {
            return Err(PhysicsError::KernelError(format!("ghost {} added twice", ghost.id())));
        }
        Ok(())
    }

    fn remove_collision_object(&mut self, id: ObjectId) -> Result<()> {
        self.ghosts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PhysicsError::KernelError(format!("ghost {} is not in the world", id)))
    }

    fn add_rigid_body(&mut self, body: &Arc<RigidBody>) -> Result<()> {
        self.ensure_world()?;
        self.ensure_supported(ObjectKind::RigidBody)?;
        if body.is_kinematic() {
            return Err(PhysicsError::KernelError(format!(
                "body {} must be inserted before it is made kinematic",
                body.id()
            )));
        }

        let entry = BodyEntry {
            body: Arc::clone(body),
            gravity: self.gravity,
        };
        if self.bodies.insert(body.id(), entry).is_some() {
            return Err(PhysicsError::KernelError(format!("body {} added twice", body.id())));
        }
        Ok(())
    }

    fn remove_rigid_body(&mut self, id: ObjectId) -> Result<()> {
        self.bodies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PhysicsError::KernelError(format!("body {} is not in the world", id)))
    }

    fn add_character(&mut self, character: &Arc<Character>) -> Result<()> {
        self.ensure_world()?;
        self.ensure_supported(ObjectKind::Character)?;
        if self.characters.insert(character.id(), Arc::clone(character)).is_some() {
            return Err(PhysicsError::KernelError(format!("character {} added twice", character.id())));
        }
        Ok(())
    }

    fn remove_character(&mut self, id: ObjectId) -> Result<()> {
        self.characters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PhysicsError::KernelError(format!("character {} is not in the world", id)))
    }

    fn create_vehicle(&mut self, vehicle: &Arc<Vehicle>) -> Result<ConstraintId> {
        self.ensure_world()?;
        self.ensure_supported(ObjectKind::Vehicle)?;
        if !self.bodies.contains_key(&vehicle.id()) {
            return Err(PhysicsError::KernelError(format!(
                "chassis {} must be in the world before its vehicle is created",
                vehicle.id()
            )));
        }

        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.vehicles.insert(id, Arc::clone(vehicle));
        Ok(id)
    }

    fn add_vehicle(&mut self, constraint: ConstraintId) -> Result<()> {
        if !self.vehicles.contains_key(&constraint) {
            return Err(PhysicsError::KernelError(format!("unknown vehicle constraint {}", constraint)));
        }
        self.active_vehicles.insert(constraint);
        Ok(())
    }

    fn remove_vehicle(&mut self, constraint: ConstraintId) -> Result<()> {
        if self.vehicles.remove(&constraint).is_none() {
            return Err(PhysicsError::KernelError(format!("unknown vehicle constraint {}", constraint)));
        }
        self.active_vehicles.remove(&constraint);
        Ok(())
    }

    fn add_joint(&mut self, joint: &Arc<Joint>, disable_linked_collision: bool) -> Result<()> {
        self.ensure_world()?;
        self.ensure_supported(ObjectKind::Joint)?;
        let entry = JointEntry {
            joint: Arc::clone(joint),
            disable_linked_collision,
        };
        if self.joints.insert(joint.id(), entry).is_some() {
            return Err(PhysicsError::KernelError(format!("joint {} added twice", joint.id())));
        }
        Ok(())
    }

    fn remove_joint(&mut self, id: ObjectId) -> Result<()> {
        self.joints
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PhysicsError::KernelError(format!("joint {} is not in the world", id)))
    }

    fn ray_test(&self, from: Vector3, to: Vector3, _flags: RayTestFlags) -> Vec<RayTestResult> {
        // Only convex shapes exist here, so the triangle flags change nothing
        let ray = Ray::from_segment(from, to);
        if ray.length() < EPSILON {
            return Vec::new();
        }

        let mut results = Vec::new();
        for collider in self.colliders() {
            if let Some((fraction, normal)) = collider.shape.intersect_ray(&ray, &collider.transform) {
                if (0.0..=1.0).contains(&fraction) {
                    results.push(RayTestResult {
                        object: collider.id,
                        hit_fraction: fraction,
                        hit_normal: normal,
                        normal_in_world_space: true,
                    });
                }
            }
        }
        results
    }

    fn sweep_test(
        &self,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
    ) -> Vec<SweepTestResult> {
        let from = position_of(start);
        let to = position_of(end);
        let travel = to - from;
        if travel.norm() < MIN_SWEEP_DISTANCE {
            return Vec::new();
        }

        let ray = Ray::from_segment(from, to);
        let radius = shape.bounding_radius();
        let mut results = Vec::new();

        for (id, center, target_radius) in self.sweep_targets() {
            let combined = radius + target_radius - allowed_penetration.max(0.0);
            if combined <= 0.0 {
                continue;
            }
            let (enter, exit) = match ray.intersect_sphere(center, combined) {
                Some(hit) => hit,
                None => continue,
            };
            if exit < 0.0 || enter > 1.0 {
                continue;
            }

            if enter < 0.0 {
                // Started inside: only a sweep heading toward the center registers
                if travel.dot(&(center - from)) <= 0.0 {
                    continue;
                }
                let normal = (from - center)
                    .try_normalize(EPSILON)
                    .unwrap_or_else(|| -travel.normalize());
                results.push(SweepTestResult {
                    object: id,
                    hit_fraction: 0.0,
                    hit_normal: normal,
                    normal_in_world_space: true,
                });
                continue;
            }

            let normal = (ray.point_at(enter) - center)
                .try_normalize(EPSILON)
                .unwrap_or_else(|| -travel.normalize());
            results.push(SweepTestResult {
                object: id,
                hit_fraction: enter,
                hit_normal: normal,
                normal_in_world_space: true,
            });
        }
        results
    }
}

fn contact_between(a: &Collider, b: &Collider) -> Option<ContactPoint> {
    match (a.shape, b.shape) {
        (CollisionShape::Sphere { radius: ra }, CollisionShape::Sphere { radius: rb }) => {
            sphere_sphere(position_of(&a.transform), ra, position_of(&b.transform), rb)
        }
        (CollisionShape::Sphere { radius }, CollisionShape::Box { half_extents }) => {
            sphere_box(position_of(&a.transform), radius, &b.transform, half_extents)
        }
        (CollisionShape::Box { half_extents }, CollisionShape::Sphere { radius }) => {
            sphere_box(position_of(&b.transform), radius, &a.transform, half_extents).map(flipped)
        }
        (CollisionShape::Box { .. }, CollisionShape::Box { .. }) => box_box(a, b),
    }
}

/// Swaps the roles of A and B in a contact
fn flipped(contact: ContactPoint) -> ContactPoint {
    ContactPoint {
        position_world_on_a: contact.position_world_on_b,
        position_world_on_b: contact.position_world_on_a,
        normal_world_on_b: -contact.normal_world_on_b,
        ..contact
    }
}

fn sphere_sphere(center_a: Vector3, radius_a: f32, center_b: Vector3, radius_b: f32) -> Option<ContactPoint> {
    let delta = center_a - center_b;
    let distance = delta.norm();
    if distance > radius_a + radius_b {
        return None;
    }

    let normal = if distance > EPSILON {
        delta / distance
    } else {
        Vector3::y()
    };

    Some(ContactPoint {
        position_world_on_a: center_a - normal * radius_a,
        position_world_on_b: center_b + normal * radius_b,
        normal_world_on_b: normal,
        distance: distance - radius_a - radius_b,
        ..ContactPoint::default()
    })
}

/// Sphere (as A) against an oriented box (as B)
fn sphere_box(center: Vector3, radius: f32, box_transform: &Transform, half_extents: Vector3) -> Option<ContactPoint> {
    let local = box_transform.inverse_transform_point(&center.into()).coords;
    let mut closest = local.zip_map(&half_extents, |c, h| c.clamp(-h, h));
    let offset = local - closest;
    let distance = offset.norm();
    if distance > radius {
        return None;
    }

    let (local_normal, separation) = if distance > EPSILON {
        (offset / distance, distance - radius)
    } else {
        // Center inside the box: leave through the nearest face
        let mut axis = 0;
        let mut face_distance = f32::INFINITY;
        for i in 0..3 {
            let d = half_extents[i] - local[i].abs();
            if d < face_distance {
                face_distance = d;
                axis = i;
            }
        }
        let sign = if local[axis] < 0.0 { -1.0 } else { 1.0 };
        closest[axis] = sign * half_extents[axis];
        let mut normal = Vector3::zeros();
        normal[axis] = sign;
        (normal, -(face_distance + radius))
    };

    let normal = box_transform.transform_vector(&local_normal);
    Some(ContactPoint {
        position_world_on_a: center - normal * radius,
        position_world_on_b: box_transform.transform_point(&closest.into()).coords,
        normal_world_on_b: normal,
        distance: separation,
        ..ContactPoint::default()
    })
}

/// Boxes are compared by their world bounds and separated along the shallowest axis
fn box_box(a: &Collider, b: &Collider) -> Option<ContactPoint> {
    let bounds_a = a.shape.world_bounds(&a.transform);
    let bounds_b = b.shape.world_bounds(&b.transform);
    let overlap = bounds_a.overlap(&bounds_b)?;

    let axis = overlap.imin();
    let depth = overlap[axis];
    let sign = if bounds_a.center()[axis] < bounds_b.center()[axis] { -1.0 } else { 1.0 };
    let mut normal = Vector3::zeros();
    normal[axis] = sign;

    let point_on_b = bounds_b.closest_point(bounds_a.center());
    Some(ContactPoint {
        position_world_on_a: point_on_b - normal * depth,
        position_world_on_b: point_on_b,
        normal_world_on_b: normal,
        distance: -depth,
        ..ContactPoint::default()
    })
}
