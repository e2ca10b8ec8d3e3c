#![allow(dead_code)]

use log::{Level, LevelFilter, Log, Metadata, Record};
use phys_space::bodies::{Character, ConstraintId, GhostObject, ObjectId, ObjectKind, RigidBody, Vehicle};
use phys_space::constraints::Joint;
use phys_space::core::{ContactPoint, RayTestFlags, RayTestResult, SpaceConfig, SpaceId, SweepTestResult};
use phys_space::kernel::{KernelCallbacks, SimulationKernel};
use phys_space::math::{Transform, Vector3};
use phys_space::shapes::CollisionShape;
use phys_space::error::PhysicsError;
use phys_space::{Result, SimulationSpace};
use std::cell::RefCell;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, Once};

/// One call received by a [`RecordingKernel`]
#[derive(Debug, Clone, PartialEq)]
pub enum KernelCall {
    CreateWorld,
    DestroyWorld,
    Step { time: f32, max_steps: u32 },
    SetGravity(Vector3),
    SetSolverIterations(u32),
    AddGhost(ObjectId),
    RemoveGhost(ObjectId),
    AddRigidBody { id: ObjectId, kinematic: bool },
    RemoveRigidBody(ObjectId),
    AddCharacter(ObjectId),
    RemoveCharacter(ObjectId),
    CreateVehicle(ObjectId),
    AddVehicle(ConstraintId),
    RemoveVehicle(ConstraintId),
    AddJoint { id: ObjectId, disable_linked_collision: bool },
    RemoveJoint(ObjectId),
}

/// Calls seen by a kernel, readable after the kernel moved into a space
#[derive(Debug, Clone, Default)]
pub struct KernelLog {
    calls: Arc<Mutex<Vec<KernelCall>>>,
}

impl KernelLog {
    pub fn calls(&self) -> Vec<KernelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&KernelCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn position(&self, call: &KernelCall) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn push(&self, call: KernelCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Test double that records every call and replays scripted results.
///
/// Every `step_simulation` takes `floor(time / accuracy)` sub-steps (capped),
/// and each sub-step offers every scripted contact to `need_collision`
/// before reporting it.
pub struct RecordingKernel {
    log: KernelLog,
    unsupported: Vec<ObjectKind>,
    contacts: Vec<(ObjectId, ObjectId)>,
    ray_hits: Vec<RayTestResult>,
    sweep_hits: Vec<SweepTestResult>,
    stuck_bodies: Vec<ObjectId>,
    next_constraint: u64,
}

impl RecordingKernel {
    pub fn new() -> (Self, KernelLog) {
        let log = KernelLog::default();
        let kernel = Self {
            log: log.clone(),
            unsupported: Vec::new(),
            contacts: Vec::new(),
            ray_hits: Vec::new(),
            sweep_hits: Vec::new(),
            stuck_bodies: Vec::new(),
            next_constraint: 100,
        };
        (kernel, log)
    }

    pub fn without(mut self, kind: ObjectKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    pub fn with_contact(mut self, a: ObjectId, b: ObjectId) -> Self {
        self.contacts.push((a, b));
        self
    }

    pub fn with_ray_hits(mut self, hits: Vec<RayTestResult>) -> Self {
        self.ray_hits = hits;
        self
    }

    pub fn with_sweep_hits(mut self, hits: Vec<SweepTestResult>) -> Self {
        self.sweep_hits = hits;
        self
    }

    /// Makes every `remove_rigid_body` for `id` fail
    pub fn with_stuck_body(mut self, id: ObjectId) -> Self {
        self.stuck_bodies.push(id);
        self
    }

    /// Creates a space on this kernel with a 1/60 s sub-step
    pub fn into_space(self) -> Arc<SimulationSpace> {
        SimulationSpace::create(SpaceConfig::default(), Box::new(self)).unwrap()
    }
}

impl SimulationKernel for RecordingKernel {
    fn create_world(&mut self, _config: &SpaceConfig) -> Result<SpaceId> {
        self.log.push(KernelCall::CreateWorld);
        Ok(SpaceId(NonZeroU64::new(42).unwrap()))
    }

    fn destroy_world(&mut self) {
        self.log.push(KernelCall::DestroyWorld);
    }

    fn supports(&self, kind: ObjectKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    fn step_simulation(&mut self, time: f32, max_steps: u32, accuracy: f32, callbacks: &mut dyn KernelCallbacks) -> u32 {
        self.log.push(KernelCall::Step { time, max_steps });
        let steps = if max_steps == 0 {
            1
        } else {
            ((time / accuracy + 1.0e-4).floor() as u32).min(max_steps)
        };
        let step_time = if max_steps == 0 { time } else { accuracy };

        for _ in 0..steps {
            callbacks.pre_tick(&mut *self, step_time);
            for (a, b) in self.contacts.clone() {
                if callbacks.need_collision(a, b) {
                    let contact = ContactPoint {
                        distance: -0.01,
                        ..ContactPoint::default()
                    };
                    callbacks.on_contact(a, b, &contact);
                }
            }
            callbacks.post_tick(&mut *self, step_time);
        }
        steps
    }

    fn set_gravity(&mut self, gravity: Vector3) {
        self.log.push(KernelCall::SetGravity(gravity));
    }

    fn set_solver_iterations(&mut self, iterations: u32) {
        self.log.push(KernelCall::SetSolverIterations(iterations));
    }

    fn add_collision_object(&mut self, ghost: &Arc<GhostObject>) -> Result<()> {
        self.log.push(KernelCall::AddGhost(ghost.id()));
        Ok(())
    }

    fn remove_collision_object(&mut self, id: ObjectId) -> Result<()> {
        self.log.push(KernelCall::RemoveGhost(id));
        Ok(())
    }

    fn add_rigid_body(&mut self, body: &Arc<RigidBody>) -> Result<()> {
        self.log.push(KernelCall::AddRigidBody {
            id: body.id(),
            kinematic: body.is_kinematic(),
        });
        Ok(())
    }

    fn remove_rigid_body(&mut self, id: ObjectId) -> Result<()> {
        self.log.push(KernelCall::RemoveRigidBody(id));
        if self.stuck_bodies.contains(&id) {
            return Err(PhysicsError::KernelError(format!("body {} cannot be removed", id)));
        }
        Ok(())
    }

    fn add_character(&mut self, character: &Arc<Character>) -> Result<()> {
        self.log.push(KernelCall::AddCharacter(character.id()));
        Ok(())
    }

    fn remove_character(&mut self, id: ObjectId) -> Result<()> {
        self.log.push(KernelCall::RemoveCharacter(id));
        Ok(())
    }

    fn create_vehicle(&mut self, vehicle: &Arc<Vehicle>) -> Result<ConstraintId> {
        self.log.push(KernelCall::CreateVehicle(vehicle.id()));
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        Ok(id)
    }

    fn add_vehicle(&mut self, constraint: ConstraintId) -> Result<()> {
        self.log.push(KernelCall::AddVehicle(constraint));
        Ok(())
    }

    fn remove_vehicle(&mut self, constraint: ConstraintId) -> Result<()> {
        self.log.push(KernelCall::RemoveVehicle(constraint));
        Ok(())
    }

    fn add_joint(&mut self, joint: &Arc<Joint>, disable_linked_collision: bool) -> Result<()> {
        self.log.push(KernelCall::AddJoint {
            id: joint.id(),
            disable_linked_collision,
        });
        Ok(())
    }

    fn remove_joint(&mut self, id: ObjectId) -> Result<()> {
        self.log.push(KernelCall::RemoveJoint(id));
        Ok(())
    }

    fn ray_test(&self, _from: Vector3, _to: Vector3, _flags: RayTestFlags) -> Vec<RayTestResult> {
        self.ray_hits.clone()
    }

    fn sweep_test(
        &self,
        _shape: &CollisionShape,
        _start: &Transform,
        _end: &Transform,
        _allowed_penetration: f32,
    ) -> Vec<SweepTestResult> {
        self.sweep_hits.clone()
    }
}

/// A ray hit on `object` at `fraction`, for scripting
pub fn ray_hit(object: ObjectId, fraction: f32) -> RayTestResult {
    RayTestResult {
        object,
        hit_fraction: fraction,
        hit_normal: Vector3::y(),
        normal_in_world_space: true,
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.target().starts_with("phys_space") {
            let line = record.args().to_string();
            CAPTURED.with(|captured| captured.borrow_mut().push((record.level(), line)));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;
static INIT: Once = Once::new();

/// Installs the capturing logger (once per process) and clears this thread's records
pub fn capture_logs() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Messages logged on this thread at `level` since [`capture_logs`]
pub fn logged(level: Level) -> Vec<String> {
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

pub fn warnings() -> Vec<String> {
    logged(Level::Warn)
}

pub fn errors() -> Vec<String> {
    logged(Level::Error)
}

/// Creates a space on the reference kernel with gravity switched off
pub fn weightless_space() -> Arc<SimulationSpace> {
    let config = SpaceConfig::default().with_gravity(Vector3::zeros());
    SimulationSpace::with_reference_kernel(config).unwrap()
}

/// A dynamic unit sphere at `position`
pub fn sphere_at(position: Vector3) -> Arc<RigidBody> {
    Arc::new(RigidBody::new_dynamic(CollisionShape::sphere(1.0), 1.0, position))
}

/// A static sphere of `radius` at `position`
pub fn static_sphere_at(position: Vector3, radius: f32) -> Arc<RigidBody> {
    Arc::new(RigidBody::new_static(CollisionShape::sphere(radius), position))
}
