use crate::bodies::{Character, ConstraintId, GhostObject, ObjectId, ObjectKind, RigidBody, SpaceObject, Vehicle};
use crate::collision::{groups_overlap, CollisionGroup};
use crate::constraints::Joint;
use crate::core::context::{StepContext, StepDriver};
use crate::core::events::EventQueue;
use crate::core::listeners::{CollisionGroupListener, CollisionListener, ListenerRegistry, TickListener};
use crate::core::query::{QueryEngine, RayTestResult, SweepTestResult};
use crate::core::scene::{self, SceneNode};
use crate::core::storage::ObjectRegistry;
use crate::core::task_queue::{TaskHandle, TaskQueue};
use crate::core::{lock, read, write, BroadphaseType, ContactPoint, RayTestFlags, SpaceConfig, SpaceId, SpaceState};
use crate::error::PhysicsError;
use crate::kernel::{ReferenceKernel, SimulationKernel};
use crate::math::{Transform, Vector3};
use crate::shapes::CollisionShape;
use crate::Result;

use log::{debug, error, trace};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, ThreadId};

thread_local! {
    static CURRENT_SPACE: RefCell<Option<Weak<SimulationSpace>>> = RefCell::new(None);
}

fn set_current(space: Option<Weak<SimulationSpace>>) {
    CURRENT_SPACE.with(|slot| *slot.borrow_mut() = space);
}

/// Restores the step state when `update` returns or unwinds
struct StepGuard<'s> {
    space: &'s SimulationSpace,
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        self.space.set_state(SpaceState::EventsPending);
    }
}

/// A simulation world plus everything needed to use it from many threads.
///
/// One thread owns the space: the one that created it or last called
/// [`activate`](Self::activate). Only the owner may call [`update`](Self::update),
/// and mutations issued by the owner while no step is running apply at
/// once. Mutations from any other thread, or issued from inside a step, go
/// through the task queue and apply at the start of the next sub-step.
///
/// Collision events gathered during `update` are delivered by
/// [`distribute_events`](Self::distribute_events), never during the step.
pub struct SimulationSpace {
    id: SpaceId,
    this: Weak<SimulationSpace>,
    kernel: Mutex<Box<dyn SimulationKernel>>,
    supported: Vec<ObjectKind>,
    registry: RwLock<ObjectRegistry>,
    tasks: TaskQueue,
    listeners: ListenerRegistry,
    events: Mutex<EventQueue>,
    config: RwLock<SpaceConfig>,
    owner: Mutex<ThreadId>,
    state: AtomicU8,
    destroyed: AtomicBool,
}

impl SimulationSpace {
    /// Creates a space driven by `kernel` and makes it current on this thread
    pub fn create(config: SpaceConfig, mut kernel: Box<dyn SimulationKernel>) -> Result<Arc<Self>> {
        config.validate()?;
        let id = kernel.create_world(&config)?;
        kernel.set_solver_iterations(config.solver_iterations);

        let supported = ObjectKind::ALL
            .iter()
            .copied()
            .filter(|kind| kernel.supports(*kind))
            .collect();

        let space = Arc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            kernel: Mutex::new(kernel),
            supported,
            registry: RwLock::new(ObjectRegistry::new()),
            tasks: TaskQueue::new(),
            listeners: ListenerRegistry::new(),
            events: Mutex::new(EventQueue::new()),
            config: RwLock::new(config),
            owner: Mutex::new(thread::current().id()),
            state: AtomicU8::new(SpaceState::Idle as u8),
            destroyed: AtomicBool::new(false),
        });

        set_current(Some(Arc::downgrade(&space)));
        debug!("Created space {} ({:?} broadphase)", id, space.broadphase());
        Ok(space)
    }

    /// Creates a space on the bundled [`ReferenceKernel`]
    pub fn with_reference_kernel(config: SpaceConfig) -> Result<Arc<Self>> {
        Self::create(config, Box::new(ReferenceKernel::new()))
    }

    /// Creates a bounded world with the given broadphase on the bundled kernel
    pub fn create_bounded(world_min: Vector3, world_max: Vector3, broadphase: BroadphaseType) -> Result<Arc<Self>> {
        let config = SpaceConfig::bounded(world_min, world_max).with_broadphase(broadphase);
        Self::with_reference_kernel(config)
    }

    /// Returns the space current on this thread, if this thread still owns it
    pub fn current() -> Option<Arc<Self>> {
        CURRENT_SPACE
            .with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
            .filter(|space| !space.is_destroyed() && space.is_owner_thread())
    }

    /// Makes this space current on the calling thread, which becomes its owner
    pub fn activate(&self) {
        self.assert_alive();
        assert!(
            self.state() != SpaceState::Stepping,
            "space {} cannot change owner while a step is running",
            self.id
        );
        *lock(&self.owner) = thread::current().id();
        set_current(Some(self.this.clone()));
        debug!("Space {} is now owned by {:?}", self.id, thread::current().id());
    }

    /// Queues `work` on the space current on this thread
    pub fn enqueue_on_this_thread<V, F>(work: F) -> Result<TaskHandle<V>>
    where
        V: Send + 'static,
        F: FnOnce(&mut StepContext<'_>) -> V + Send + 'static,
    {
        let space = Self::current().ok_or(PhysicsError::NoActiveSpace)?;
        Ok(space.enqueue(work))
    }

    /// Returns the kernel's handle of this world
    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// Returns where the space is in its step cycle
    pub fn state(&self) -> SpaceState {
        SpaceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Returns whether the calling thread owns this space
    pub fn is_owner_thread(&self) -> bool {
        *lock(&self.owner) == thread::current().id()
    }

    /// Returns whether the kernel accepts objects of this kind
    pub fn supports(&self, kind: ObjectKind) -> bool {
        self.supported.contains(&kind)
    }

    /// Advances the world by `time` seconds using the configured sub-step cap.
    /// Returns the number of sub-steps taken.
    pub fn update(&self, time: f32) -> u32 {
        let max_steps = read(&self.config).max_sub_steps;
        self.update_with(time, max_steps)
    }

    /// Advances the world by `time` seconds in at most `max_steps` sub-steps.
    ///
    /// # Panics
    ///
    /// Panics when called off the owning thread, from inside a step, or
    /// after the space was destroyed.
    pub fn update_with(&self, time: f32, max_steps: u32) -> u32 {
        self.assert_alive();
        assert!(
            self.is_owner_thread(),
            "space {} may only be updated by its owning thread",
            self.id
        );
        assert!(
            self.state() != SpaceState::Stepping,
            "space {} is already stepping; update is not re-entrant",
            self.id
        );

        let accuracy = read(&self.config).accuracy;
        self.set_state(SpaceState::Stepping);
        let _guard = StepGuard { space: self };

        let mut kernel = lock(&self.kernel);
        let mut driver = StepDriver::new(self);
        let steps = kernel.step_simulation(time, max_steps, accuracy, &mut driver);
        trace!("Space {} took {} sub-steps for {}s", self.id, steps, time);
        steps
    }

    /// Delivers every queued collision event to the collision listeners, oldest first.
    ///
    /// # Panics
    ///
    /// Panics when called while a step is running.
    pub fn distribute_events(&self) {
        self.assert_alive();
        assert!(
            self.state() != SpaceState::Stepping,
            "collision events of space {} cannot be distributed during a step",
            self.id
        );

        let listeners = self.listeners.collision_snapshot();
        loop {
            let event = match lock(&self.events).pop() {
                Some(event) => event,
                None => break,
            };
            for listener in listeners.iter() {
                listener.collision(&event);
            }
            lock(&self.events).recycle(event);
        }
        self.set_state(SpaceState::Idle);
    }

    /// Frees the kernel world. The space must be empty.
    ///
    /// # Panics
    ///
    /// Panics when objects are still in the space, during a step, or when
    /// the space is already destroyed.
    pub fn destroy(&self) {
        self.assert_alive();
        assert!(
            self.state() != SpaceState::Stepping,
            "space {} cannot be destroyed during a step",
            self.id
        );
        let remaining = read(&self.registry).len();
        assert!(
            remaining == 0,
            "space {} still holds {} objects; remove them before destroying it",
            self.id,
            remaining
        );

        self.destroyed.store(true, Ordering::Release);
        lock(&self.kernel).destroy_world();
        write(&self.registry).clear();
        self.tasks.clear();
        self.listeners.clear();
        lock(&self.events).clear();

        CURRENT_SPACE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().map_or(false, |current| Weak::ptr_eq(current, &self.this)) {
                *slot = None;
            }
        });
        debug!("Destroyed space {}", self.id);
    }

    /// Adds an object, immediately on the owning thread or at the next step otherwise
    pub fn add(&self, object: impl Into<SpaceObject>) -> Result<()> {
        let object = object.into();
        self.check_supported(object.kind(), "add")?;
        self.with_context_or_defer("add", move |ctx| ctx.add(object))
    }

    /// Removes an object, immediately on the owning thread or at the next step otherwise.
    ///
    /// Joints attached to a removed body stay in the space; remove them first.
    pub fn remove(&self, object: impl Into<SpaceObject>) -> Result<()> {
        let object = object.into();
        self.check_supported(object.kind(), "remove")?;
        self.with_context_or_defer("remove", move |ctx| ctx.remove(object))
    }

    /// Adds every physics control under `root`, depth first, parent before children
    pub fn add_all(&self, root: &dyn SceneNode) -> Result<()> {
        let objects = scene::collect_for_add(root);
        for object in &objects {
            self.check_supported(object.kind(), "add")?;
        }
        self.with_context_or_defer("add_all", move |ctx| {
            for object in objects {
                ctx.add(object)?;
            }
            Ok(())
        })
    }

    /// Removes every physics control under `root`, along with the joints they anchor
    pub fn remove_all(&self, root: &dyn SceneNode) -> Result<()> {
        let objects = scene::collect_for_remove(root);
        for object in &objects {
            self.check_supported(object.kind(), "remove")?;
        }
        self.with_context_or_defer("remove_all", move |ctx| {
            for object in objects {
                ctx.remove(object)?;
            }
            Ok(())
        })
    }

    /// Queues work for the start of the next sub-step. Never blocks.
    pub fn enqueue<V, F>(&self, work: F) -> TaskHandle<V>
    where
        V: Send + 'static,
        F: FnOnce(&mut StepContext<'_>) -> V + Send + 'static,
    {
        self.assert_alive();
        self.tasks.push(work)
    }

    pub fn add_tick_listener(&self, listener: Arc<dyn TickListener>) {
        self.listeners.add_tick_listener(listener);
    }

    pub fn remove_tick_listener(&self, listener: &Arc<dyn TickListener>) -> bool {
        self.listeners.remove_tick_listener(listener)
    }

    pub fn add_collision_listener(&self, listener: Arc<dyn CollisionListener>) {
        self.listeners.add_collision_listener(listener);
    }

    pub fn remove_collision_listener(&self, listener: &Arc<dyn CollisionListener>) -> bool {
        self.listeners.remove_collision_listener(listener)
    }

    /// Sets the veto listener for one collision group, replacing any previous one
    pub fn add_collision_group_listener(&self, listener: Arc<dyn CollisionGroupListener>, group: CollisionGroup) -> Result<()> {
        self.listeners.add_collision_group_listener(listener, group).map(|_| ())
    }

    pub fn remove_collision_group_listener(&self, group: CollisionGroup) -> Option<Arc<dyn CollisionGroupListener>> {
        self.listeners.remove_collision_group_listener(group)
    }

    /// Ray test over the segment `from -> to`, nearest hit first.
    ///
    /// From another thread this waits for a running step to finish.
    ///
    /// # Panics
    ///
    /// Panics when called through the space from inside a step on the owning
    /// thread; use the [`StepContext`] there.
    pub fn ray_test(&self, from: Vector3, to: Vector3) -> Vec<RayTestResult> {
        self.assert_queryable();
        QueryEngine::ray_test(&**lock(&self.kernel), from, to, self.ray_test_flags())
    }

    /// Like [`ray_test`](Self::ray_test), reusing `results`
    pub fn ray_test_into(&self, from: Vector3, to: Vector3, results: &mut Vec<RayTestResult>) {
        self.assert_queryable();
        QueryEngine::ray_test_into(&**lock(&self.kernel), from, to, self.ray_test_flags(), results);
    }

    /// Ray test without sorting; results come in discovery order
    pub fn ray_test_raw(&self, from: Vector3, to: Vector3) -> Vec<RayTestResult> {
        self.assert_queryable();
        QueryEngine::ray_test_raw(&**lock(&self.kernel), from, to, self.ray_test_flags())
    }

    pub fn ray_test_raw_into(&self, from: Vector3, to: Vector3, results: &mut Vec<RayTestResult>) {
        self.assert_queryable();
        QueryEngine::ray_test_raw_into(&**lock(&self.kernel), from, to, self.ray_test_flags(), results);
    }

    /// Sweeps a convex shape from `start` to `end`.
    ///
    /// Sweeps shorter than about 0.4 units miss, as do sweeps that start
    /// inside a target and move away from its center.
    pub fn sweep_test(&self, shape: &CollisionShape, start: &Transform, end: &Transform) -> Vec<SweepTestResult> {
        self.sweep_test_with_penetration(shape, start, end, 0.0)
    }

    pub fn sweep_test_with_penetration(
        &self,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
    ) -> Vec<SweepTestResult> {
        self.assert_queryable();
        QueryEngine::sweep_test(&**lock(&self.kernel), shape, start, end, allowed_penetration)
    }

    pub fn sweep_test_into(
        &self,
        shape: &CollisionShape,
        start: &Transform,
        end: &Transform,
        allowed_penetration: f32,
        results: &mut Vec<SweepTestResult>,
    ) {
        self.assert_queryable();
        QueryEngine::sweep_test_into(&**lock(&self.kernel), shape, start, end, allowed_penetration, results);
    }

    /// Returns the gravity given to newly added bodies
    pub fn gravity(&self) -> Vector3 {
        read(&self.config).gravity
    }

    /// Sets the gravity for bodies added from now on; bodies already in the space keep theirs
    pub fn set_gravity(&self, gravity: Vector3) -> Result<()> {
        write(&self.config).gravity = gravity;
        self.with_context_or_defer("set_gravity", move |ctx| {
            ctx.kernel().set_gravity(gravity);
            Ok(())
        })
    }

    /// Returns the length of one fixed sub-step, in seconds
    pub fn accuracy(&self) -> f32 {
        read(&self.config).accuracy
    }

    pub fn set_accuracy(&self, accuracy: f32) -> Result<()> {
        if !accuracy.is_finite() || accuracy <= 0.0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "accuracy must be a positive number of seconds, got {}",
                accuracy
            )));
        }
        write(&self.config).accuracy = accuracy;
        Ok(())
    }

    /// Returns the sub-step cap used by [`update`](Self::update)
    pub fn max_sub_steps(&self) -> u32 {
        read(&self.config).max_sub_steps
    }

    pub fn set_max_sub_steps(&self, max_sub_steps: u32) -> Result<()> {
        if max_sub_steps == 0 {
            return Err(PhysicsError::InvalidParameter("max_sub_steps must be at least 1".into()));
        }
        write(&self.config).max_sub_steps = max_sub_steps;
        Ok(())
    }

    pub fn solver_iterations(&self) -> u32 {
        read(&self.config).solver_iterations
    }

    pub fn set_solver_iterations(&self, iterations: u32) -> Result<()> {
        if iterations == 0 {
            return Err(PhysicsError::InvalidParameter("solver_iterations must be at least 1".into()));
        }
        write(&self.config).solver_iterations = iterations;
        self.with_context_or_defer("set_solver_iterations", move |ctx| {
            ctx.kernel().set_solver_iterations(iterations);
            Ok(())
        })
    }

    pub fn ray_test_flags(&self) -> RayTestFlags {
        read(&self.config).ray_test_flags
    }

    pub fn set_ray_test_flags(&self, flags: RayTestFlags) {
        write(&self.config).ray_test_flags = flags;
    }

    pub fn world_min(&self) -> Vector3 {
        read(&self.config).world_min
    }

    pub fn world_max(&self) -> Vector3 {
        read(&self.config).world_max
    }

    pub fn broadphase(&self) -> BroadphaseType {
        read(&self.config).broadphase
    }

    /// Returns a copy of the current configuration
    pub fn config(&self) -> SpaceConfig {
        read(&self.config).clone()
    }

    /// Returns whether an object with this id is in the space
    pub fn contains(&self, id: ObjectId) -> bool {
        read(&self.registry).contains(id)
    }

    /// Returns the object with this id, if it is in the space
    pub fn object(&self, id: ObjectId) -> Option<SpaceObject> {
        read(&self.registry).get(id).cloned()
    }

    /// Returns the number of objects in the space (a vehicle counts once)
    pub fn object_count(&self) -> usize {
        read(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.registry).is_empty()
    }

    /// Returns the kernel constraint id of a vehicle in the space
    pub fn vehicle_constraint(&self, vehicle: ObjectId) -> Option<ConstraintId> {
        read(&self.registry).vehicle_constraint(vehicle)
    }

    /// Returns whether any vehicle in the space owns this constraint id
    pub fn has_vehicle_constraint(&self, constraint: ConstraintId) -> bool {
        read(&self.registry).has_vehicle_constraint(constraint)
    }

    /// Snapshot of every rigid body, vehicle chassis included
    pub fn rigid_bodies(&self) -> Vec<Arc<RigidBody>> {
        read(&self.registry).rigid_bodies()
    }

    pub fn ghost_objects(&self) -> Vec<Arc<GhostObject>> {
        read(&self.registry).ghost_objects()
    }

    pub fn characters(&self) -> Vec<Arc<Character>> {
        read(&self.registry).characters()
    }

    pub fn vehicles(&self) -> Vec<Arc<Vehicle>> {
        read(&self.registry).vehicles()
    }

    pub fn joints(&self) -> Vec<Arc<Joint>> {
        read(&self.registry).joints()
    }

    /// Returns the number of tasks waiting for the next step
    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns the number of collision events waiting for delivery
    pub fn pending_event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Returns the number of delivered events kept for reuse
    pub fn pooled_event_count(&self) -> usize {
        lock(&self.events).pooled()
    }

    pub(crate) fn task_queue(&self) -> &TaskQueue {
        &self.tasks
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, ObjectRegistry> {
        read(&self.registry)
    }

    pub(crate) fn registry_mut(&self) -> RwLockWriteGuard<'_, ObjectRegistry> {
        write(&self.registry)
    }

    pub(crate) fn check_supported(&self, kind: ObjectKind, operation: &'static str) -> Result<()> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(PhysicsError::UnsupportedOperand { kind, operation })
        }
    }

    pub(crate) fn push_event(&self, object_a: ObjectId, object_b: ObjectId, contact: &ContactPoint) {
        lock(&self.events).push(object_a, object_b, *contact);
    }

    /// Mask test first, then the group listeners of both objects
    pub(crate) fn need_collision(&self, object_a: ObjectId, object_b: ObjectId) -> bool {
        let (a, b) = {
            let registry = read(&self.registry);
            match (registry.get(object_a), registry.get(object_b)) {
                (Some(a), Some(b)) => (a.clone(), b.clone()),
                _ => return true,
            }
        };

        if let (Some(filter_a), Some(filter_b)) = (a.filter(), b.filter()) {
            if !groups_overlap(filter_a.group(), filter_a.mask(), filter_b.group(), filter_b.mask()) {
                return false;
            }
        }

        self.listeners.groups_allow(&a, &b)
    }

    fn set_state(&self, state: SpaceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn assert_alive(&self) {
        assert!(!self.is_destroyed(), "space {} was used after it was destroyed", self.id);
    }

    fn assert_queryable(&self) {
        self.assert_alive();
        assert!(
            !(self.is_owner_thread() && self.state() == SpaceState::Stepping),
            "space {} cannot be queried through the space during its own step; use the StepContext",
            self.id
        );
    }

    /// Runs `work` right away on the owning thread outside a step, otherwise queues it
    fn with_context_or_defer<F>(&self, operation: &'static str, work: F) -> Result<()>
    where
        F: FnOnce(&mut StepContext<'_>) -> Result<()> + Send + 'static,
    {
        self.assert_alive();

        if self.is_owner_thread() && self.state() != SpaceState::Stepping {
            let mut kernel = lock(&self.kernel);
            let mut ctx = StepContext::new(self, &mut **kernel, 0.0);
            return work(&mut ctx);
        }

        trace!("Deferring {} on space {} to the next step", operation, self.id);
        let id = self.id;
        self.tasks.push(move |ctx| {
            if let Err(err) = work(ctx) {
                error!("Deferred {} on space {} failed: {}", operation, id, err);
            }
        });
        Ok(())
    }
}

impl Drop for SimulationSpace {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            self.tasks.clear();
            self.kernel
                .get_mut()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .destroy_world();
        }
    }
}

impl fmt::Debug for SimulationSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationSpace")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("objects", &self.object_count())
            .field("pending_tasks", &self.pending_task_count())
            .field("pending_events", &self.pending_event_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
