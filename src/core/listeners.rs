use crate::bodies::SpaceObject;
use crate::collision::CollisionGroup;
use crate::core::context::StepContext;
use crate::core::events::CollisionEvent;
use crate::core::lock;
use crate::error::PhysicsError;
use crate::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Callbacks run at the start and end of every sub-step
pub trait TickListener: Send + Sync {
    /// Called after the task queue is drained, before the kernel advances
    fn pre_tick(&self, ctx: &mut StepContext<'_>, time_step: f32);

    /// Called after the kernel advanced
    fn post_tick(&self, ctx: &mut StepContext<'_>, time_step: f32);
}

/// Receives collision events once a step has finished
pub trait CollisionListener: Send + Sync {
    fn collision(&self, event: &CollisionEvent);
}

impl<F> CollisionListener for F
where
    F: Fn(&CollisionEvent) + Send + Sync,
{
    fn collision(&self, event: &CollisionEvent) {
        self(event)
    }
}

/// Per-group veto consulted by the kernel while it builds contact pairs.
///
/// Called mid-step on the owning thread; it must not touch the space.
pub trait CollisionGroupListener: Send + Sync {
    /// Returns whether the two objects may collide
    fn collide(&self, object_a: &SpaceObject, object_b: &SpaceObject) -> bool;
}

impl<F> CollisionGroupListener for F
where
    F: Fn(&SpaceObject, &SpaceObject) -> bool + Send + Sync,
{
    fn collide(&self, object_a: &SpaceObject, object_b: &SpaceObject) -> bool {
        self(object_a, object_b)
    }
}

/// One registration of a listener. Removal clears `active` so snapshots
/// that are already iterating skip it from then on.
struct Slot<L: ?Sized> {
    listener: Arc<L>,
    active: AtomicBool,
}

impl<L: ?Sized> Slot<L> {
    fn new(listener: Arc<L>) -> Arc<Self> {
        Arc::new(Self {
            listener,
            active: AtomicBool::new(true),
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Copy of a listener set taken before dispatch
pub(crate) struct Snapshot<L: ?Sized> {
    slots: Vec<Arc<Slot<L>>>,
}

impl<L: ?Sized> Snapshot<L> {
    /// Iterates in registration order, skipping listeners removed since the snapshot
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<L>> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.is_active())
            .map(|slot| &slot.listener)
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn remove_slot<L: ?Sized>(slots: &Mutex<Vec<Arc<Slot<L>>>>, listener: &Arc<L>) -> bool {
    let mut slots = lock(slots);
    match slots.iter().position(|slot| same_listener(&slot.listener, listener)) {
        Some(index) => {
            let slot = slots.remove(index);
            slot.active.store(false, Ordering::Release);
            true
        }
        None => false,
    }
}

/// Tick, collision and collision-group listeners of one space.
///
/// The space holds the listeners only while they are registered; callers
/// keep their own `Arc` to remove them later.
#[derive(Default)]
pub struct ListenerRegistry {
    tick: Mutex<Vec<Arc<Slot<dyn TickListener>>>>,
    collision: Mutex<Vec<Arc<Slot<dyn CollisionListener>>>>,
    groups: Mutex<BTreeMap<u32, Arc<dyn CollisionGroupListener>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tick listener; registering the same listener twice calls it twice
    pub fn add_tick_listener(&self, listener: Arc<dyn TickListener>) {
        lock(&self.tick).push(Slot::new(listener));
    }

    /// Removes one registration of a tick listener
    pub fn remove_tick_listener(&self, listener: &Arc<dyn TickListener>) -> bool {
        remove_slot(&self.tick, listener)
    }

    /// Registers a collision listener
    pub fn add_collision_listener(&self, listener: Arc<dyn CollisionListener>) {
        lock(&self.collision).push(Slot::new(listener));
    }

    /// Removes one registration of a collision listener
    pub fn remove_collision_listener(&self, listener: &Arc<dyn CollisionListener>) -> bool {
        remove_slot(&self.collision, listener)
    }

    /// Sets the veto listener of a single collision group, replacing any previous one
    pub fn add_collision_group_listener(
        &self,
        listener: Arc<dyn CollisionGroupListener>,
        group: CollisionGroup,
    ) -> Result<Option<Arc<dyn CollisionGroupListener>>> {
        if group.bits().count_ones() != 1 {
            return Err(PhysicsError::InvalidParameter(format!(
                "group listeners attach to exactly one collision group, got {:#06x}",
                group.bits()
            )));
        }
        Ok(lock(&self.groups).insert(group.bits(), listener))
    }

    /// Removes the veto listener of a collision group
    pub fn remove_collision_group_listener(&self, group: CollisionGroup) -> Option<Arc<dyn CollisionGroupListener>> {
        lock(&self.groups).remove(&group.bits())
    }

    /// Returns the veto listener of a collision group
    pub fn collision_group_listener(&self, group: CollisionGroup) -> Option<Arc<dyn CollisionGroupListener>> {
        lock(&self.groups).get(&group.bits()).cloned()
    }

    pub fn tick_listener_count(&self) -> usize {
        lock(&self.tick).len()
    }

    pub fn collision_listener_count(&self) -> usize {
        lock(&self.collision).len()
    }

    pub(crate) fn tick_snapshot(&self) -> Snapshot<dyn TickListener> {
        Snapshot {
            slots: lock(&self.tick).clone(),
        }
    }

    pub(crate) fn collision_snapshot(&self) -> Snapshot<dyn CollisionListener> {
        Snapshot {
            slots: lock(&self.collision).clone(),
        }
    }

    /// Asks the group listeners of both objects whether they may collide.
    ///
    /// Listeners are visited in ascending group order, each group once, and
    /// the pair collides only if every one of them agrees.
    pub(crate) fn groups_allow(&self, object_a: &SpaceObject, object_b: &SpaceObject) -> bool {
        let keys = [
            object_a.collision_group().map(|g| g.bits()),
            object_b.collision_group().map(|g| g.bits()),
        ];

        let listeners: Vec<Arc<dyn CollisionGroupListener>> = {
            let groups = lock(&self.groups);
            if groups.is_empty() {
                return true;
            }
            let mut ordered: Vec<u32> = keys.iter().flatten().copied().collect();
            ordered.sort_unstable();
            ordered.dedup();
            ordered
                .iter()
                .filter_map(|key| groups.get(key).cloned())
                .collect()
        };

        listeners.iter().all(|listener| listener.collide(object_a, object_b))
    }

    /// Drops every listener
    pub fn clear(&self) {
        for slot in lock(&self.tick).drain(..) {
            slot.active.store(false, Ordering::Release);
        }
        for slot in lock(&self.collision).drain(..) {
            slot.active.store(false, Ordering::Release);
        }
        lock(&self.groups).clear();
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("tick", &self.tick_listener_count())
            .field("collision", &self.collision_listener_count())
            .field("groups", &lock(&self.groups).keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::RigidBody;
    use crate::shapes::CollisionShape;
    use std::sync::atomic::AtomicUsize;

    fn body_in(group: CollisionGroup) -> SpaceObject {
        let body = RigidBody::new(CollisionShape::sphere(1.0), 1.0);
        body.filter().set_group(group);
        SpaceObject::from(Arc::new(body))
    }

    #[test]
    fn group_listener_needs_a_single_group() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn CollisionGroupListener> = Arc::new(|_: &SpaceObject, _: &SpaceObject| true);
        let both = CollisionGroup::GROUP_01 | CollisionGroup::GROUP_02;

        assert!(registry.add_collision_group_listener(Arc::clone(&listener), both).is_err());
        assert!(registry
            .add_collision_group_listener(listener, CollisionGroup::GROUP_02)
            .is_ok());
        assert!(registry.collision_group_listener(CollisionGroup::GROUP_02).is_some());
    }

    #[test]
    fn same_group_pair_asks_its_listener_once() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .add_collision_group_listener(
                Arc::new(move |_: &SpaceObject, _: &SpaceObject| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }),
                CollisionGroup::GROUP_01,
            )
            .unwrap();

        let a = body_in(CollisionGroup::GROUP_01);
        let b = body_in(CollisionGroup::GROUP_01);
        assert!(registry.groups_allow(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_is_skipped_by_live_snapshot() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn CollisionListener> = Arc::new(|_: &CollisionEvent| {});
        registry.add_collision_listener(Arc::clone(&listener));

        let snapshot = registry.collision_snapshot();
        assert_eq!(snapshot.iter().count(), 1);

        assert!(registry.remove_collision_listener(&listener));
        assert_eq!(snapshot.iter().count(), 0);
        assert!(!registry.remove_collision_listener(&listener));
    }
}
