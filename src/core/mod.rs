pub mod space;
pub mod config;
pub mod storage;
pub mod events;
pub mod task_queue;
pub mod listeners;
pub mod context;
pub mod query;
pub mod scene;

pub use self::space::SimulationSpace;
pub use self::config::{BroadphaseType, RayTestFlags, SpaceConfig};
pub use self::storage::ObjectRegistry;
pub use self::events::{CollisionEvent, EventQueue};
pub use self::task_queue::{TaskError, TaskHandle, TaskQueue};
pub use self::listeners::{CollisionGroupListener, CollisionListener, ListenerRegistry, TickListener};
pub use self::context::StepContext;
pub use self::query::{QueryEngine, RayTestResult, SweepTestResult};
pub use self::scene::SceneNode;

use crate::math::Vector3;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Opaque handle of a kernel world; never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(pub NonZeroU64);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A contact point between two collision objects, as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Contact position on object A in world space
    pub position_world_on_a: Vector3,

    /// Contact position on object B in world space
    pub position_world_on_b: Vector3,

    /// Contact normal on object B in world space
    pub normal_world_on_b: Vector3,

    /// Signed separation; negative while penetrating
    pub distance: f32,

    /// Impulse applied by the kernel to resolve the contact
    pub applied_impulse: f32,

    /// Number of sub-steps this contact has persisted
    pub lifetime: u32,
}

impl Default for ContactPoint {
    fn default() -> Self {
        Self {
            position_world_on_a: Vector3::zeros(),
            position_world_on_b: Vector3::zeros(),
            normal_world_on_b: Vector3::zeros(),
            distance: 0.0,
            applied_impulse: 0.0,
            lifetime: 0,
        }
    }
}

/// Step lifecycle of a space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpaceState {
    /// No step running, no undelivered events
    Idle = 0,

    /// Inside `update`, the kernel owns the call stack
    Stepping = 1,

    /// The last step finished and its events wait for `distribute_events`
    EventsPending = 2,
}

impl SpaceState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SpaceState::Stepping,
            2 => SpaceState::EventsPending,
            _ => SpaceState::Idle,
        }
    }
}

/// Locks a mutex, recovering the data if a listener panicked while holding it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
