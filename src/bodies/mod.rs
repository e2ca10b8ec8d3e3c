mod rigid_body;
mod ghost;
mod character;
mod vehicle;

pub use self::rigid_body::{MotionState, RigidBody};
pub use self::ghost::GhostObject;
pub use self::character::Character;
pub use self::vehicle::{Vehicle, VehicleWheel};

use crate::collision::{CollisionGroup, CollisionMask};
use crate::constraints::Joint;
use crate::math::Transform;
use crate::shapes::CollisionShape;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an object known to the kernel.
///
/// Ids are process-unique and never zero. They stay the same for the whole
/// lifetime of the object, independent of which space (if any) holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Allocates a fresh id
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::LowerHex for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Id of a secondary kernel constraint (for example a vehicle's raycast constraint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u64);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// The closed set of object kinds a space can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Overlap-only collision object
    Ghost,

    /// Dynamic, static or kinematic rigid body
    RigidBody,

    /// Rigid body chassis plus a raycast vehicle constraint
    Vehicle,

    /// Kinematic character controller
    Character,

    /// Constraint between two rigid bodies
    Joint,
}

impl ObjectKind {
    /// Every kind, in declaration order
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Ghost,
        ObjectKind::RigidBody,
        ObjectKind::Vehicle,
        ObjectKind::Character,
        ObjectKind::Joint,
    ];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Ghost => "ghost object",
            ObjectKind::RigidBody => "rigid body",
            ObjectKind::Vehicle => "vehicle",
            ObjectKind::Character => "character",
            ObjectKind::Joint => "joint",
        };
        f.write_str(name)
    }
}

/// Anything that can be added to or removed from a simulation space
#[derive(Debug, Clone)]
pub enum SpaceObject {
    Ghost(Arc<GhostObject>),
    RigidBody(Arc<RigidBody>),
    Vehicle(Arc<Vehicle>),
    Character(Arc<Character>),
    Joint(Arc<Joint>),
}

impl SpaceObject {
    /// Returns the kind tag of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            SpaceObject::Ghost(_) => ObjectKind::Ghost,
            SpaceObject::RigidBody(_) => ObjectKind::RigidBody,
            SpaceObject::Vehicle(_) => ObjectKind::Vehicle,
            SpaceObject::Character(_) => ObjectKind::Character,
            SpaceObject::Joint(_) => ObjectKind::Joint,
        }
    }

    /// Returns the stable id; a vehicle is identified by its chassis
    pub fn id(&self) -> ObjectId {
        match self {
            SpaceObject::Ghost(ghost) => ghost.id(),
            SpaceObject::RigidBody(body) => body.id(),
            SpaceObject::Vehicle(vehicle) => vehicle.id(),
            SpaceObject::Character(character) => character.id(),
            SpaceObject::Joint(joint) => joint.id(),
        }
    }

    /// Returns the rigid body behind this object (vehicles expose their chassis)
    pub fn as_rigid_body(&self) -> Option<&Arc<RigidBody>> {
        match self {
            SpaceObject::RigidBody(body) => Some(body),
            SpaceObject::Vehicle(vehicle) => Some(vehicle.chassis()),
            _ => None,
        }
    }

    /// Returns the joint, if this is one
    pub fn as_joint(&self) -> Option<&Arc<Joint>> {
        match self {
            SpaceObject::Joint(joint) => Some(joint),
            _ => None,
        }
    }

    /// Returns the vehicle, if this is one
    pub fn as_vehicle(&self) -> Option<&Arc<Vehicle>> {
        match self {
            SpaceObject::Vehicle(vehicle) => Some(vehicle),
            _ => None,
        }
    }

    /// Returns the collision filter of a collision-bearing object; joints have none
    pub fn filter(&self) -> Option<&GroupFilter> {
        match self {
            SpaceObject::Ghost(ghost) => Some(ghost.filter()),
            SpaceObject::RigidBody(body) => Some(body.filter()),
            SpaceObject::Vehicle(vehicle) => Some(vehicle.chassis().filter()),
            SpaceObject::Character(character) => Some(character.filter()),
            SpaceObject::Joint(_) => None,
        }
    }

    /// Returns the collision group, if this object has one
    pub fn collision_group(&self) -> Option<CollisionGroup> {
        self.filter().map(GroupFilter::group)
    }

    /// Returns the collide-with mask, if this object has one
    pub fn collide_with_groups(&self) -> Option<CollisionMask> {
        self.filter().map(GroupFilter::mask)
    }

    /// Returns the collision shape, if this object has one
    pub fn shape(&self) -> Option<CollisionShape> {
        match self {
            SpaceObject::Ghost(ghost) => Some(ghost.shape()),
            SpaceObject::RigidBody(body) => Some(body.shape()),
            SpaceObject::Vehicle(vehicle) => Some(vehicle.chassis().shape()),
            SpaceObject::Character(character) => Some(character.shape()),
            SpaceObject::Joint(_) => None,
        }
    }

    /// Returns the world transform, if this object has one
    pub fn transform(&self) -> Option<Transform> {
        match self {
            SpaceObject::Ghost(ghost) => Some(ghost.transform()),
            SpaceObject::RigidBody(body) => Some(body.transform()),
            SpaceObject::Vehicle(vehicle) => Some(vehicle.chassis().transform()),
            SpaceObject::Character(character) => Some(character.transform()),
            SpaceObject::Joint(_) => None,
        }
    }
}

impl From<Arc<GhostObject>> for SpaceObject {
    fn from(ghost: Arc<GhostObject>) -> Self {
        SpaceObject::Ghost(ghost)
    }
}

impl From<Arc<RigidBody>> for SpaceObject {
    fn from(body: Arc<RigidBody>) -> Self {
        SpaceObject::RigidBody(body)
    }
}

impl From<Arc<Vehicle>> for SpaceObject {
    fn from(vehicle: Arc<Vehicle>) -> Self {
        SpaceObject::Vehicle(vehicle)
    }
}

impl From<Arc<Character>> for SpaceObject {
    fn from(character: Arc<Character>) -> Self {
        SpaceObject::Character(character)
    }
}

impl From<Arc<Joint>> for SpaceObject {
    fn from(joint: Arc<Joint>) -> Self {
        SpaceObject::Joint(joint)
    }
}

/// Collision group membership and mask of a collision object.
///
/// Both values may be changed from any thread; the kernel reads them each
/// time it filters a pair.
#[derive(Debug)]
pub struct GroupFilter {
    group: AtomicU32,
    mask: AtomicU32,
}

impl GroupFilter {
    pub(crate) fn new() -> Self {
        Self {
            group: AtomicU32::new(CollisionGroup::GROUP_01.bits()),
            mask: AtomicU32::new(CollisionGroup::GROUP_01.bits()),
        }
    }

    /// Returns the group this object belongs to
    pub fn group(&self) -> CollisionGroup {
        CollisionGroup::from_bits_truncate(self.group.load(Ordering::Acquire))
    }

    /// Sets the group this object belongs to
    pub fn set_group(&self, group: CollisionGroup) {
        self.group.store(group.bits(), Ordering::Release);
    }

    /// Returns the groups this object collides with
    pub fn mask(&self) -> CollisionMask {
        CollisionMask::from_bits_truncate(self.mask.load(Ordering::Acquire))
    }

    /// Replaces the groups this object collides with
    pub fn set_mask(&self, mask: CollisionMask) {
        self.mask.store(mask.bits(), Ordering::Release);
    }

    /// Adds groups to the collide-with mask
    pub fn add_to_mask(&self, groups: CollisionMask) {
        self.mask.fetch_or(groups.bits(), Ordering::AcqRel);
    }

    /// Removes groups from the collide-with mask
    pub fn remove_from_mask(&self, groups: CollisionMask) {
        self.mask.fetch_and(!groups.bits(), Ordering::AcqRel);
    }
}
