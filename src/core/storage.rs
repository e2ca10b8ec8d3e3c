use crate::bodies::{Character, ConstraintId, GhostObject, ObjectId, ObjectKind, RigidBody, SpaceObject, Vehicle};
use crate::constraints::Joint;
use std::collections::HashMap;
use std::sync::Arc;

/// Authoritative map from object id to the objects currently in a space.
///
/// A single arena keyed by id holds every kind; kind-specific extra state
/// lives in side tables. Vehicles own a second id (the vehicle constraint)
/// which is tracked in `vehicle_constraints` for as long as the vehicle is
/// registered.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    /// Every object in the space, by id
    entries: HashMap<ObjectId, SpaceObject>,

    /// Vehicle constraint ids, keyed by the vehicle's chassis id
    vehicle_constraints: HashMap<ObjectId, ConstraintId>,
}

impl ObjectRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object. Returns false (and changes nothing) if its id is already present.
    pub fn insert(&mut self, object: SpaceObject) -> bool {
        let id = object.id();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, object);
        true
    }

    /// Records the kernel constraint id belonging to a registered vehicle
    pub fn insert_vehicle_constraint(&mut self, vehicle: ObjectId, constraint: ConstraintId) {
        self.vehicle_constraints.insert(vehicle, constraint);
    }

    /// Unregisters an object, dropping any side-table state it owns
    pub fn remove(&mut self, id: ObjectId) -> Option<SpaceObject> {
        let removed = self.entries.remove(&id)?;
        self.vehicle_constraints.remove(&id);
        Some(removed)
    }

    /// Forgets the vehicle constraint of `vehicle`, returning it
    pub fn remove_vehicle_constraint(&mut self, vehicle: ObjectId) -> Option<ConstraintId> {
        self.vehicle_constraints.remove(&vehicle)
    }

    /// Returns whether an object with this id is registered
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Gets a registered object by id
    pub fn get(&self, id: ObjectId) -> Option<&SpaceObject> {
        self.entries.get(&id)
    }

    /// Returns the kind of a registered object
    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
        self.entries.get(&id).map(SpaceObject::kind)
    }

    /// Returns the number of registered objects (a vehicle counts once)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the constraint id of a registered vehicle
    pub fn vehicle_constraint(&self, vehicle: ObjectId) -> Option<ConstraintId> {
        self.vehicle_constraints.get(&vehicle).copied()
    }

    /// Returns whether any registered vehicle owns this constraint id
    pub fn has_vehicle_constraint(&self, constraint: ConstraintId) -> bool {
        self.vehicle_constraints.values().any(|c| *c == constraint)
    }

    /// Returns a snapshot of every rigid body, including vehicle chassis
    pub fn rigid_bodies(&self) -> Vec<Arc<RigidBody>> {
        self.sorted(|object| object.as_rigid_body().cloned())
    }

    /// Returns a snapshot of every ghost object
    pub fn ghost_objects(&self) -> Vec<Arc<GhostObject>> {
        self.sorted(|object| match object {
            SpaceObject::Ghost(ghost) => Some(Arc::clone(ghost)),
            _ => None,
        })
    }

    /// Returns a snapshot of every character
    pub fn characters(&self) -> Vec<Arc<Character>> {
        self.sorted(|object| match object {
            SpaceObject::Character(character) => Some(Arc::clone(character)),
            _ => None,
        })
    }

    /// Returns a snapshot of every vehicle
    pub fn vehicles(&self) -> Vec<Arc<Vehicle>> {
        self.sorted(|object| object.as_vehicle().cloned())
    }

    /// Returns a snapshot of every joint
    pub fn joints(&self) -> Vec<Arc<Joint>> {
        self.sorted(|object| object.as_joint().cloned())
    }

    /// Removes everything, returning the objects in id order
    pub fn clear(&mut self) -> Vec<SpaceObject> {
        self.vehicle_constraints.clear();
        let mut drained: Vec<(ObjectId, SpaceObject)> = self.entries.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained.into_iter().map(|(_, object)| object).collect()
    }

    fn sorted<T>(&self, pick: impl Fn(&SpaceObject) -> Option<T>) -> Vec<T> {
        let mut picked: Vec<(ObjectId, T)> = self
            .entries
            .iter()
            .filter_map(|(id, object)| pick(object).map(|value| (*id, value)))
            .collect();
        picked.sort_by_key(|(id, _)| *id);
        picked.into_iter().map(|(_, value)| value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::CollisionShape;

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut registry = ObjectRegistry::new();
        let body = Arc::new(RigidBody::new(CollisionShape::sphere(1.0), 1.0));

        assert!(registry.insert(SpaceObject::from(Arc::clone(&body))));
        assert!(!registry.insert(SpaceObject::from(body)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_vehicle_drops_its_constraint() {
        let mut registry = ObjectRegistry::new();
        let vehicle = Arc::new(Vehicle::new(RigidBody::new(CollisionShape::cuboid(crate::math::Vector3::new(1.0, 0.5, 2.0)), 800.0)));
        let id = vehicle.id();

        registry.insert(SpaceObject::from(vehicle));
        registry.insert_vehicle_constraint(id, ConstraintId(7));
        assert!(registry.has_vehicle_constraint(ConstraintId(7)));
        assert_eq!(registry.rigid_bodies().len(), 1);

        registry.remove(id);
        assert!(registry.vehicle_constraint(id).is_none());
        assert!(!registry.has_vehicle_constraint(ConstraintId(7)));
    }
}
