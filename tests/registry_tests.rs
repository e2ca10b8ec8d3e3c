mod common;

use common::{sphere_at, static_sphere_at, weightless_space};
use phys_space::bodies::VehicleWheel;
use phys_space::{
    Character, CollisionShape, GhostObject, Joint, ObjectKind, RigidBody, SpaceObject, Vehicle, Vector3,
};
use std::sync::Arc;

fn wheel() -> VehicleWheel {
    VehicleWheel {
        connection_point: Vector3::new(1.0, -0.5, 1.0),
        direction: -Vector3::y(),
        axle: -Vector3::x(),
        suspension_rest_length: 0.3,
        radius: 0.4,
        front_wheel: true,
    }
}

#[test]
fn test_lists_hold_one_entry_per_object() {
    let space = weightless_space();

    // Create one object of every kind, spread apart
    let body = sphere_at(Vector3::zeros());
    let anchor = static_sphere_at(Vector3::new(0.0, 5.0, 0.0), 0.5);
    let ghost = Arc::new(GhostObject::new(CollisionShape::sphere(2.0)).with_position(Vector3::new(20.0, 0.0, 0.0)));
    let character =
        Arc::new(Character::new(CollisionShape::sphere(0.5)).with_position(Vector3::new(-20.0, 0.0, 0.0)));
    let chassis = RigidBody::new_dynamic(
        CollisionShape::cuboid(Vector3::new(1.0, 0.5, 2.0)),
        800.0,
        Vector3::new(0.0, 0.0, 20.0),
    );
    let vehicle = Arc::new(Vehicle::new(chassis).with_wheel(wheel()));
    let joint = Joint::point(&body, &anchor, Vector3::new(0.0, 2.5, 0.0), Vector3::new(0.0, -2.5, 0.0));

    space.add(Arc::clone(&body)).unwrap();
    space.add(Arc::clone(&anchor)).unwrap();
    space.add(Arc::clone(&ghost)).unwrap();
    space.add(Arc::clone(&character)).unwrap();
    space.add(Arc::clone(&vehicle)).unwrap();
    space.add(Arc::clone(&joint)).unwrap();

    assert_eq!(space.object_count(), 6);
    assert_eq!(space.rigid_bodies().len(), 3);
    assert_eq!(space.ghost_objects().len(), 1);
    assert_eq!(space.characters().len(), 1);
    assert_eq!(space.vehicles().len(), 1);
    assert_eq!(space.joints().len(), 1);

    let chassis_listed = space
        .rigid_bodies()
        .iter()
        .any(|listed| Arc::ptr_eq(listed, vehicle.chassis()));
    assert!(chassis_listed);
}

#[test]
fn test_lookup_reports_the_registered_kind() {
    let space = weightless_space();
    let body = sphere_at(Vector3::zeros());
    let ghost = Arc::new(GhostObject::new(CollisionShape::sphere(1.0)).with_position(Vector3::new(10.0, 0.0, 0.0)));
    let vehicle = Arc::new(Vehicle::new(RigidBody::new_dynamic(
        CollisionShape::sphere(1.0),
        10.0,
        Vector3::new(-10.0, 0.0, 0.0),
    )));

    space.add(Arc::clone(&body)).unwrap();
    space.add(Arc::clone(&ghost)).unwrap();
    space.add(Arc::clone(&vehicle)).unwrap();

    assert_eq!(space.object(body.id()).map(|o| o.kind()), Some(ObjectKind::RigidBody));
    assert_eq!(space.object(ghost.id()).map(|o| o.kind()), Some(ObjectKind::Ghost));
    assert_eq!(space.object(vehicle.id()).map(|o| o.kind()), Some(ObjectKind::Vehicle));

    let constraint = space.vehicle_constraint(vehicle.id()).unwrap();
    assert!(space.has_vehicle_constraint(constraint));
}

#[test]
fn test_removal_empties_the_lists() {
    let space = weightless_space();
    let ghost = Arc::new(GhostObject::new(CollisionShape::sphere(1.0)));
    let vehicle = Arc::new(Vehicle::new(RigidBody::new_dynamic(
        CollisionShape::sphere(1.0),
        10.0,
        Vector3::new(5.0, 0.0, 0.0),
    )));

    space.add(Arc::clone(&ghost)).unwrap();
    space.add(Arc::clone(&vehicle)).unwrap();
    let constraint = space.vehicle_constraint(vehicle.id()).unwrap();

    space.remove(Arc::clone(&ghost)).unwrap();
    space.remove(Arc::clone(&vehicle)).unwrap();

    assert!(space.is_empty());
    assert!(space.ghost_objects().is_empty());
    assert!(space.rigid_bodies().is_empty());
    assert!(space.vehicles().is_empty());
    assert!(!space.has_vehicle_constraint(constraint));
    assert!(space.object(ghost.id()).is_none());
}

#[test]
fn test_snapshots_do_not_track_later_changes() {
    let space = weightless_space();
    let body = sphere_at(Vector3::zeros());
    space.add(Arc::clone(&body)).unwrap();

    let snapshot = space.rigid_bodies();
    space.remove(SpaceObject::from(Arc::clone(&body))).unwrap();

    assert_eq!(snapshot.len(), 1);
    assert!(space.rigid_bodies().is_empty());
}
