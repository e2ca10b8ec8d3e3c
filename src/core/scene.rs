use crate::bodies::SpaceObject;

/// A node of a caller-side hierarchy that may carry a physics control.
///
/// Only the two accessors below are needed to add or remove a whole
/// subtree in one call.
pub trait SceneNode {
    /// The physics object attached to this node, if any
    fn physics_control(&self) -> Option<SpaceObject>;

    /// The node's children, in order
    fn children(&self) -> Vec<&dyn SceneNode>;
}

/// Objects to add for the subtree at `root`, in insertion order.
///
/// Depth first, parent before children. A body is followed by the joints
/// for which it is the first endpoint.
pub(crate) fn collect_for_add(root: &dyn SceneNode) -> Vec<SpaceObject> {
    let mut objects = Vec::new();
    visit_for_add(root, &mut objects);
    objects
}

fn visit_for_add(node: &dyn SceneNode, objects: &mut Vec<SpaceObject>) {
    if let Some(control) = node.physics_control() {
        let anchored = anchored_joints(&control);
        objects.push(control);
        objects.extend(anchored);
    }
    for child in node.children() {
        visit_for_add(child, objects);
    }
}

/// Objects to remove for the subtree at `root`, in removal order.
///
/// Same walk as [`collect_for_add`], but each body's anchored joints come
/// before the body itself.
pub(crate) fn collect_for_remove(root: &dyn SceneNode) -> Vec<SpaceObject> {
    let mut objects = Vec::new();
    visit_for_remove(root, &mut objects);
    objects
}

fn visit_for_remove(node: &dyn SceneNode, objects: &mut Vec<SpaceObject>) {
    if let Some(control) = node.physics_control() {
        objects.extend(anchored_joints(&control));
        objects.push(control);
    }
    for child in node.children() {
        visit_for_remove(child, objects);
    }
}

/// Joints whose first endpoint is the rigid body behind `control`
fn anchored_joints(control: &SpaceObject) -> Vec<SpaceObject> {
    let body = match control.as_rigid_body() {
        Some(body) => body,
        None => return Vec::new(),
    };

    body.joints()
        .into_iter()
        .filter(|joint| joint.body_a().id() == body.id())
        .map(SpaceObject::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::{ObjectKind, RigidBody};
    use crate::constraints::Joint;
    use crate::math::Vector3;
    use crate::shapes::CollisionShape;
    use std::sync::Arc;

    struct Node {
        control: Option<SpaceObject>,
        children: Vec<Node>,
    }

    impl SceneNode for Node {
        fn physics_control(&self) -> Option<SpaceObject> {
            self.control.clone()
        }

        fn children(&self) -> Vec<&dyn SceneNode> {
            self.children.iter().map(|c| c as &dyn SceneNode).collect()
        }
    }

    #[test]
    fn joint_follows_its_first_body_on_add_and_precedes_it_on_remove() {
        let parent = Arc::new(RigidBody::new(CollisionShape::sphere(1.0), 1.0));
        let child = Arc::new(RigidBody::new(CollisionShape::sphere(1.0), 1.0));
        let joint = Joint::point(&parent, &child, Vector3::zeros(), Vector3::zeros());

        let tree = Node {
            control: Some(SpaceObject::from(Arc::clone(&parent))),
            children: vec![Node {
                control: Some(SpaceObject::from(Arc::clone(&child))),
                children: Vec::new(),
            }],
        };

        let added: Vec<_> = collect_for_add(&tree).iter().map(SpaceObject::id).collect();
        assert_eq!(added, vec![parent.id(), joint.id(), child.id()]);

        let removed: Vec<_> = collect_for_remove(&tree).iter().map(SpaceObject::kind).collect();
        assert_eq!(removed, vec![ObjectKind::Joint, ObjectKind::RigidBody, ObjectKind::RigidBody]);
    }
}
