mod collision_filter;

pub use self::collision_filter::{groups_overlap, CollisionGroup, CollisionMask};
