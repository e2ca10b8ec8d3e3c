mod shape;

pub use self::shape::CollisionShape;
