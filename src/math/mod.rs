use nalgebra as na;

mod aabb;
mod ray;

pub use aabb::Aabb;
pub use ray::Ray;

/// 3D vector used for positions, directions and forces
pub type Vector3 = na::Vector3<f32>;

/// Unit quaternion used for orientations
pub type Quaternion = na::UnitQuaternion<f32>;

/// Rigid transform (rotation followed by translation)
pub type Transform = na::Isometry3<f32>;

/// Constant for a very small number, used for comparisons
pub const EPSILON: f32 = 1.0e-6;

/// Creates a transform that only translates
#[inline]
pub fn translation(position: Vector3) -> Transform {
    Transform::translation(position.x, position.y, position.z)
}

/// Returns the translation part of a transform
#[inline]
pub fn position_of(transform: &Transform) -> Vector3 {
    transform.translation.vector
}
