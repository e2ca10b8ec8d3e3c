use crate::math::{position_of, Aabb, Ray, Transform, Vector3};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Collision shapes understood by the kernel boundary
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum CollisionShape {
    /// A sphere centred on the object's origin
    Sphere {
        /// The radius of the sphere
        radius: f32,
    },

    /// An oriented box centred on the object's origin
    Box {
        /// The half-extents of the box (half-width, half-height, half-depth)
        half_extents: Vector3,
    },
}

impl CollisionShape {
    /// Creates a sphere shape
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere {
            radius: radius.max(0.0),
        }
    }

    /// Creates a box shape from half-extents
    pub fn cuboid(half_extents: Vector3) -> Self {
        Self::Box {
            half_extents: half_extents.map(|e| e.max(0.0)),
        }
    }

    /// Radius of the smallest sphere around the origin enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => radius,
            Self::Box { half_extents } => half_extents.norm(),
        }
    }

    /// Returns the axis-aligned bounding box of the shape in world space
    pub fn world_bounds(&self, transform: &Transform) -> Aabb {
        let center = position_of(transform);
        match *self {
            Self::Sphere { radius } => {
                Aabb::from_center_half_extents(center, Vector3::new(radius, radius, radius))
            }
            Self::Box { half_extents } => {
                // Project the rotated half-extents onto the world axes
                let rotation = transform.rotation.to_rotation_matrix();
                let abs = rotation.matrix().abs();
                Aabb::from_center_half_extents(center, abs * half_extents)
            }
        }
    }

    /// Intersects a ray with this shape placed at `transform`.
    ///
    /// Returns the entry parameter and the world-space surface normal at the
    /// entry point. Hits whose entry lies behind the origin (origin inside the
    /// shape) are reported with a negative parameter so callers can decide
    /// whether to keep them.
    pub fn intersect_ray(&self, ray: &Ray, transform: &Transform) -> Option<(f32, Vector3)> {
        match *self {
            Self::Sphere { radius } => {
                let center = position_of(transform);
                let (enter, exit) = ray.intersect_sphere(center, radius)?;
                if exit < 0.0 {
                    return None;
                }
                let normal = (ray.point_at(enter) - center)
                    .try_normalize(crate::math::EPSILON)
                    .unwrap_or_else(|| -ray.direction.normalize());
                Some((enter, normal))
            }
            Self::Box { half_extents } => {
                // Transform ray to local space
                let inverse = transform.inverse();
                let local_ray = Ray::new(
                    inverse.transform_point(&ray.origin.into()).coords,
                    inverse.transform_vector(&ray.direction),
                );
                let local_box = Aabb::from_center_half_extents(Vector3::zeros(), half_extents);
                let (enter, exit, local_normal) = local_box.intersect_ray(&local_ray)?;
                if exit < 0.0 {
                    return None;
                }
                Some((enter, transform.transform_vector(&local_normal)))
            }
        }
    }
}

impl Default for CollisionShape {
    fn default() -> Self {
        Self::Sphere { radius: 0.5 }
    }
}
