use crate::math::{Vector3, Ray, EPSILON};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Axis-Aligned Bounding Box (AABB) for coarse overlap tests
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner of the AABB
    pub min: Vector3,

    /// Maximum corner of the AABB
    pub max: Vector3,
}

impl Aabb {
    /// Creates a new AABB from minimum and maximum points
    #[inline]
    pub fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    /// Creates an AABB centered at a position with the given half extents
    #[inline]
    pub fn from_center_half_extents(center: Vector3, half_extents: Vector3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center of the AABB
    #[inline]
    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    /// Returns half the extents of the AABB in each dimension
    #[inline]
    pub fn half_extents(&self) -> Vector3 {
        (self.max - self.min) * 0.5
    }

    /// Checks if this AABB contains a point
    #[inline]
    pub fn contains_point(&self, point: Vector3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Checks if this AABB intersects with another AABB
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Returns the overlap depth along each axis, if the boxes intersect
    pub fn overlap(&self, other: &Self) -> Option<Vector3> {
        if !self.intersects(other) {
            return None;
        }

        Some(Vector3::new(
            self.max.x.min(other.max.x) - self.min.x.max(other.min.x),
            self.max.y.min(other.max.y) - self.min.y.max(other.min.y),
            self.max.z.min(other.max.z) - self.min.z.max(other.min.z),
        ))
    }

    /// Returns the closest point on the AABB to a given point
    pub fn closest_point(&self, point: Vector3) -> Vector3 {
        Vector3::new(
            point.x.max(self.min.x).min(self.max.x),
            point.y.max(self.min.y).min(self.max.y),
            point.z.max(self.min.z).min(self.max.z),
        )
    }

    /// Slab test against a ray.
    ///
    /// Returns the entry and exit parameters together with the outward normal
    /// of the entry face. The entry is negative when the origin is inside.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32, Vector3)> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        let mut normal = Vector3::zeros();

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];

            if dir.abs() < EPSILON {
                // Parallel to this slab pair
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv_d = 1.0 / dir;
            let mut t1 = (self.min[axis] - origin) * inv_d;
            let mut t2 = (self.max[axis] - origin) * inv_d;
            let mut sign = -1.0;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
                sign = 1.0;
            }

            if t1 > t_near {
                t_near = t1;
                normal = Vector3::zeros();
                normal[axis] = sign;
            }
            t_far = t_far.min(t2);

            if t_near > t_far {
                return None;
            }
        }

        Some((t_near, t_far, normal))
    }
}
