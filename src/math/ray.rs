use crate::math::{Vector3, EPSILON};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Ray representation for intersection tests
///
/// Rays built with [`Ray::from_segment`] keep an unnormalized direction so
/// that the parameter `t` of a hit is directly the hit fraction along the
/// segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Origin of the ray
    pub origin: Vector3,

    /// Direction of the ray (not necessarily normalized)
    pub direction: Vector3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    #[inline]
    pub fn new(origin: Vector3, direction: Vector3) -> Self {
        Self { origin, direction }
    }

    /// Creates a ray spanning the segment `from -> to`, parameterized over `[0, 1]`
    #[inline]
    pub fn from_segment(from: Vector3, to: Vector3) -> Self {
        Self {
            origin: from,
            direction: to - from,
        }
    }

    /// Returns the point at parameter `t` along the ray
    #[inline]
    pub fn point_at(&self, t: f32) -> Vector3 {
        self.origin + self.direction * t
    }

    /// Returns the length of the direction vector
    #[inline]
    pub fn length(&self) -> f32 {
        self.direction.norm()
    }

    /// Intersects the ray with a sphere.
    ///
    /// Returns the entry and exit parameters; the entry is negative when the
    /// origin lies inside the sphere.
    pub fn intersect_sphere(&self, center: Vector3, radius: f32) -> Option<(f32, f32)> {
        let a = self.direction.norm_squared();
        if a < EPSILON {
            return None;
        }

        let to_origin = self.origin - center;
        let b = 2.0 * to_origin.dot(&self.direction);
        let c = to_origin.norm_squared() - radius * radius;

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        let t_enter = (-b - root) / (2.0 * a);
        let t_exit = (-b + root) / (2.0 * a);
        Some((t_enter, t_exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn segment_hit_fraction_is_parameter() {
        let ray = Ray::from_segment(Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 0.0, 0.0));
        let (enter, exit) = ray.intersect_sphere(Vector3::new(5.0, 0.0, 0.0), 1.0).unwrap();
        assert_relative_eq!(enter, 0.4, epsilon = 1e-5);
        assert_relative_eq!(exit, 0.6, epsilon = 1e-5);
    }

    #[test]
    fn sphere_miss() {
        let ray = Ray::from_segment(Vector3::new(0.0, 5.0, 0.0), Vector3::new(10.0, 5.0, 0.0));
        assert!(ray.intersect_sphere(Vector3::new(5.0, 0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn origin_inside_gives_negative_entry() {
        let ray = Ray::from_segment(Vector3::zeros(), Vector3::new(4.0, 0.0, 0.0));
        let (enter, exit) = ray.intersect_sphere(Vector3::zeros(), 1.0).unwrap();
        assert!(enter < 0.0);
        assert_relative_eq!(exit, 0.25, epsilon = 1e-5);
    }
}
