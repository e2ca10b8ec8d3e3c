use crate::error::PhysicsError;
use crate::math::Vector3;
use crate::Result;
use bitflags::bitflags;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Broadphase strategy the kernel should build the world with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum BroadphaseType {
    /// Brute force pair list, for tiny worlds
    Simple,

    /// Sweep-and-prune over a bounded world with 16-bit quantization
    AxisSweep3,

    /// Sweep-and-prune over a bounded world with 32-bit quantization
    AxisSweep3_32,

    /// Dynamic AABB tree, unbounded
    #[default]
    Dbvt,
}

impl BroadphaseType {
    /// Returns whether the world bounds are meaningful for this broadphase
    pub fn is_bounded(self) -> bool {
        matches!(self, BroadphaseType::AxisSweep3 | BroadphaseType::AxisSweep3_32)
    }
}

bitflags! {
    /// Flags forwarded to the kernel's ray test
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct RayTestFlags: u32 {
        /// Ignore hits on triangles facing away from the ray
        const FILTER_BACKFACES = 1 << 0;

        /// Report triangle normals unflipped
        const KEEP_UNFLIPPED_NORMAL = 1 << 1;

        /// Use the sub-simplex convex cast for convex shapes
        const SUBSIMPLEX_CONVEX_CAST = 1 << 2;

        /// Use the GJK convex cast for convex shapes
        const GJK_CONVEX_CAST = 1 << 3;

        /// Skip the heightfield acceleration structure
        const DISABLE_HEIGHTFIELD_ACCELERATOR = 1 << 4;
    }
}

impl Default for RayTestFlags {
    fn default() -> Self {
        RayTestFlags::SUBSIMPLEX_CONVEX_CAST
    }
}

/// Configuration parameters of a simulation space
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SpaceConfig {
    /// Minimum corner of the world (bounded broadphases only)
    pub world_min: Vector3,

    /// Maximum corner of the world (bounded broadphases only)
    pub world_max: Vector3,

    /// The broadphase strategy
    pub broadphase: BroadphaseType,

    /// Gravity given to bodies added after it is set
    pub gravity: Vector3,

    /// Length of one fixed sub-step, in seconds
    pub accuracy: f32,

    /// Default cap on sub-steps per `update`
    pub max_sub_steps: u32,

    /// Constraint solver iterations per sub-step
    pub solver_iterations: u32,

    /// Flags passed to every ray test
    pub ray_test_flags: RayTestFlags,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            world_min: Vector3::new(-10000.0, -10000.0, -10000.0),
            world_max: Vector3::new(10000.0, 10000.0, 10000.0),
            broadphase: BroadphaseType::Dbvt,
            gravity: Vector3::new(0.0, -9.81, 0.0),
            accuracy: 1.0 / 60.0,
            max_sub_steps: 4,
            solver_iterations: 10,
            ray_test_flags: RayTestFlags::default(),
        }
    }
}

impl SpaceConfig {
    /// Configuration for a bounded world, defaulting to sweep-and-prune
    pub fn bounded(world_min: Vector3, world_max: Vector3) -> Self {
        Self {
            world_min,
            world_max,
            broadphase: BroadphaseType::AxisSweep3,
            ..Self::default()
        }
    }

    /// Sets the broadphase strategy
    pub fn with_broadphase(mut self, broadphase: BroadphaseType) -> Self {
        self.broadphase = broadphase;
        self
    }

    /// Sets the gravity
    pub fn with_gravity(mut self, gravity: Vector3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Sets the fixed sub-step length
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Sets the default sub-step cap
    pub fn with_max_sub_steps(mut self, max_sub_steps: u32) -> Self {
        self.max_sub_steps = max_sub_steps;
        self
    }

    /// Checks the configuration for values no kernel can work with
    pub fn validate(&self) -> Result<()> {
        if !self.accuracy.is_finite() || self.accuracy <= 0.0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "accuracy must be a positive number of seconds, got {}",
                self.accuracy
            )));
        }

        if self.max_sub_steps == 0 {
            return Err(PhysicsError::InvalidParameter(
                "max_sub_steps must be at least 1".into(),
            ));
        }

        if self.solver_iterations == 0 {
            return Err(PhysicsError::InvalidParameter(
                "solver_iterations must be at least 1".into(),
            ));
        }

        if self.broadphase.is_bounded() {
            let min = self.world_min;
            let max = self.world_max;
            if !(min.x < max.x && min.y < max.y && min.z < max.z) {
                return Err(PhysicsError::InvalidParameter(format!(
                    "world bounds are inverted: min {:?}, max {:?}",
                    min, max
                )));
            }
        }

        Ok(())
    }
}
