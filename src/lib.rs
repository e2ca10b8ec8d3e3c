pub mod math;
pub mod core;
pub mod bodies;
pub mod shapes;
pub mod collision;
pub mod constraints;
pub mod kernel;

/// Re-export common types for easier usage
pub use crate::core::{
    CollisionEvent, CollisionGroupListener, CollisionListener, RayTestResult, SceneNode, SimulationSpace,
    SpaceConfig, StepContext, SweepTestResult, TaskError, TaskHandle, TickListener,
};
pub use crate::bodies::{Character, GhostObject, ObjectId, ObjectKind, RigidBody, SpaceObject, Vehicle};
pub use crate::collision::CollisionGroup;
pub use crate::constraints::Joint;
pub use crate::kernel::{ReferenceKernel, SimulationKernel};
pub use crate::math::Vector3;
pub use crate::shapes::CollisionShape;

/// Error types for the simulation space
pub mod error {
    use crate::bodies::ObjectKind;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Unsupported operand: cannot {operation} a {kind} in this space")]
        UnsupportedOperand {
            kind: ObjectKind,
            operation: &'static str,
        },

        #[error("No simulation space is active on this thread")]
        NoActiveSpace,

        #[error("Kernel error: {0}")]
        KernelError(String),
    }
}

/// Result type for simulation space operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
