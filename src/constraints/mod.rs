mod joint;

pub use self::joint::{Joint, JointKind};
