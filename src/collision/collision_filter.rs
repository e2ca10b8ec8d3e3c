use bitflags::bitflags;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

bitflags! {
    /// A bit mask representing collision groups.
    ///
    /// An object belongs to exactly one group and collides with a mask of
    /// groups. Group listeners are keyed by a single group bit.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct CollisionGroup: u32 {
        /// No group; an object with this mask collides with nothing
        const NONE     = 0x0000_0000;
        const GROUP_01 = 0x0000_0001;
        const GROUP_02 = 0x0000_0002;
        const GROUP_03 = 0x0000_0004;
        const GROUP_04 = 0x0000_0008;
        const GROUP_05 = 0x0000_0010;
        const GROUP_06 = 0x0000_0020;
        const GROUP_07 = 0x0000_0040;
        const GROUP_08 = 0x0000_0080;
        const GROUP_09 = 0x0000_0100;
        const GROUP_10 = 0x0000_0200;
        const GROUP_11 = 0x0000_0400;
        const GROUP_12 = 0x0000_0800;
        const GROUP_13 = 0x0000_1000;
        const GROUP_14 = 0x0000_2000;
        const GROUP_15 = 0x0000_4000;
        const GROUP_16 = 0x0000_8000;

        /// All groups
        const ALL      = 0x0000_FFFF;
    }
}

/// Type alias for a collision mask (what groups this object collides with)
pub type CollisionMask = CollisionGroup;

/// Broadphase mask test.
///
/// A pair passes when either side's mask includes the other side's group.
#[inline]
pub fn groups_overlap(
    group_a: CollisionGroup,
    mask_a: CollisionMask,
    group_b: CollisionGroup,
    mask_b: CollisionMask,
) -> bool {
    mask_a.intersects(group_b) || mask_b.intersects(group_a)
}
