//! # Heightmap Kind Module
//!
//! The four standard surface definitions and the rule each one uses to decide whether a
//! block counts. The trees never see these rules; cubes apply them when asked for the
//! highest block of a column.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::block::block_type::BlockType;
use crate::heightmap::HeightmapType;

/// A standard heightmap, identified on the wire and in storage by its
/// [`HeightmapType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum HeightmapKind {
    /// Highest block that is not air.
    WorldSurface = 0,
    /// Highest block that blocks motion; fluids do not count.
    OceanFloor = 1,
    /// Highest block that blocks motion or is a fluid.
    MotionBlocking = 2,
    /// Like `MotionBlocking`, ignoring leaves.
    MotionBlockingNoLeaves = 3,
}

impl HeightmapKind {
    /// Every kind, in type order.
    pub const ALL: [HeightmapKind; 4] = [
        HeightmapKind::WorldSurface,
        HeightmapKind::OceanFloor,
        HeightmapKind::MotionBlocking,
        HeightmapKind::MotionBlockingNoLeaves,
    ];

    /// The type this kind is tracked under.
    pub fn heightmap_type(self) -> HeightmapType {
        HeightmapType(self as i8)
    }

    /// The kind tracked under `heightmap_type`, if it is a standard one.
    pub fn from_type(heightmap_type: HeightmapType) -> Option<Self> {
        FromPrimitive::from_i8(heightmap_type.0)
    }

    /// Returns `true` if a block of `block_type` counts towards this heightmap.
    pub fn qualifies(self, block_type: BlockType) -> bool {
        match self {
            HeightmapKind::WorldSurface => block_type.is_present(),
            HeightmapKind::OceanFloor => block_type.blocks_motion(),
            HeightmapKind::MotionBlocking => block_type.blocks_motion() || block_type.is_fluid(),
            HeightmapKind::MotionBlockingNoLeaves => {
                (block_type.blocks_motion() || block_type.is_fluid()) && !block_type.is_leaves()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_round_trip() {
        for kind in HeightmapKind::ALL {
            assert_eq!(HeightmapKind::from_type(kind.heightmap_type()), Some(kind));
        }
        assert_eq!(HeightmapKind::from_type(HeightmapType(9)), None);
    }

    #[test]
    fn qualification_rules() {
        use HeightmapKind::*;
        let cases = [
            (BlockType::AIR, [false, false, false, false]),
            (BlockType::DIRT, [true, true, true, true]),
            (BlockType::WATER, [true, false, true, true]),
            (BlockType::LEAVES, [true, true, true, false]),
            (BlockType::FLOWER, [true, false, false, false]),
        ];
        for (block_type, expected) in cases {
            let actual = [WorldSurface, OceanFloor, MotionBlocking, MotionBlockingNoLeaves]
                .map(|kind| kind.qualifies(block_type));
            assert_eq!(actual, expected, "{block_type:?}");
        }
    }
}
