//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and the physical
//! properties the heightmaps are built from: whether a block is there at all, whether it
//! blocks motion, whether it is a fluid, and whether it is foliage.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact integer form stored in
/// [`Block`](super::Block).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// An air block, which is non-solid and transparent.
    AIR,

    /// A basic dirt block, used as a common building material.
    DIRT,

    /// A grass block, the usual top of generated terrain.
    GRASS,

    /// A wooden block.
    WOOD,

    /// A plain white block, often used for testing.
    WHITE,

    /// Still water. A fluid: blocks motion checks for fluids, but not for solids.
    WATER,

    /// Tree foliage. Solid, but ignored by the no-leaves heightmap.
    LEAVES,

    /// A flower. Present, but does not block motion.
    FLOWER,
}

impl BlockType {
    /// Plain building blocks, the ones random generation picks from.
    pub const SOLID_TYPES: [BlockType; 4] = [
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WOOD,
        BlockType::WHITE,
    ];

    /// Converts a `BlockTypeSize` to a `BlockType`.
    ///
    /// # Arguments
    /// * `btype` - The block type as a `BlockTypeSize`
    ///
    /// # Returns
    /// The corresponding `BlockType`, or `None` if the value is not a known type.
    pub fn get_block_type_from_int(btype: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(btype)
    }

    /// Picks a random solid building block.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from
    ///
    /// # Returns
    /// One of [`BlockType::SOLID_TYPES`].
    pub fn get_random_type(rng: &mut fastrand::Rng) -> Self {
        Self::SOLID_TYPES[rng.usize(..Self::SOLID_TYPES.len())]
    }

    /// Returns `true` for every block except air.
    pub fn is_present(self) -> bool {
        self != BlockType::AIR
    }

    /// Returns `true` for blocks that stop entities moving through them.
    pub fn blocks_motion(self) -> bool {
        !matches!(self, BlockType::AIR | BlockType::WATER | BlockType::FLOWER)
    }

    /// Returns `true` for fluids.
    pub fn is_fluid(self) -> bool {
        self == BlockType::WATER
    }

    /// Returns `true` for foliage.
    pub fn is_leaves(self) -> bool {
        self == BlockType::LEAVES
    }
}
