//! # Block Module
//!
//! This module provides the block data used by cubes: block type definitions and the
//! compact per-block storage type.

use block_type::BlockType;

pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// Represents a single voxel block in the world.
///
/// This is a lightweight structure that stores only the essential block data.
/// The actual block properties are looked up from the block type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// The type of this block, encoded as a `BlockTypeSize` for compact storage.
    pub block_type: BlockTypeSize,
}

impl Block {
    /// A block of air.
    pub const AIR: Block = Block { block_type: 0 };

    /// Creates a new block of the specified type.
    ///
    /// # Arguments
    /// * `block_type` - The type of block to create
    ///
    /// # Returns
    /// A new `Block` instance with the specified type.
    pub fn new(block_type: BlockType) -> Self {
        Block {
            block_type: block_type as BlockTypeSize,
        }
    }

    /// Gets the rich type of this block.
    ///
    /// # Returns
    /// The block's `BlockType`, or `BlockType::AIR` if the stored value is unknown.
    pub fn get_type(&self) -> BlockType {
        BlockType::get_block_type_from_int(self.block_type).unwrap_or(BlockType::AIR)
    }
}
