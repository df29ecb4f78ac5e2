//! # Cube Module
//!
//! This module provides the `Cube` struct: a 16×32×16 volume of blocks, the unit that is
//! loaded and unloaded as one surface tracker leaf.
//!
//! ## Memory Layout
//!
//! Blocks are stored column by column: index `column * CUBE_HEIGHT + y`, where `column`
//! is the tree's column index for `(x, z)`. Alongside the dense `blocks` vector,
//! `solid_array` keeps one bit per block telling whether anything but air is there, so
//! that the world surface of a column is a single search for the last set bit.

use bitvec::prelude::{BitVec, Lsb0};

use super::block::block_type::BlockType;
use super::block::Block;
use super::HeightmapKind;
use crate::heightmap::coords::{
    column_index, cube_to_min_block, COLUMNS_PER_NODE, SCALE_0_NODE_HEIGHT, WIDTH_BLOCKS,
};
use crate::heightmap::{
    HeightmapSource, HeightmapStorage, HeightmapType, LeafHandle, NodeId, NO_HEIGHT,
};

mod generation;

pub use generation::{PERLIN_AMPLITUDE, PERLIN_BASE_HEIGHT, PERLIN_SCALE_FACTOR, SEA_LEVEL};

/// Width and depth of a cube in blocks.
pub const CUBE_WIDTH: i32 = WIDTH_BLOCKS;
/// Height of a cube in blocks.
pub const CUBE_HEIGHT: i32 = SCALE_0_NODE_HEIGHT;
/// Number of blocks in a cube.
pub const CUBE_VOLUME: usize = COLUMNS_PER_NODE * CUBE_HEIGHT as usize;

/// A 16×32×16 volume of blocks at cube coordinates `(cube_x, cube_y, cube_z)`.
///
/// Block coordinates taken by its methods are cube-local: `x` and `z` may also be global
/// (only the low four bits are used), `y` must be in `0..CUBE_HEIGHT`.
#[derive(Clone, Debug)]
pub struct Cube {
    cube_x: i32,
    cube_y: i32,
    cube_z: i32,
    /// One bit per block, set where the block is not air.
    solid_array: BitVec<u64, Lsb0>,
    blocks: Vec<Block>,
    /// Leaves this cube is bound to, one per tracked heightmap type.
    leaves: Vec<LeafHandle>,
}

impl Cube {
    /// Builds a cube by asking `block_at` for every block, given cube-local coordinates.
    ///
    /// # Arguments
    /// * `cube_x`, `cube_y`, `cube_z` - Cube coordinates of the new cube
    /// * `block_at` - Returns the block type at local `(x, y, z)`
    ///
    /// # Returns
    /// A new, unattached `Cube`.
    pub fn from_fn(
        cube_x: i32,
        cube_y: i32,
        cube_z: i32,
        mut block_at: impl FnMut(i32, i32, i32) -> BlockType,
    ) -> Self {
        let mut solid_array = BitVec::with_capacity(CUBE_VOLUME);
        let mut blocks = Vec::with_capacity(CUBE_VOLUME);
        for column in 0..COLUMNS_PER_NODE as i32 {
            let (x, z) = (column % CUBE_WIDTH, column / CUBE_WIDTH);
            for y in 0..CUBE_HEIGHT {
                let block_type = block_at(x, y, z);
                solid_array.push(block_type.is_present());
                blocks.push(Block::new(block_type));
            }
        }
        Cube {
            cube_x,
            cube_y,
            cube_z,
            solid_array,
            blocks,
            leaves: Vec::new(),
        }
    }

    /// Cube X coordinate.
    pub fn cube_x(&self) -> i32 {
        self.cube_x
    }

    /// Cube Y coordinate; the `scaled_y` of the leaf this cube binds to.
    pub fn cube_y(&self) -> i32 {
        self.cube_y
    }

    /// Cube Z coordinate.
    pub fn cube_z(&self) -> i32 {
        self.cube_z
    }

    /// World Y of the bottom layer of this cube.
    pub fn min_block_y(&self) -> i32 {
        cube_to_min_block(self.cube_y)
    }

    fn index(x: i32, y: i32, z: i32) -> usize {
        debug_assert!((0..CUBE_HEIGHT).contains(&y), "local y {y} outside cube");
        column_index(x, z) * CUBE_HEIGHT as usize + y as usize
    }

    /// Gets the block at the specified cube-local coordinates.
    ///
    /// # Panics
    /// Panics if `y` is outside `0..CUBE_HEIGHT`.
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Block {
        self.blocks[Self::index(x, y, z)]
    }

    /// Replaces the block at the specified cube-local coordinates.
    ///
    /// The cube does not notify any tree; callers route the change through
    /// [`SurfaceTrackerColumn::on_block_changed`](crate::heightmap::SurfaceTrackerColumn::on_block_changed)
    /// or [`SurfaceTrackerTree::on_block_changed`](crate::heightmap::SurfaceTrackerTree::on_block_changed)
    /// afterwards.
    ///
    /// # Returns
    /// The type of the block that was there before.
    ///
    /// # Panics
    /// Panics if `y` is outside `0..CUBE_HEIGHT`.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block_type: BlockType) -> BlockType {
        let index = Self::index(x, y, z);
        let previous = self.blocks[index].get_type();
        self.blocks[index] = Block::new(block_type);
        self.solid_array.set(index, block_type.is_present());
        previous
    }

    /// World Y of the highest block in column `(x, z)` that counts for `kind`, or
    /// [`NO_HEIGHT`] if there is none.
    pub fn highest(&self, x: i32, z: i32, kind: HeightmapKind) -> i32 {
        let start = column_index(x, z) * CUBE_HEIGHT as usize;
        let column = &self.solid_array[start..start + CUBE_HEIGHT as usize];
        let found = match kind {
            HeightmapKind::WorldSurface => column.last_one(),
            _ => column
                .iter_ones()
                .rev()
                .find(|&y| kind.qualifies(self.blocks[start + y].get_type())),
        };
        found.map_or(NO_HEIGHT, |y| self.min_block_y() + y as i32)
    }

    /// The leaf of the tree tracking `heightmap_type` this cube is bound to, if any.
    pub fn leaf(&self, heightmap_type: HeightmapType) -> Option<NodeId> {
        self.leaves
            .iter()
            .find(|handle| handle.heightmap_type == heightmap_type)
            .map(|handle| handle.node)
    }

    /// Returns `true` if the cube is bound to at least one leaf.
    pub fn is_attached(&self) -> bool {
        !self.leaves.is_empty()
    }
}

impl HeightmapSource for Cube {
    fn on_attached_to_leaf(&mut self, leaf: LeafHandle) {
        self.leaves
            .retain(|handle| handle.heightmap_type != leaf.heightmap_type);
        self.leaves.push(leaf);
    }

    fn on_detached<St: HeightmapStorage + ?Sized>(&mut self, leaf: LeafHandle, _: &mut St) {
        self.leaves.retain(|handle| *handle != leaf);
    }

    fn get_highest(&self, x: i32, z: i32, heightmap_type: HeightmapType) -> i32 {
        HeightmapKind::from_type(heightmap_type).map_or(NO_HEIGHT, |kind| self.highest(x, z, kind))
    }

    fn source_vertical_index(&self) -> i32 {
        self.cube_y
    }
}
