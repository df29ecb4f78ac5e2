//! # Coordinate Module
//!
//! Constants and arithmetic for moving between block heights, cube (scale 0) indices and the
//! `(scale, scaled_y)` address of every node in a surface tracker tree.
//!
//! ## Vertical Layout
//!
//! A scale 0 node spans one cube of [`SCALE_0_NODE_HEIGHT`] blocks. Every scale above that
//! multiplies the span by [`NODE_COUNT`], except the permanent root at [`MAX_SCALE`] which
//! only has [`ROOT_NODE_COUNT`] children: one covering everything below cube Y 0, one
//! covering everything at or above it.
//!
//! ## Height Encoding
//!
//! Heights are stored relative to the bottom of a node's span, shifted up by one so that a
//! stored `0` can mean "no qualifying block" ([`NO_HEIGHT`] once decoded).

use crate::heightmap::error::{Result, SurfaceTrackerError};

/// The highest scale a node can have. Nodes at this scale are permanent roots.
pub const MAX_SCALE: u8 = 6;
/// Number of bits needed to address the children of a non-root branch.
pub const NODE_COUNT_BITS: u32 = 4;
/// Number of children of a non-root branch.
pub const NODE_COUNT: usize = 1 << NODE_COUNT_BITS;
/// Number of bits needed to address the children of the root.
pub const ROOT_NODE_COUNT_BITS: u32 = 1;
/// Number of children of the root.
pub const ROOT_NODE_COUNT: usize = 1 << ROOT_NODE_COUNT_BITS;

/// Width of a node's footprint in blocks, along both X and Z.
pub const WIDTH_BLOCKS: i32 = 16;
/// Number of columns in a node's footprint.
pub const COLUMNS_PER_NODE: usize = (WIDTH_BLOCKS * WIDTH_BLOCKS) as usize;

/// log2 of [`SCALE_0_NODE_HEIGHT`].
pub const SCALE_0_NODE_BITS: u32 = 5;
/// Height in blocks of a scale 0 node (one cube).
pub const SCALE_0_NODE_HEIGHT: i32 = 1 << SCALE_0_NODE_BITS;
/// Bits needed for a relative height at scale 0, excluding the sentinel.
const BASE_SIZE_BITS: u32 = SCALE_0_NODE_BITS;

/// Decoded height of a column with no qualifying block.
pub const NO_HEIGHT: i32 = i32::MIN;

/// Checks that `scale` is a valid node scale and narrows it.
///
/// # Errors
/// Returns [`SurfaceTrackerError::InvalidScale`] when `scale < 0` or `scale > MAX_SCALE`.
pub fn validate_scale(scale: i32) -> Result<u8> {
    u8::try_from(scale)
        .ok()
        .filter(|s| *s <= MAX_SCALE)
        .ok_or(SurfaceTrackerError::InvalidScale { scale })
}

/// Returns the number of bits each stored height takes at the given scale.
///
/// One extra bit on top of the span's height bits makes room for the sentinel.
///
/// # Errors
/// Returns [`SurfaceTrackerError::InvalidScale`] when `scale < 0` or `scale > MAX_SCALE`.
pub fn bits_for_scale(scale: i32) -> Result<usize> {
    let scale = validate_scale(scale)?;
    Ok((BASE_SIZE_BITS + 1 + u32::from(scale) * NODE_COUNT_BITS) as usize)
}

/// Index of the column `(x, z)` within a node. Accepts global or node-local coordinates.
#[inline]
pub fn column_index(x: i32, z: i32) -> usize {
    ((z & (WIDTH_BLOCKS - 1)) * WIDTH_BLOCKS + (x & (WIDTH_BLOCKS - 1))) as usize
}

/// Converts a block Y to the Y of the cube containing it.
#[inline]
pub fn block_to_cube(y: i32) -> i32 {
    y >> SCALE_0_NODE_BITS
}

/// Lowest block Y inside the given cube.
#[inline]
pub fn cube_to_min_block(cube_y: i32) -> i32 {
    cube_y << SCALE_0_NODE_BITS
}

/// Number of child slots of a branch at `scale`.
#[inline]
pub fn child_count(scale: u8) -> usize {
    if scale == MAX_SCALE {
        ROOT_NODE_COUNT
    } else {
        NODE_COUNT
    }
}

/// Slot of the child of `(scale, scaled_y)` that covers cube `y`.
///
/// The result is only a valid slot if `y` lies inside the branch's span; callers check it
/// against [`child_count`].
pub(crate) fn index_of_child(y: i32, scale: u8, scaled_y: i32) -> i32 {
    debug_assert!(scale > 0, "leaves have no children");
    if scale == MAX_SCALE {
        return if y < 0 { 0 } else { 1 };
    }
    let scaled = y >> ((u32::from(scale) - 1) * NODE_COUNT_BITS);
    scaled - (scaled_y << NODE_COUNT_BITS)
}

/// Scaled Y of the child in slot `index` of the branch `(scale, scaled_y)`.
pub(crate) fn child_scaled_y(index: usize, scale: u8, scaled_y: i32) -> i32 {
    debug_assert!(scale > 0, "leaves have no children");
    if scale == MAX_SCALE {
        return if index == 0 { -1 } else { 0 };
    }
    (scaled_y << NODE_COUNT_BITS) + index as i32
}

/// Lowest cube Y covered by the node `(scale, scaled_y)`.
pub fn scaled_y_bottom_y(scaled_y: i32, scale: u8) -> i32 {
    if scale == MAX_SCALE {
        return -(1 << ((u32::from(scale) - 1) * NODE_COUNT_BITS));
    }
    scaled_y << (u32::from(scale) * NODE_COUNT_BITS)
}

/// Number of cubes covered by a node at `scale`.
pub fn span_in_cubes(scale: u8) -> i32 {
    if scale == MAX_SCALE {
        return (ROOT_NODE_COUNT as i32) << ((u32::from(scale) - 1) * NODE_COUNT_BITS);
    }
    1 << (u32::from(scale) * NODE_COUNT_BITS)
}

/// Highest block Y inside the span of the node `(scale, scaled_y)`.
pub fn span_top_y(scaled_y: i32, scale: u8) -> i32 {
    cube_to_min_block(scaled_y_bottom_y(scaled_y, scale) + span_in_cubes(scale)) - 1
}

/// Decodes a stored relative height into a block Y.
pub fn rel_to_abs_y(relative_y: u32, scaled_y: i32, scale: u8) -> i32 {
    if relative_y == 0 {
        return NO_HEIGHT;
    }
    relative_y as i32 - 1 + cube_to_min_block(scaled_y_bottom_y(scaled_y, scale))
}

/// Encodes a block Y as a height relative to the node `(scale, scaled_y)`.
pub fn abs_to_rel_y(absolute_y: i32, scaled_y: i32, scale: u8) -> u32 {
    if absolute_y == NO_HEIGHT {
        return 0;
    }
    let relative = absolute_y + 1 - cube_to_min_block(scaled_y_bottom_y(scaled_y, scale));
    debug_assert!(
        relative > 0,
        "height {absolute_y} lies below node (scale {scale}, scaled y {scaled_y})"
    );
    relative as u32
}
