//! # Node Module
//!
//! State shared by every node of a surface tracker tree, whatever its kind: the cached
//! per-column heights, the dirty bit of every column, and the node's address.
//!
//! ## Dirty Tracking
//!
//! Each of the 256 columns carries a `(cached height, dirty)` pair. A clear dirty bit means
//! the cached height is the true maximum over the node's span. A set bit means the cached
//! value may be stale and must be recomputed before it is trusted.

use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::heightmap::coords::{
    abs_to_rel_y, bits_for_scale, rel_to_abs_y, span_top_y, validate_scale, COLUMNS_PER_NODE,
};
use crate::heightmap::error::{Result, StorageError};
use crate::heightmap::packed::PackedHeights;
use crate::heightmap::storage::{NodeKey, NodeRecord};

/// Number of `u64` words holding a node's dirty bits.
pub const DIRTY_WORDS: usize = COLUMNS_PER_NODE / u64::BITS as usize;

/// One bit per column.
pub type DirtyPositions = BitArray<[u64; DIRTY_WORDS], Lsb0>;

/// Selects which surface definition a tree tracks (top opaque block, top motion-blocking
/// block, ...). The tree never interprets it; sources do.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightmapType(pub i8);

impl fmt::Display for HeightmapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a node in a [`SurfaceTrackerTree`](crate::heightmap::SurfaceTrackerTree).
///
/// A slot index plus a generation counter. When a node is freed its slot may be reused,
/// but the reused slot gets a new generation, so a stale `NodeId` never refers to a
/// different live node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// What a source is told when it gets bound to a leaf: which tree (by heightmap type) and
/// which node in it. Block updates for that heightmap are routed back through this handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LeafHandle {
    /// Heightmap type of the tree the leaf belongs to.
    pub heightmap_type: HeightmapType,
    /// The leaf itself.
    pub node: NodeId,
}

/// Cached heights, dirty bits and address of one node.
#[derive(Clone, Debug)]
pub struct NodeState {
    heights: PackedHeights,
    dirty_positions: DirtyPositions,
    scaled_y: i32,
    scale: u8,
    heightmap_type: HeightmapType,
    requires_save: bool,
}

impl NodeState {
    /// A fresh node: every column holds the sentinel, nothing is dirty, and it requires
    /// saving because nothing has been persisted for it yet.
    ///
    /// # Errors
    /// Returns `InvalidScale` if `scale` is outside `0..=MAX_SCALE`.
    pub fn new(scale: i32, scaled_y: i32, heightmap_type: HeightmapType) -> Result<Self> {
        let bits = bits_for_scale(scale)?;
        Ok(Self {
            heights: PackedHeights::new(bits, COLUMNS_PER_NODE),
            dirty_positions: DirtyPositions::ZERO,
            scaled_y,
            scale: validate_scale(scale)?,
            heightmap_type,
            requires_save: true,
        })
    }

    /// Rebuilds the state of the node `key` from a persisted record.
    ///
    /// # Errors
    /// Returns `InvalidScale` for an out-of-range scale, and `Storage(Corrupt)` if the record
    /// was written for another node or its packed heights are too short for the scale.
    pub fn from_record(key: NodeKey, record: NodeRecord) -> Result<Self> {
        let scale = validate_scale(i32::from(record.scale))?;
        if scale != key.scale
            || record.scaled_y != key.scaled_y
            || record.heightmap_type != key.heightmap_type
        {
            return Err(StorageError::corrupt(key, "record describes a different node").into());
        }
        let bits = bits_for_scale(i32::from(scale))?;
        let heights = PackedHeights::from_raw(bits, COLUMNS_PER_NODE, record.heights)
            .ok_or_else(|| StorageError::corrupt(key, "packed heights are truncated"))?;
        Ok(Self {
            heights,
            dirty_positions: DirtyPositions::new(record.dirty_positions),
            scaled_y: record.scaled_y,
            scale,
            heightmap_type: record.heightmap_type,
            requires_save: record.requires_save,
        })
    }

    /// Snapshot of this state in its persisted form.
    pub fn to_record(&self) -> NodeRecord {
        let mut dirty_positions = [0_u64; DIRTY_WORDS];
        dirty_positions.copy_from_slice(self.dirty_positions.as_raw_slice());
        NodeRecord {
            scale: self.scale,
            scaled_y: self.scaled_y,
            heightmap_type: self.heightmap_type,
            requires_save: self.requires_save,
            heights: self.heights.to_raw(),
            dirty_positions,
        }
    }

    /// Tree level; 0 for leaves.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Index among same-scale siblings along the vertical axis.
    pub fn scaled_y(&self) -> i32 {
        self.scaled_y
    }

    /// Heightmap type of the tree this node belongs to.
    pub fn heightmap_type(&self) -> HeightmapType {
        self.heightmap_type
    }

    /// Persistence key of this node within its column-group.
    pub fn key(&self, column_x: i32, column_z: i32) -> NodeKey {
        NodeKey {
            column_x,
            column_z,
            heightmap_type: self.heightmap_type,
            scale: self.scale,
            scaled_y: self.scaled_y,
        }
    }

    /// Whether persisted state may have changed since the last save.
    pub fn requires_save(&self) -> bool {
        self.requires_save
    }

    pub(crate) fn set_requires_save(&mut self) {
        self.requires_save = true;
    }

    /// Cleared only by an explicit save.
    pub fn clear_requires_save(&mut self) {
        self.requires_save = false;
    }

    /// The cached height of column `idx`, decoded, without looking at its dirty bit.
    pub fn cached_height(&self, idx: usize) -> i32 {
        rel_to_abs_y(self.heights.get(idx), self.scaled_y, self.scale)
    }

    /// Raw stored value of column `idx`; `0` is the sentinel.
    pub fn raw_height(&self, idx: usize) -> u32 {
        self.heights.get(idx)
    }

    pub(crate) fn store_height(&mut self, idx: usize, height: i32) {
        self.heights
            .set(idx, abs_to_rel_y(height, self.scaled_y, self.scale));
    }

    /// Highest block Y inside this node's span.
    pub fn span_top_y(&self) -> i32 {
        span_top_y(self.scaled_y, self.scale)
    }

    /// Returns `true` if column `idx` must be recomputed before being trusted.
    pub fn is_dirty(&self, idx: usize) -> bool {
        self.dirty_positions[idx]
    }

    /// Returns `true` if any column is dirty.
    pub fn is_any_dirty(&self) -> bool {
        self.dirty_positions.any()
    }

    pub(crate) fn set_dirty(&mut self, idx: usize) {
        self.requires_save = true;
        self.dirty_positions.set(idx, true);
    }

    /// A stored copy may still hold the bit, so this also requires a save.
    pub(crate) fn clear_dirty(&mut self, idx: usize) {
        self.requires_save = true;
        self.dirty_positions.set(idx, false);
    }

    pub(crate) fn set_all_dirty(&mut self) {
        self.requires_save = true;
        self.dirty_positions.fill(true);
    }

    pub(crate) fn clear_all_dirty(&mut self) {
        self.dirty_positions.fill(false);
    }
}
