//! # Source Module
//!
//! The contract between a leaf and the live block data of one cube. The tree never decides
//! which blocks qualify for a heightmap; it only asks the source.

use crate::heightmap::node::{HeightmapType, LeafHandle};
use crate::heightmap::storage::HeightmapStorage;

/// Block data provider for the span of one leaf.
///
/// A source is shared between the tree and whatever owns the block data, so the tree holds
/// it as a [`Shared`](crate::core::Shared) handle. The tree takes the write lock only while
/// calling the attach and detach hooks.
pub trait HeightmapSource {
    /// Called once per tree when the source is bound to a leaf.
    ///
    /// Sources keep the handle so that block changes can be routed back to the leaf through
    /// [`SurfaceTrackerTree::on_block_changed`](crate::heightmap::SurfaceTrackerTree::on_block_changed).
    fn on_attached_to_leaf(&mut self, leaf: LeafHandle);

    /// Called when the leaf is unloaded, after the leaf's state has been persisted.
    fn on_detached<St: HeightmapStorage + ?Sized>(&mut self, leaf: LeafHandle, storage: &mut St);

    /// Highest qualifying block Y in column `(x, z)` of this source's span, or
    /// [`NO_HEIGHT`](crate::heightmap::NO_HEIGHT) if none qualifies.
    ///
    /// `x` and `z` may be global; only their low four bits are significant.
    fn get_highest(&self, x: i32, z: i32, heightmap_type: HeightmapType) -> i32;

    /// Cube Y of this source, which is the `scaled_y` of the leaf it binds to.
    fn source_vertical_index(&self) -> i32;
}
