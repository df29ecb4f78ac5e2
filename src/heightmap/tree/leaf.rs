//! Leaf operations. A leaf caches the heights of exactly one source and keeps them correct
//! eagerly on writes at or above the known top of a column.

use log::warn;

use super::{NodeKind, SurfaceTrackerTree};
use crate::core::Shared;
use crate::heightmap::coords::{column_index, COLUMNS_PER_NODE};
use crate::heightmap::error::Result;
use crate::heightmap::node::{LeafHandle, NodeId, NodeState};
use crate::heightmap::source::HeightmapSource;
use crate::heightmap::storage::HeightmapStorage;

impl<S: HeightmapSource> SurfaceTrackerTree<S> {
    /// Creates a detached leaf for cube `scaled_y` with no source bound.
    pub fn new_leaf(&mut self, scaled_y: i32) -> NodeId {
        let state = NodeState::new(0, scaled_y, self.heightmap_type)
            .unwrap_or_else(|_| unreachable!("0 is a valid scale"));
        self.insert(None, state, NodeKind::Leaf { source: None })
    }

    /// Binds `source` to `leaf` and fills every column from it.
    ///
    /// The source is told its [`LeafHandle`] first. Afterwards all 256 heights match the
    /// source and no column is dirty. Ancestors are not touched.
    ///
    /// A source already bound to `leaf` is detached first, with its
    /// [`on_detached`](HeightmapSource::on_detached) hook receiving `storage`. Rebinding the
    /// same source only refreshes the heights.
    ///
    /// # Panics
    /// Panics if `leaf` is stale or not a leaf.
    pub fn bind_source<St: HeightmapStorage + ?Sized>(
        &mut self,
        leaf: NodeId,
        storage: &mut St,
        source: Shared<S>,
    ) {
        assert!(self.is_leaf(leaf), "only leaves can be bound to a source");
        let handle = LeafHandle {
            heightmap_type: self.heightmap_type,
            node: leaf,
        };
        let previous = match &mut self.node_mut(leaf).kind {
            NodeKind::Leaf { source: bound } => bound.take(),
            NodeKind::Branch { .. } => None,
        };
        match previous {
            Some(previous) if previous.ptr_eq(&source) => {}
            Some(previous) => {
                warn!(
                    "Rebinding surface tracker leaf at y {} that already had a source",
                    self.state(leaf).scaled_y()
                );
                previous.get_mut().on_detached(handle, storage);
                source.get_mut().on_attached_to_leaf(handle);
            }
            None => source.get_mut().on_attached_to_leaf(handle),
        }

        let mut heights = [0_i32; COLUMNS_PER_NODE];
        {
            let source = source.get();
            for (idx, height) in heights.iter_mut().enumerate() {
                let idx = idx as i32;
                *height = source.get_highest(idx & 15, idx >> 4, self.heightmap_type);
            }
        }

        let node = self.node_mut(leaf);
        for (idx, height) in heights.into_iter().enumerate() {
            node.state.store_height(idx, height);
        }
        node.state.clear_all_dirty();
        node.state.set_requires_save();
        if let NodeKind::Leaf { source: bound } = &mut node.kind {
            *bound = Some(source);
        }
    }

    /// Tells `leaf` that the block at `(x, y, z)` changed. `qualifies` is whether the
    /// block now there counts for this tree's heightmap type. The source must already
    /// reflect the change.
    ///
    /// - Below the column's cached top nothing can change, so nothing happens.
    /// - Above it, a qualifying block becomes the new top and ancestors are dirtied for
    ///   as long as it beats their cached value.
    /// - At it, a block that no longer qualifies leaves the new top unknown, so the column
    ///   is marked dirty on the leaf and every ancestor.
    ///
    /// A column that is already dirty is left alone until it is resolved.
    ///
    /// # Panics
    /// Panics if `leaf` is stale.
    pub fn on_block_changed(&mut self, leaf: NodeId, x: i32, y: i32, z: i32, qualifies: bool) {
        let idx = column_index(x, z);
        let node = self.node_mut(leaf);
        debug_assert!(matches!(node.kind, NodeKind::Leaf { .. }));
        if node.state.is_dirty(idx) {
            return;
        }

        let cached = node.state.cached_height(idx);
        if y > cached {
            if qualifies {
                node.state.store_height(idx, y);
                node.state.set_requires_save();
                if let Some(parent) = node.parent {
                    self.mark_tree_dirty_if_required(parent, x, z, y);
                }
            }
        } else if y == cached && !qualifies {
            self.mark_dirty(leaf, x, z);
        }
    }

    /// Detaches the source of `leaf` and unloads the leaf.
    ///
    /// Dirty columns are resolved against the source and the leaf, together with every
    /// branch about to lose its last child, is saved if required. Then the source's
    /// [`on_detached`](HeightmapSource::on_detached) hook runs and the leaf is removed.
    /// Branches left without children are collapsed up to the permanent root; see
    /// [`SurfaceTrackerTree::load_source`] for how they come back.
    ///
    /// # Errors
    /// Passes storage errors through. Every save happens before the source is detached, so
    /// on error the source stays bound and no node is removed.
    ///
    /// # Panics
    /// Panics if `leaf` is stale or not a leaf.
    pub fn unload_source<St: HeightmapStorage + ?Sized>(
        &mut self,
        leaf: NodeId,
        storage: &mut St,
    ) -> Result<()> {
        assert!(self.is_leaf(leaf), "only leaves have a source to unload");
        let doomed = self.unload_chain(leaf, storage)?;

        let handle = LeafHandle {
            heightmap_type: self.heightmap_type,
            node: leaf,
        };
        if let NodeKind::Leaf { source } = &mut self.node_mut(leaf).kind {
            if let Some(source) = source.take() {
                source.get_mut().on_detached(handle, storage);
            }
        }
        self.free_chain(doomed);
        Ok(())
    }
}
