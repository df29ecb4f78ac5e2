//! Branch operations: building the path down to a leaf, finding leaves, and collapsing
//! branches once their last child is gone.

use log::{debug, trace};

use super::{branch_kind, NodeKind, SurfaceTrackerTree};
use crate::core::Shared;
use crate::heightmap::coords::{
    child_scaled_y, index_of_child, scaled_y_bottom_y, span_in_cubes, validate_scale, MAX_SCALE,
};
use crate::heightmap::error::{Result, SurfaceTrackerError};
use crate::heightmap::node::{NodeId, NodeState};
use crate::heightmap::source::HeightmapSource;
use crate::heightmap::storage::{HeightmapStorage, NodeKey, NodeRecord};

impl<S: HeightmapSource> SurfaceTrackerTree<S> {
    /// Creates a detached branch with no children.
    ///
    /// # Errors
    /// Returns `InvalidScale` if `scale` is 0 or greater than `MAX_SCALE`.
    pub fn new_branch(&mut self, scale: i32, scaled_y: i32) -> Result<NodeId> {
        let narrowed = validate_scale(scale)?;
        if narrowed == 0 {
            return Err(SurfaceTrackerError::InvalidScale { scale });
        }
        let state = NodeState::new(scale, scaled_y, self.heightmap_type)?;
        Ok(self.insert(None, state, branch_kind(narrowed)))
    }

    /// Creates a detached node from a persisted record: a branch with no children, or a
    /// leaf with no source.
    ///
    /// # Errors
    /// Returns `InvalidScale` or `Storage(Corrupt)` if the record is not a valid node of
    /// this tree's heightmap type.
    pub fn restore_node(&mut self, record: NodeRecord) -> Result<NodeId> {
        let key = NodeKey {
            heightmap_type: self.heightmap_type,
            ..record.key(self.column_x, self.column_z)
        };
        let state = NodeState::from_record(key, record)?;
        Ok(self.insert(None, state, node_kind(key.scale)))
    }

    /// Binds `source` to the leaf at its vertical index below `node`, materializing every
    /// missing node on the way and returning the leaf.
    ///
    /// A missing node is first looked up in `storage` and rehydrated if it was saved
    /// before; otherwise it is created fresh. Once the source is bound the leaf's ancestors
    /// are dirtied through [`mark_ancestors_dirty`](Self::mark_ancestors_dirty).
    ///
    /// # Errors
    /// Returns `SourceOutOfRange` if the source's vertical index is not inside `node`'s
    /// span, and passes storage errors through. On error, branches created by this call are
    /// removed again and no source is bound.
    pub fn load_source<St: HeightmapStorage + ?Sized>(
        &mut self,
        node: NodeId,
        storage: &mut St,
        source: Shared<S>,
    ) -> Result<NodeId> {
        let source_y = source.get().source_vertical_index();
        let state = &self.node(node).state;
        let (scale, scaled_y) = (state.scale(), state.scaled_y());
        let bottom = scaled_y_bottom_y(scaled_y, scale);
        let in_span = if scale == 0 {
            source_y == scaled_y
        } else {
            (bottom..bottom + span_in_cubes(scale)).contains(&source_y)
        };
        if !in_span {
            return Err(SurfaceTrackerError::SourceOutOfRange {
                source_y,
                scale,
                scaled_y,
            });
        }

        let mut current = node;
        while !self.is_leaf(current) {
            match self.get_or_create_child(current, source_y, storage) {
                Ok(child) => current = child,
                Err(err) => {
                    self.discard_empty_path(current, node);
                    return Err(err);
                }
            }
        }
        self.bind_source(current, storage, source);
        self.mark_ancestors_dirty(current);
        Ok(current)
    }

    /// Returns the child of `branch` covering cube `source_y`, loading it from `storage`
    /// or creating it if the slot is empty.
    fn get_or_create_child<St: HeightmapStorage + ?Sized>(
        &mut self,
        branch: NodeId,
        source_y: i32,
        storage: &mut St,
    ) -> Result<NodeId> {
        let state = &self.node(branch).state;
        let (scale, scaled_y) = (state.scale(), state.scaled_y());
        let slot = index_of_child(source_y, scale, scaled_y) as usize;
        if let Some(child) = self.children(branch)[slot] {
            return Ok(child);
        }

        let child_scale = scale - 1;
        let child_y = child_scaled_y(slot, scale, scaled_y);
        let stored = storage.load_node(
            self.column_x,
            self.column_z,
            self.heightmap_type,
            child_scale,
            child_y,
        )?;
        let state = match stored {
            Some(record) => {
                trace!(
                    "Rehydrating node scale {child_scale} y {child_y} ({}, {}) type {}",
                    self.column_x,
                    self.column_z,
                    self.heightmap_type
                );
                let key = NodeKey {
                    column_x: self.column_x,
                    column_z: self.column_z,
                    heightmap_type: self.heightmap_type,
                    scale: child_scale,
                    scaled_y: child_y,
                };
                NodeState::from_record(key, record)?
            }
            None => NodeState::new(i32::from(child_scale), child_y, self.heightmap_type)?,
        };

        let child = self.insert(Some(branch), state, node_kind(child_scale));
        if let NodeKind::Branch { children } = &mut self.node_mut(branch).kind {
            children[slot] = Some(child);
        }
        Ok(child)
    }

    /// Returns the leaf for cube `y` under `node`, or `None` if any node on the way down
    /// was never materialized or `y` is outside `node`'s span.
    pub fn get_leaf(&self, node: NodeId, y: i32) -> Option<NodeId> {
        let mut current = node;
        loop {
            let n = self.node(current);
            let (scale, scaled_y) = (n.state.scale(), n.state.scaled_y());
            match &n.kind {
                NodeKind::Leaf { .. } => return (scaled_y == y).then_some(current),
                NodeKind::Branch { children } => {
                    let slot = index_of_child(y, scale, scaled_y);
                    current = usize::try_from(slot)
                        .ok()
                        .and_then(|slot| children.get(slot).copied().flatten())?;
                }
            }
        }
    }

    /// First half of unloading the leaf or childless branch `node`: works out which nodes
    /// go with it (every ancestor left without children, stopping below the permanent root),
    /// resolves and saves them, and returns them bottom-up for [`free_chain`](Self::free_chain).
    ///
    /// The surviving ancestor also has its dirty columns resolved. Nothing is freed here, so
    /// a storage error leaves the tree's shape as it was.
    pub(crate) fn unload_chain<St: HeightmapStorage + ?Sized>(
        &mut self,
        node: NodeId,
        storage: &mut St,
    ) -> Result<Vec<NodeId>> {
        let mut doomed = vec![node];
        let mut survivor = self.parent(node);
        while let Some(parent) = survivor {
            if !self.is_collapsible(parent, 1) {
                break;
            }
            doomed.push(parent);
            survivor = self.parent(parent);
        }

        for &id in &doomed {
            self.update_dirty_heights(id);
        }
        if let Some(survivor) = survivor {
            self.update_dirty_heights(survivor);
        }
        for &id in &doomed {
            self.save_if_required(id, storage)?;
        }
        Ok(doomed)
    }

    /// Second half of unloading: frees the nodes returned by
    /// [`unload_chain`](Self::unload_chain).
    pub(crate) fn free_chain(&mut self, doomed: Vec<NodeId>) {
        if doomed.len() > 1 {
            let bottom = self.state(doomed[0]);
            debug!(
                "Collapsing {} empty branches above scale {} y {} ({}, {}) type {}",
                doomed.len() - 1,
                bottom.scale(),
                bottom.scaled_y(),
                self.column_x,
                self.column_z,
                self.heightmap_type
            );
        }
        for id in doomed {
            self.free(id);
        }
    }

    /// Frees `node` and its ancestors below `stop` for as long as they are branches without
    /// children, without saving them. Used to undo a partially built path.
    fn discard_empty_path(&mut self, node: NodeId, stop: NodeId) {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == stop || !self.is_collapsible(id, 0) {
                break;
            }
            current = self.parent(id);
            self.free(id);
        }
    }

    /// A branch can go once it is down to `remaining` children, unless it is a permanent
    /// root.
    fn is_collapsible(&self, branch: NodeId, remaining: usize) -> bool {
        let n = self.node(branch);
        match &n.kind {
            NodeKind::Branch { children } => {
                n.state.scale() != MAX_SCALE
                    && children.iter().flatten().count() <= remaining
            }
            NodeKind::Leaf { .. } => false,
        }
    }
}

fn node_kind<S>(scale: u8) -> NodeKind<S> {
    if scale == 0 {
        NodeKind::Leaf { source: None }
    } else {
        branch_kind(scale)
    }
}
