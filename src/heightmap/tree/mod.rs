//! # Surface Tracker Tree Module
//!
//! The multi-resolution height cache of one column-group and one heightmap type.
//!
//! ## Structure
//!
//! Nodes live in an arena owned by [`SurfaceTrackerTree`] and are addressed by generational
//! [`NodeId`]s. A branch owns its children through a fixed-size slot array (2 slots at
//! [`MAX_SCALE`], 16 below); absent slots are subtrees that were never needed. Every node
//! keeps a plain `parent` id pointing back up.
//!
//! ```text
//!                  root (scale 6)
//!                 /              \
//!       scale 5, y -1          scale 5, y 0
//!            |                  /    ...   \
//!           ...             scale 4 ...
//!            |                  |
//!     leaf (scale 0)      leaf (scale 0)  <- bound to a HeightmapSource
//! ```
//!
//! ## Lazy Heights
//!
//! Each node caches one height per column together with a dirty bit. Writes below a
//! column's known top never propagate; writes above it update the leaf eagerly and dirty
//! the ancestors only as far as the new value could raise their maximum. Queries resolve
//! dirty columns on the way down and clear the bits they resolve.
//!
//! ## Submodules
//!
//! - `branch`: materializing paths, routing lookups, collapsing empty branches.
//! - `leaf`: binding sources, block updates, unloading sources.

mod branch;
mod leaf;

use std::fmt;

use log::trace;

use crate::core::Shared;
use crate::heightmap::coords::{
    child_count, column_index, COLUMNS_PER_NODE, MAX_SCALE, NO_HEIGHT, WIDTH_BLOCKS,
};
use crate::heightmap::error::Result;
use crate::heightmap::node::{HeightmapType, NodeId, NodeState};
use crate::heightmap::packed::PackedHeights;
use crate::heightmap::source::HeightmapSource;
use crate::heightmap::storage::HeightmapStorage;

pub(crate) enum NodeKind<S> {
    Branch { children: Vec<Option<NodeId>> },
    Leaf { source: Option<Shared<S>> },
}

pub(crate) struct Node<S> {
    generation: u32,
    parent: Option<NodeId>,
    state: NodeState,
    kind: NodeKind<S>,
}

/// Sparse height cache for one `(column_x, column_z, heightmap_type)`.
///
/// Created with its permanent root in place. Sources are attached with
/// [`load_source`](Self::load_source), which materializes (or rehydrates from storage) every
/// node on the way down, and detached with [`unload_source`](Self::unload_source), which
/// collapses branches that are left without children.
///
/// Nothing here is internally synchronized: a tree is driven by one worker at a time.
/// [`get_height`](Self::get_height) takes `&mut self` because resolving a dirty column
/// writes the result back.
pub struct SurfaceTrackerTree<S> {
    column_x: i32,
    column_z: i32,
    heightmap_type: HeightmapType,
    nodes: Vec<Option<Node<S>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
}

impl<S> fmt::Debug for SurfaceTrackerTree<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceTrackerTree")
            .field("column_x", &self.column_x)
            .field("column_z", &self.column_z)
            .field("heightmap_type", &self.heightmap_type)
            .field("live", &self.len())
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl<S: HeightmapSource> SurfaceTrackerTree<S> {
    /// Creates a tree holding only its permanent root (`scale == MAX_SCALE`, `scaled_y == 0`).
    pub fn new(column_x: i32, column_z: i32, heightmap_type: HeightmapType) -> Self {
        let mut tree = Self {
            column_x,
            column_z,
            heightmap_type,
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
        };
        let root_state = NodeState::new(i32::from(MAX_SCALE), 0, heightmap_type)
            .unwrap_or_else(|_| unreachable!("MAX_SCALE is a valid scale"));
        tree.root = tree.insert(None, root_state, branch_kind(MAX_SCALE));
        tree
    }

    /// Column-group X this tree tracks.
    pub fn column_x(&self) -> i32 {
        self.column_x
    }

    /// Column-group Z this tree tracks.
    pub fn column_z(&self) -> i32 {
        self.column_z
    }

    /// Heightmap type this tree tracks.
    pub fn heightmap_type(&self) -> HeightmapType {
        self.heightmap_type
    }

    /// The permanent root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the height of the highest qualifying block in column `(x, z)` under `node`,
    /// or [`NO_HEIGHT`] if there is none.
    ///
    /// Resolves the column first if it is dirty, then clears its dirty bit. `x` and `z`
    /// may be global coordinates.
    ///
    /// # Panics
    /// Panics if `node` is stale, or if resolving reaches a leaf with no attached source.
    pub fn get_height(&mut self, node: NodeId, x: i32, z: i32) -> i32 {
        let idx = column_index(x, z);
        let state = &self.node(node).state;
        if state.is_dirty(idx) {
            return self.update_height(node, x, z, idx);
        }
        state.cached_height(idx)
    }

    /// Recomputes column `idx` of `node`, stores the result and clears its dirty bit.
    ///
    /// Leaves ask their source. Branches scan their children from the highest slot down and
    /// take the first height that is not [`NO_HEIGHT`]; children are ordered by Y, so that
    /// is the maximum.
    fn update_height(&mut self, node: NodeId, x: i32, z: i32, idx: usize) -> i32 {
        let slots = match &self.node(node).kind {
            NodeKind::Leaf {
                source: Some(source),
            } => {
                let height = source.get().get_highest(x, z, self.heightmap_type);
                return self.resolve(node, idx, height);
            }
            NodeKind::Leaf { source: None } => {
                panic!("surface tracker leaf {node:?} was queried with no attached source")
            }
            NodeKind::Branch { children } => children.len(),
        };

        let mut height = NO_HEIGHT;
        for slot in (0..slots).rev() {
            if let Some(child) = self.child_at(node, slot) {
                height = self.get_height(child, x, z);
                if height != NO_HEIGHT {
                    break;
                }
            }
        }
        self.resolve(node, idx, height)
    }

    fn resolve(&mut self, node: NodeId, idx: usize, height: i32) -> i32 {
        let state = &mut self.node_mut(node).state;
        state.store_height(idx, height);
        state.clear_dirty(idx);
        height
    }

    /// Marks column `(x, z)` dirty on `node` and on every ancestor.
    ///
    /// Used when the top block of a column is removed and the new top is unknown.
    pub fn mark_dirty(&mut self, node: NodeId, x: i32, z: i32) {
        let idx = column_index(x, z);
        let mut current = Some(node);
        while let Some(id) = current {
            let node = self.node_mut(id);
            node.state.set_dirty(idx);
            current = node.parent;
        }
    }

    /// Dirties, for every column, the ancestors of `node` whose cached height lies inside or
    /// below `node`'s span, since any of them may now be stale.
    ///
    /// Propagation for a column stops at the first ancestor that is not dirty and already
    /// knows a height above the span. [`load_source`](Self::load_source) calls this after
    /// binding a source; callers that attach nodes by other means must call it themselves.
    pub fn mark_ancestors_dirty(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).parent else {
            return;
        };
        // one past the top, so ancestors holding exactly the top block are dirtied too
        let above_top = self.node(node).state.span_top_y() + 1;
        for idx in 0..COLUMNS_PER_NODE {
            let (x, z) = column_of(idx);
            self.mark_tree_dirty_if_required(parent, x, z, above_top);
        }
    }

    /// Dirties column `(x, z)` on `node` and upward for as long as `height` exceeds the
    /// cached value or the column is already dirty.
    pub(crate) fn mark_tree_dirty_if_required(&mut self, node: NodeId, x: i32, z: i32, height: i32) {
        let idx = column_index(x, z);
        let mut current = Some(node);
        while let Some(id) = current {
            let node = self.node_mut(id);
            if height <= node.state.cached_height(idx) && !node.state.is_dirty(idx) {
                break;
            }
            node.state.set_dirty(idx);
            current = node.parent;
        }
    }

    /// Resolves every dirty column of `node`.
    ///
    /// Run before a node is unloaded so that nothing is persisted or discarded with
    /// unresolved dirtiness.
    pub fn update_dirty_heights(&mut self, node: NodeId) {
        if !self.is_any_dirty(node) {
            return;
        }
        for idx in 0..COLUMNS_PER_NODE {
            if self.node(node).state.is_dirty(idx) {
                let (x, z) = column_of(idx);
                self.update_height(node, x, z, idx);
            }
        }
    }

    /// Resolves every dirty column of every live node that can be resolved, leaving out
    /// leaves with no source.
    ///
    /// A branch resolves a column from the children it has loaded at that moment, so a
    /// column resolved after a sibling subtree was unloaded forgets that subtree. Running
    /// this before unloading several sources keeps the saved maxima exact.
    pub fn update_all_dirty_heights(&mut self) {
        let dirty: Vec<NodeId> = self
            .node_ids()
            .filter(|&id| {
                let node = self.node(id);
                node.state.is_any_dirty()
                    && !matches!(node.kind, NodeKind::Leaf { source: None })
            })
            .collect();
        for id in dirty {
            self.update_dirty_heights(id);
        }
    }

    /// Returns `true` if any column of `node` is dirty.
    pub fn is_any_dirty(&self, node: NodeId) -> bool {
        self.node(node).state.is_any_dirty()
    }

    /// Marks every column of `node` dirty, forcing a full recompute on the next queries.
    pub fn set_all_dirty(&mut self, node: NodeId) {
        self.node_mut(node).state.set_all_dirty();
    }

    /// Persists `node` and every loaded descendant that requires saving. Nothing is
    /// unloaded and dirty columns are saved as they are.
    ///
    /// # Errors
    /// Returns the first storage error; nodes visited before it stay saved.
    pub fn save<St: HeightmapStorage + ?Sized>(
        &mut self,
        node: NodeId,
        storage: &mut St,
    ) -> Result<()> {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            self.save_if_required(id, storage)?;
            if let NodeKind::Branch { children } = &self.node(id).kind {
                stack.extend(children.iter().flatten());
            }
        }
        Ok(())
    }

    pub(crate) fn save_if_required<St: HeightmapStorage + ?Sized>(
        &mut self,
        node: NodeId,
        storage: &mut St,
    ) -> Result<()> {
        let (column_x, column_z) = (self.column_x, self.column_z);
        let state = &mut self.node_mut(node).state;
        if !state.requires_save() {
            return Ok(());
        }
        // the stored copy must not claim to be unsaved
        state.clear_requires_save();
        if let Err(err) = storage.save_node(column_x, column_z, &state.to_record()) {
            state.set_requires_save();
            return Err(err.into());
        }
        Ok(())
    }

    /// Writes the 256 heights under `node` into `data` in the format sent to clients: one
    /// entry per column at `dx + dz * 16`, holding `max(height + 1, min_value) - min_value`.
    ///
    /// Entries that do not fit the width of `data` are truncated to it.
    pub fn write_data_for_client(
        &mut self,
        node: NodeId,
        min_x: i32,
        min_z: i32,
        data: &mut PackedHeights,
        min_value: i32,
    ) {
        let mask = i64::from(data.max_value());
        for dx in 0..WIDTH_BLOCKS {
            for dz in 0..WIDTH_BLOCKS {
                let height = i64::from(self.get_height(node, min_x + dx, min_z + dz));
                let value = (height + 1).max(i64::from(min_value)) - i64::from(min_value);
                data.set((dx + dz * WIDTH_BLOCKS) as usize, (value & mask) as u32);
            }
        }
    }

}

impl<S> SurfaceTrackerTree<S> {
    /// Returns `true` if `node` refers to a live node of this tree.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.idx())
            .and_then(|slot| slot.as_ref())
            .is_some_and(|n| n.generation == node.generation())
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Always `false`: the root is permanent.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over every live node.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref()
                .map(|node| NodeId::new(idx as u32, node.generation))
        })
    }

    /// Parent of `node`, `None` for the root and for detached nodes.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    /// Child slots of `node`; empty for leaves.
    pub fn children(&self, node: NodeId) -> &[Option<NodeId>] {
        match &self.node(node).kind {
            NodeKind::Branch { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    /// Returns `true` if `node` is a leaf.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        matches!(self.node(node).kind, NodeKind::Leaf { .. })
    }

    /// Source bound to `node`, if it is a leaf with one attached.
    pub fn leaf_source(&self, node: NodeId) -> Option<&Shared<S>> {
        match &self.node(node).kind {
            NodeKind::Leaf { source } => source.as_ref(),
            NodeKind::Branch { .. } => None,
        }
    }

    /// Cached state of `node`.
    pub fn state(&self, node: NodeId) -> &NodeState {
        &self.node(node).state
    }

    fn child_at(&self, branch: NodeId, slot: usize) -> Option<NodeId> {
        match &self.node(branch).kind {
            NodeKind::Branch { children } => children[slot],
            NodeKind::Leaf { .. } => None,
        }
    }

    // --- arena ---

    pub(crate) fn insert(
        &mut self,
        parent: Option<NodeId>,
        state: NodeState,
        kind: NodeKind<S>,
    ) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].wrapping_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.nodes.push(None);
            self.generations.push(1);
            (self.nodes.len() - 1, 1)
        };
        trace!(
            "Materialized node scale {} y {} ({}, {}) type {}",
            state.scale(),
            state.scaled_y(),
            self.column_x,
            self.column_z,
            self.heightmap_type
        );
        self.nodes[idx] = Some(Node {
            generation,
            parent,
            state,
            kind,
        });
        NodeId::new(idx as u32, generation)
    }

    /// Frees `node`, clearing its slot in the parent. The node must have no live children.
    pub(crate) fn free(&mut self, node: NodeId) {
        debug_assert!(
            self.children(node).iter().all(Option::is_none),
            "freeing a branch with live children"
        );
        if let Some(parent) = self.node(node).parent {
            if let NodeKind::Branch { children } = &mut self.node_mut(parent).kind {
                for slot in children.iter_mut().filter(|slot| **slot == Some(node)) {
                    *slot = None;
                }
            }
        }
        let freed = &self.node(node).state;
        trace!(
            "Freed node scale {} y {} ({}, {}) type {}",
            freed.scale(),
            freed.scaled_y(),
            self.column_x,
            self.column_z,
            self.heightmap_type
        );
        self.nodes[node.idx()] = None;
        self.free_list.push(node.idx());
    }

    /// # Panics
    /// Panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node<S> {
        self.nodes[id.idx()]
            .as_ref()
            .filter(|node| node.generation == id.generation())
            .expect("dangling NodeId")
    }

    /// # Panics
    /// Panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<S> {
        self.nodes[id.idx()]
            .as_mut()
            .filter(|node| node.generation == id.generation())
            .expect("dangling NodeId")
    }
}

pub(crate) fn branch_kind<S>(scale: u8) -> NodeKind<S> {
    NodeKind::Branch {
        children: vec![None; child_count(scale)],
    }
}

#[inline]
fn column_of(idx: usize) -> (i32, i32) {
    let idx = idx as i32;
    (idx & (WIDTH_BLOCKS - 1), idx / WIDTH_BLOCKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::storage::{MemoryHeightmapStorage, NullHeightmapStorage};
    use crate::voxels::block::block_type::BlockType;
    use crate::voxels::cube::Cube;
    use crate::voxels::HeightmapKind;

    fn world_surface_tree() -> SurfaceTrackerTree<Cube> {
        SurfaceTrackerTree::new(0, 0, HeightmapKind::WorldSurface.heightmap_type())
    }

    #[test]
    fn freed_slots_come_back_with_a_new_generation() {
        let mut tree = world_surface_tree();
        let leaf = tree.new_leaf(3);
        tree.free(leaf);
        assert!(!tree.is_alive(leaf));

        let again = tree.new_leaf(4);
        assert_eq!(again.idx(), leaf.idx());
        assert_ne!(again, leaf);
        assert!(tree.is_alive(again));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn debug_reports_live_nodes() {
        let mut tree = world_surface_tree();
        tree.new_leaf(1);
        let printed = format!("{tree:?}");
        assert!(printed.contains("live: 2"), "{printed}");
    }

    #[test]
    fn saved_records_are_not_marked_unsaved() {
        let mut storage = MemoryHeightmapStorage::new();
        let mut tree = world_surface_tree();
        let cube = Shared::new(Cube::flat(0, 1, 0, 40));
        tree.load_source(tree.root(), &mut storage, cube).unwrap();
        tree.save(tree.root(), &mut storage).unwrap();
        let keys: Vec<_> = storage.keys().copied().collect();
        assert!(!keys.is_empty());
        for key in keys {
            assert!(!storage.get(&key).unwrap().requires_save, "{key}");
        }
    }

    #[test]
    #[should_panic(expected = "dangling NodeId")]
    fn stale_ids_panic() {
        let mut tree = world_surface_tree();
        let leaf = tree.new_leaf(0);
        tree.free(leaf);
        let _ = tree.state(leaf);
    }

    #[test]
    #[should_panic(expected = "no attached source")]
    fn resolving_a_leaf_without_source_panics() {
        let mut tree = world_surface_tree();
        let leaf = tree.new_leaf(0);
        tree.set_all_dirty(leaf);
        tree.get_height(leaf, 0, 0);
    }

    #[test]
    fn mark_dirty_reaches_the_root() {
        let mut tree = world_surface_tree();
        let cube = Shared::new(Cube::flat(0, 2, 0, 70));
        let leaf = tree
            .load_source(tree.root(), &mut NullHeightmapStorage, cube)
            .unwrap();
        let root = tree.root();
        assert_eq!(tree.get_height(root, 0, 0), 70);
        assert!(!tree.state(root).is_dirty(0));

        tree.mark_dirty(leaf, 0, 0);
        let mut node = Some(leaf);
        while let Some(id) = node {
            assert!(tree.state(id).is_dirty(0));
            node = tree.parent(id);
        }
        assert_eq!(tree.get_height(root, 0, 0), 70);
    }

    #[test]
    fn save_writes_what_changed() {
        let mut storage = MemoryHeightmapStorage::new();
        let mut tree = world_surface_tree();
        let cube = Shared::new(Cube::flat(0, 2, 0, 70));
        let leaf = tree
            .load_source(tree.root(), &mut storage, cube.clone())
            .unwrap();

        tree.save(tree.root(), &mut storage).unwrap();
        assert_eq!(storage.len(), usize::from(MAX_SCALE) + 1);
        let ids: Vec<NodeId> = tree.node_ids().collect();
        assert!(ids.iter().all(|&id| !tree.state(id).requires_save()));

        cube.get_mut().set_block(0, 20, 0, BlockType::WOOD);
        tree.on_block_changed(leaf, 0, 84, 0, true);
        assert!(tree.state(leaf).requires_save());
        assert!(tree.state(tree.root()).requires_save());
        tree.save(tree.root(), &mut storage).unwrap();
        assert!(ids.iter().all(|&id| !tree.state(id).requires_save()));
    }
}
