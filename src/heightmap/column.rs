//! # Column Module
//!
//! [`SurfaceTrackerColumn`] bundles the trees of every tracked heightmap type for one
//! column-group. Sources are loaded into all of them at once, and block changes are
//! routed to the leaf of each tree that covers the changed block.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::core::Shared;
use crate::heightmap::coords::{block_to_cube, WIDTH_BLOCKS};
use crate::heightmap::error::Result;
use crate::heightmap::node::HeightmapType;
use crate::heightmap::packed::PackedHeights;
use crate::heightmap::source::HeightmapSource;
use crate::heightmap::storage::HeightmapStorage;
use crate::heightmap::tree::SurfaceTrackerTree;

/// The cube Ys of a column-group whose sources are currently loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnCubeMap {
    loaded: BTreeSet<i32>,
}

impl ColumnCubeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the cube at `cube_y` is loaded.
    pub fn is_loaded(&self, cube_y: i32) -> bool {
        self.loaded.contains(&cube_y)
    }

    /// Records `cube_y` as loaded. Returns `false` if it already was.
    pub fn mark_loaded(&mut self, cube_y: i32) -> bool {
        self.loaded.insert(cube_y)
    }

    /// Records `cube_y` as unloaded. Returns `false` if it was not loaded.
    pub fn mark_unloaded(&mut self, cube_y: i32) -> bool {
        self.loaded.remove(&cube_y)
    }

    /// Loaded cube Ys, lowest first.
    pub fn loaded(&self) -> impl Iterator<Item = i32> + '_ {
        self.loaded.iter().copied()
    }

    /// Number of loaded cubes.
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Returns `true` if no cube is loaded.
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

/// Every tracked heightmap of one column-group.
pub struct SurfaceTrackerColumn<S> {
    column_x: i32,
    column_z: i32,
    trees: BTreeMap<HeightmapType, SurfaceTrackerTree<S>>,
    cube_map: ColumnCubeMap,
}

impl<S: HeightmapSource> SurfaceTrackerColumn<S> {
    /// Creates a column-group tracking each of `heightmap_types`, with nothing loaded.
    pub fn new(
        column_x: i32,
        column_z: i32,
        heightmap_types: impl IntoIterator<Item = HeightmapType>,
    ) -> Self {
        let trees = heightmap_types
            .into_iter()
            .map(|ty| (ty, SurfaceTrackerTree::new(column_x, column_z, ty)))
            .collect();
        Self {
            column_x,
            column_z,
            trees,
            cube_map: ColumnCubeMap::new(),
        }
    }

    /// Column-group X.
    pub fn column_x(&self) -> i32 {
        self.column_x
    }

    /// Column-group Z.
    pub fn column_z(&self) -> i32 {
        self.column_z
    }

    /// Tracked heightmap types, in ascending order.
    pub fn heightmap_types(&self) -> impl Iterator<Item = HeightmapType> + '_ {
        self.trees.keys().copied()
    }

    /// The tree tracking `heightmap_type`.
    pub fn tree(&self, heightmap_type: HeightmapType) -> Option<&SurfaceTrackerTree<S>> {
        self.trees.get(&heightmap_type)
    }

    /// The tree tracking `heightmap_type`, mutably.
    pub fn tree_mut(
        &mut self,
        heightmap_type: HeightmapType,
    ) -> Option<&mut SurfaceTrackerTree<S>> {
        self.trees.get_mut(&heightmap_type)
    }

    /// Which cubes are loaded.
    pub fn cube_map(&self) -> &ColumnCubeMap {
        &self.cube_map
    }

    /// Binds `source` into every tree.
    ///
    /// # Errors
    /// Passes through the first tree error. Trees that were loaded before it keep the
    /// source and the cube is not recorded as loaded.
    pub fn load_source<St: HeightmapStorage + ?Sized>(
        &mut self,
        storage: &mut St,
        source: Shared<S>,
    ) -> Result<()> {
        let cube_y = source.get().source_vertical_index();
        for tree in self.trees.values_mut() {
            tree.load_source(tree.root(), storage, source.clone())?;
        }
        self.cube_map.mark_loaded(cube_y);
        Ok(())
    }

    /// Unloads the source of cube `cube_y` from every tree. Returns `false` if no tree had
    /// a leaf there.
    ///
    /// # Errors
    /// Passes through the first tree error. Trees already unloaded stay unloaded.
    pub fn unload_source<St: HeightmapStorage + ?Sized>(
        &mut self,
        cube_y: i32,
        storage: &mut St,
    ) -> Result<bool> {
        let mut found = false;
        for tree in self.trees.values_mut() {
            if let Some(leaf) = tree.get_leaf(tree.root(), cube_y) {
                tree.unload_source(leaf, storage)?;
                found = true;
            }
        }
        self.cube_map.mark_unloaded(cube_y);
        Ok(found)
    }

    /// Unloads every loaded cube, then flushes `storage`.
    ///
    /// Every dirty column is resolved first, while all cubes are still there, so the saved
    /// branches hold exact heights.
    ///
    /// # Errors
    /// Passes through the first storage error.
    pub fn unload_all<St: HeightmapStorage + ?Sized>(&mut self, storage: &mut St) -> Result<()> {
        for tree in self.trees.values_mut() {
            tree.update_all_dirty_heights();
        }
        let loaded: Vec<i32> = self.cube_map.loaded().collect();
        debug!(
            "Unloading {} cubes of column ({}, {})",
            loaded.len(),
            self.column_x,
            self.column_z
        );
        for cube_y in loaded {
            self.unload_source(cube_y, storage)?;
        }
        storage.flush()?;
        Ok(())
    }

    /// Routes a block change at `(x, y, z)` to the leaf covering `y` in every tree.
    /// `qualifies` says, per heightmap type, whether the block now there counts.
    ///
    /// Changes in cubes that are not loaded are ignored.
    pub fn on_block_changed(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        qualifies: impl Fn(HeightmapType) -> bool,
    ) {
        let cube_y = block_to_cube(y);
        for (&ty, tree) in &mut self.trees {
            if let Some(leaf) = tree.get_leaf(tree.root(), cube_y) {
                tree.on_block_changed(leaf, x, y, z, qualifies(ty));
            }
        }
    }

    /// Height of the highest qualifying block in column `(x, z)` for `heightmap_type`, or
    /// `None` if that type is not tracked.
    pub fn get_height(&mut self, heightmap_type: HeightmapType, x: i32, z: i32) -> Option<i32> {
        let tree = self.trees.get_mut(&heightmap_type)?;
        Some(tree.get_height(tree.root(), x, z))
    }

    /// Client export of one heightmap; see [`SurfaceTrackerTree::write_data_for_client`].
    /// Returns `false` if `heightmap_type` is not tracked.
    pub fn write_data_for_client(
        &mut self,
        heightmap_type: HeightmapType,
        data: &mut PackedHeights,
        min_value: i32,
    ) -> bool {
        let (min_x, min_z) = (self.column_x * WIDTH_BLOCKS, self.column_z * WIDTH_BLOCKS);
        let Some(tree) = self.trees.get_mut(&heightmap_type) else {
            return false;
        };
        tree.write_data_for_client(tree.root(), min_x, min_z, data, min_value);
        true
    }

    /// Saves every node that requires it, in every tree, without unloading anything.
    ///
    /// # Errors
    /// Passes through the first storage error.
    pub fn save<St: HeightmapStorage + ?Sized>(&mut self, storage: &mut St) -> Result<()> {
        for tree in self.trees.values_mut() {
            tree.save(tree.root(), storage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_map_tracks_loaded_cubes() {
        let mut map = ColumnCubeMap::new();
        assert!(map.mark_loaded(3));
        assert!(map.mark_loaded(-2));
        assert!(!map.mark_loaded(3));
        assert_eq!(map.loaded().collect::<Vec<_>>(), vec![-2, 3]);

        assert!(map.mark_unloaded(3));
        assert!(!map.mark_unloaded(3));
        assert!(!map.is_loaded(3));
        assert_eq!(map.len(), 1);
    }
}
