//! Shared fixtures for the integration tests: a bit-per-block heightmap source, a reference
//! heightmap and a tree-shape checker.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};

use surface_tracker::core::Shared;
use surface_tracker::heightmap::coords::{
    block_to_cube, column_index, cube_to_min_block, COLUMNS_PER_NODE, SCALE_0_NODE_HEIGHT,
    WIDTH_BLOCKS,
};
use surface_tracker::heightmap::{
    HeightmapSource, HeightmapStorage, HeightmapType, LeafHandle, NodeId, SurfaceTrackerTree,
    MAX_SCALE, NO_HEIGHT,
};

pub type TestTree = SurfaceTrackerTree<TestSource>;

pub const TEST_TYPE: HeightmapType = HeightmapType(0);

/// Calls `f` for every `(x, z)` of one node's footprint.
pub fn for_each_column(mut f: impl FnMut(i32, i32)) {
    for z in 0..WIDTH_BLOCKS {
        for x in 0..WIDTH_BLOCKS {
            f(x, z);
        }
    }
}

/// A cube where every block is either opaque or not. Column `idx` of the cube is the bit
/// set `columns[idx]`, bit `n` being local Y `n`.
#[derive(Debug)]
pub struct TestSource {
    pub cube_y: i32,
    columns: [u32; COLUMNS_PER_NODE],
    pub leaf: Option<LeafHandle>,
    pub detach_count: usize,
}

impl TestSource {
    pub fn new(cube_y: i32) -> Self {
        Self {
            cube_y,
            columns: [0; COLUMNS_PER_NODE],
            leaf: None,
            detach_count: 0,
        }
    }

    pub fn set_block(&mut self, x: i32, local_y: i32, z: i32, opaque: bool) {
        assert!((0..SCALE_0_NODE_HEIGHT).contains(&local_y));
        let column = &mut self.columns[column_index(x, z)];
        if opaque {
            *column |= 1 << local_y;
        } else {
            *column &= !(1 << local_y);
        }
    }

    pub fn leaf_node(&self) -> NodeId {
        self.leaf
            .unwrap_or_else(|| panic!("no leaf loaded for cube {}", self.cube_y))
            .node
    }
}

impl HeightmapSource for TestSource {
    fn on_attached_to_leaf(&mut self, leaf: LeafHandle) {
        self.leaf = Some(leaf);
    }

    fn on_detached<St: HeightmapStorage + ?Sized>(&mut self, leaf: LeafHandle, _: &mut St) {
        assert_eq!(self.leaf, Some(leaf), "detached from a leaf it was not bound to");
        self.leaf = None;
        self.detach_count += 1;
    }

    fn get_highest(&self, x: i32, z: i32, _: HeightmapType) -> i32 {
        let column = self.columns[column_index(x, z)];
        if column == 0 {
            return NO_HEIGHT;
        }
        cube_to_min_block(self.cube_y) + (31 - column.leading_zeros() as i32)
    }

    fn source_vertical_index(&self) -> i32 {
        self.cube_y
    }
}

/// Sets a block in `source` and tells the tree about it.
pub fn set_block(
    tree: &mut TestTree,
    source: &Shared<TestSource>,
    x: i32,
    y: i32,
    z: i32,
    opaque: bool,
) {
    let leaf = {
        let mut source = source.get_mut();
        let local_y = y - cube_to_min_block(source.cube_y);
        source.set_block(x, local_y, z, opaque);
        source.leaf_node()
    };
    tree.on_block_changed(leaf, x, y, z, opaque);
}

/// The sources loaded into one tree, by cube Y.
#[derive(Default)]
pub struct LoadedSources {
    pub by_y: BTreeMap<i32, Shared<TestSource>>,
}

impl LoadedSources {
    /// Returns the source of cube `cube_y`, creating and loading it first if needed.
    pub fn load<St: HeightmapStorage + ?Sized>(
        &mut self,
        tree: &mut TestTree,
        storage: &mut St,
        cube_y: i32,
    ) -> Shared<TestSource> {
        self.by_y
            .entry(cube_y)
            .or_insert_with(|| {
                let source = Shared::new(TestSource::new(cube_y));
                tree.load_source(tree.root(), storage, source.clone())
                    .expect("load_source failed");
                source
            })
            .clone()
    }

    /// Unloads the source of cube `cube_y`. Returns `false` if it was not loaded.
    pub fn unload<St: HeightmapStorage + ?Sized>(
        &mut self,
        tree: &mut TestTree,
        storage: &mut St,
        cube_y: i32,
    ) -> bool {
        let Some(source) = self.by_y.remove(&cube_y) else {
            return false;
        };
        let leaf = source.get().leaf_node();
        tree.unload_source(leaf, storage)
            .expect("unload_source failed");
        true
    }

    /// Sets a block anywhere in the world, loading its cube on demand.
    pub fn set_block<St: HeightmapStorage + ?Sized>(
        &mut self,
        tree: &mut TestTree,
        storage: &mut St,
        x: i32,
        y: i32,
        z: i32,
        opaque: bool,
    ) {
        let source = self.load(tree, storage, block_to_cube(y));
        set_block(tree, &source, x, y, z, opaque);
    }

    pub fn loaded(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_y.keys().copied()
    }
}

/// The opaque block Ys of a single column.
#[derive(Default)]
pub struct ReferenceHeightmap {
    opaque: BTreeSet<i32>,
}

impl ReferenceHeightmap {
    pub fn set(&mut self, y: i32, opaque: bool) {
        if opaque {
            self.opaque.insert(y);
        } else {
            self.opaque.remove(&y);
        }
    }

    pub fn highest(&self) -> i32 {
        self.opaque.last().copied().unwrap_or(NO_HEIGHT)
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
    }
}

/// Checks that the tree holds exactly the nodes needed by the leaves of `loaded`: every
/// ancestor of a loaded leaf together with that ancestor's children, nothing else.
///
/// Also checks that parents and children agree, that only the root is a branch without
/// children, and that no node is left in the arena unreachable from the root.
pub fn verify_tree_shape(tree: &TestTree, loaded: impl IntoIterator<Item = i32>) {
    let root = tree.root();
    let mut required = HashSet::from([root]);
    for cube_y in loaded {
        let Some(leaf) = tree.get_leaf(root, cube_y) else {
            continue;
        };
        let mut node = Some(leaf);
        while let Some(id) = node {
            required.insert(id);
            required.extend(tree.children(id).iter().flatten().copied());
            let parent = tree.parent(id);
            assert!(
                parent.is_some() || tree.state(id).scale() == MAX_SCALE,
                "detached node {id:?} below the root"
            );
            node = parent;
        }
    }

    let mut reachable = 1;
    let mut stack = vec![root];
    while let Some(branch) = stack.pop() {
        for &child in tree.children(branch).iter().flatten() {
            assert!(required.contains(&child), "node {child:?} is not required");
            assert_eq!(tree.parent(child), Some(branch), "parent does not own {child:?}");
            if !tree.is_leaf(child) {
                assert!(
                    tree.children(child).iter().any(Option::is_some),
                    "branch {child:?} has no children"
                );
            }
            reachable += 1;
            stack.push(child);
        }
    }
    assert_eq!(tree.len(), reachable, "arena holds unreachable nodes");
}
