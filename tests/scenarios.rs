mod common;

use common::{for_each_column, set_block, verify_tree_shape, LoadedSources, TestSource, TestTree, TEST_TYPE};
use surface_tracker::core::Shared;
use surface_tracker::heightmap::coords::column_index;
use surface_tracker::heightmap::{
    MemoryHeightmapStorage, NodeId, NullHeightmapStorage, PackedHeights, NO_HEIGHT,
};

#[test]
fn scenario_a_lower_writes_do_not_lower_the_top() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let source = Shared::new(TestSource::new(0));
    let leaf = tree
        .load_source(tree.root(), &mut storage, source.clone())
        .unwrap();

    set_block(&mut tree, &source, 0, 6, 0, true);
    set_block(&mut tree, &source, 0, 13, 0, true);
    assert_eq!(tree.get_height(tree.root(), 0, 0), 13);

    set_block(&mut tree, &source, 0, 3, 0, true);
    assert_eq!(tree.get_height(tree.root(), 0, 0), 13);
    assert_eq!(tree.get_height(leaf, 0, 0), 13);
}

#[test]
fn scenario_b_only_materialized_leaves_are_found() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    tree.load_source(tree.root(), &mut storage, Shared::new(TestSource::new(0)))
        .unwrap();

    assert!(tree.get_leaf(tree.root(), 0).is_some());
    assert!(tree.get_leaf(tree.root(), 1).is_none());
    assert!(tree.get_leaf(tree.root(), -1).is_none());
}

#[test]
fn scenario_c_detaching_collapses_empty_branches() {
    let mut storage = MemoryHeightmapStorage::new();
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let mut sources = LoadedSources::default();
    sources.load(&mut tree, &mut storage, -1);
    sources.load(&mut tree, &mut storage, 0);

    sources.unload(&mut tree, &mut storage, -1);
    assert!(tree.get_leaf(tree.root(), -1).is_none());
    assert!(tree.get_leaf(tree.root(), 0).is_some());
    verify_tree_shape(&tree, sources.loaded());
}

#[test]
fn removing_the_top_block_finds_the_next_one() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let mut sources = LoadedSources::default();
    sources.set_block(&mut tree, &mut storage, 4, 100, 4, true);
    sources.set_block(&mut tree, &mut storage, 4, -50, 4, true);
    assert_eq!(tree.get_height(tree.root(), 4, 4), 100);

    sources.set_block(&mut tree, &mut storage, 4, 100, 4, false);
    assert!(tree.is_any_dirty(tree.root()));
    assert_eq!(tree.get_height(tree.root(), 4, 4), -50);

    sources.set_block(&mut tree, &mut storage, 4, -50, 4, false);
    assert_eq!(tree.get_height(tree.root(), 4, 4), NO_HEIGHT);
}

#[test]
fn queries_clear_the_dirty_bit() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let source = Shared::new(TestSource::new(0));
    tree.load_source(tree.root(), &mut storage, source.clone())
        .unwrap();
    let root = tree.root();
    let idx = column_index(2, 3);

    set_block(&mut tree, &source, 2, 10, 3, true);
    assert!(tree.state(root).is_dirty(idx));
    assert_eq!(tree.get_height(root, 2, 3), 10);
    assert!(!tree.state(root).is_dirty(idx));
    assert_eq!(tree.get_height(root, 2, 3), 10);
    assert!(!tree.state(root).is_dirty(idx));

    tree.set_all_dirty(root);
    assert!(tree.state(root).is_dirty(idx));
    assert_eq!(tree.get_height(root, 2, 3), 10);
    assert!(!tree.state(root).is_dirty(idx));
}

#[test]
fn writes_below_the_top_never_change_the_height() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let mut sources = LoadedSources::default();
    let mut rng = fastrand::Rng::with_seed(7);

    for_each_column(|x, z| {
        let top = rng.i32(0..200);
        sources.set_block(&mut tree, &mut storage, x, top, z, true);
        assert_eq!(tree.get_height(tree.root(), x, z), top);
        for _ in 0..50 {
            let y = rng.i32(-200..top);
            sources.set_block(&mut tree, &mut storage, x, y, z, rng.bool());
            assert_eq!(tree.get_height(tree.root(), x, z), top);
        }
    });
}

/// The leaves below `node`, depth first.
fn leaves_below(tree: &TestTree, node: NodeId) -> Vec<NodeId> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        if tree.is_leaf(id) {
            leaves.push(id);
        }
        stack.extend(tree.children(id).iter().flatten());
    }
    leaves
}

#[test]
fn every_branch_holds_the_maximum_of_its_leaves() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let mut sources = LoadedSources::default();
    let mut rng = fastrand::Rng::with_seed(42);

    for _ in 0..5_000 {
        let (x, z) = (rng.i32(0..16), rng.i32(0..16));
        let y = rng.i32(-4096..4096);
        sources.set_block(&mut tree, &mut storage, x, y, z, rng.u8(..4) != 0);
    }

    let branches: Vec<NodeId> = tree.node_ids().filter(|&id| !tree.is_leaf(id)).collect();
    for branch in branches {
        let leaves = leaves_below(&tree, branch);
        for_each_column(|x, z| {
            let expected = leaves
                .iter()
                .map(|&leaf| tree.get_height(leaf, x, z))
                .max()
                .unwrap_or(NO_HEIGHT);
            assert_eq!(tree.get_height(branch, x, z), expected);
        });
    }
}

#[test]
fn client_export_offsets_by_the_minimum() {
    let mut storage = NullHeightmapStorage;
    let mut tree = TestTree::new(0, 0, TEST_TYPE);
    let mut sources = LoadedSources::default();
    sources.set_block(&mut tree, &mut storage, 1, 40, 0, true);
    sources.set_block(&mut tree, &mut storage, 2, -100, 0, true);
    sources.set_block(&mut tree, &mut storage, 3, 1000, 0, true);

    let mut data = PackedHeights::new(9, 256);
    tree.write_data_for_client(tree.root(), 0, 0, &mut data, -64);

    assert_eq!(data.get(1), 40 + 1 + 64);
    // below the minimum
    assert_eq!(data.get(2), 0);
    // too tall for 9 bits
    assert_eq!(data.get(3), (1000 + 1 + 64) & 0x1FF);
    // no block at all
    assert_eq!(data.get(16), 0);
}
