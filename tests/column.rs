use std::collections::BTreeMap;

use surface_tracker::core::Shared;
use surface_tracker::heightmap::coords::{block_to_cube, cube_to_min_block, WIDTH_BLOCKS};
use surface_tracker::heightmap::{
    FileHeightmapStorage, HeightmapType, MemoryHeightmapStorage, NullHeightmapStorage,
    PackedHeights, StorageConfig, SurfaceTrackerColumn, NO_HEIGHT,
};
use surface_tracker::voxels::block::block_type::BlockType;
use surface_tracker::voxels::cube::Cube;
use surface_tracker::voxels::HeightmapKind;

type Cubes = BTreeMap<i32, Shared<Cube>>;

fn all_kinds() -> impl Iterator<Item = HeightmapType> {
    HeightmapKind::ALL.into_iter().map(HeightmapKind::heightmap_type)
}

fn perlin_cubes(column_x: i32, column_z: i32, cube_ys: std::ops::Range<i32>) -> Cubes {
    cube_ys
        .map(|cube_y| (cube_y, Shared::new(Cube::perlin(column_x, cube_y, column_z, 5))))
        .collect()
}

fn assert_matches_blocks(column: &mut SurfaceTrackerColumn<Cube>, cubes: &Cubes) {
    let (base_x, base_z) = (column.column_x() * WIDTH_BLOCKS, column.column_z() * WIDTH_BLOCKS);
    for kind in HeightmapKind::ALL {
        for x in base_x..base_x + WIDTH_BLOCKS {
            for z in base_z..base_z + WIDTH_BLOCKS {
                let expected = cubes
                    .values()
                    .rev()
                    .map(|cube| cube.get().highest(x, z, kind))
                    .find(|&height| height != NO_HEIGHT)
                    .unwrap_or(NO_HEIGHT);
                assert_eq!(
                    column.get_height(kind.heightmap_type(), x, z),
                    Some(expected),
                    "{kind:?} at ({x}, {z})"
                );
            }
        }
    }
}

fn change_block(column: &mut SurfaceTrackerColumn<Cube>, cubes: &Cubes, x: i32, y: i32, z: i32, block_type: BlockType) {
    let cube_y = block_to_cube(y);
    cubes[&cube_y]
        .get_mut()
        .set_block(x, y - cube_to_min_block(cube_y), z, block_type);
    column.on_block_changed(x, y, z, |ty| {
        HeightmapKind::from_type(ty).is_some_and(|kind| kind.qualifies(block_type))
    });
}

#[test]
fn tracks_every_kind_over_generated_terrain() {
    let mut storage = NullHeightmapStorage;
    let mut column = SurfaceTrackerColumn::new(2, -1, all_kinds());
    let cubes = perlin_cubes(2, -1, -2..3);
    for cube in cubes.values() {
        column.load_source(&mut storage, cube.clone()).unwrap();
    }

    assert_eq!(column.cube_map().len(), 5);
    assert_eq!(column.heightmap_types().count(), 4);
    assert_matches_blocks(&mut column, &cubes);
}

#[test]
fn follows_random_block_changes() {
    let mut storage = MemoryHeightmapStorage::new();
    let mut column = SurfaceTrackerColumn::new(0, 0, all_kinds());
    let cubes = perlin_cubes(0, 0, -1..2);
    for cube in cubes.values() {
        column.load_source(&mut storage, cube.clone()).unwrap();
    }

    let types = [
        BlockType::AIR,
        BlockType::DIRT,
        BlockType::WATER,
        BlockType::LEAVES,
        BlockType::FLOWER,
    ];
    let mut rng = fastrand::Rng::with_seed(3);
    for round in 0..20 {
        for _ in 0..200 {
            let (x, z) = (rng.i32(0..16), rng.i32(0..16));
            let y = rng.i32(cube_to_min_block(-1)..cube_to_min_block(2));
            change_block(&mut column, &cubes, x, y, z, types[rng.usize(..types.len())]);
        }
        if round % 5 == 0 {
            assert_matches_blocks(&mut column, &cubes);
        }
    }
    assert_matches_blocks(&mut column, &cubes);
}

#[test]
fn reloads_through_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let cubes = perlin_cubes(-5, 9, -2..3);
    {
        let mut storage = FileHeightmapStorage::new(StorageConfig::in_directory(dir.path()));
        let mut column = SurfaceTrackerColumn::new(-5, 9, all_kinds());
        for cube in cubes.values() {
            column.load_source(&mut storage, cube.clone()).unwrap();
        }
        let mut rng = fastrand::Rng::with_seed(17);
        for _ in 0..1_000 {
            let (x, z) = (-80 + rng.i32(0..16), 144 + rng.i32(0..16));
            let y = rng.i32(cube_to_min_block(-2)..cube_to_min_block(3));
            let block_type = if rng.bool() { BlockType::AIR } else { BlockType::WOOD };
            change_block(&mut column, &cubes, x, y, z, block_type);
        }
        assert_matches_blocks(&mut column, &cubes);
        column.unload_all(&mut storage).unwrap();
        assert!(column.cube_map().is_empty());
        assert!(cubes.values().all(|cube| !cube.get().is_attached()));
    }

    let mut storage = FileHeightmapStorage::new(StorageConfig::in_directory(dir.path()));
    let mut column = SurfaceTrackerColumn::new(-5, 9, all_kinds());
    for cube in cubes.values() {
        column.load_source(&mut storage, cube.clone()).unwrap();
    }
    assert_matches_blocks(&mut column, &cubes);
}

#[test]
fn unloading_single_cubes() {
    let mut storage = MemoryHeightmapStorage::new();
    let mut column = SurfaceTrackerColumn::new(0, 0, all_kinds());
    let cube = Shared::new(Cube::flat(0, 0, 0, 12));
    column.load_source(&mut storage, cube.clone()).unwrap();

    let world_surface = HeightmapKind::WorldSurface.heightmap_type();
    assert!(cube.get().leaf(world_surface).is_some());
    assert!(column.cube_map().is_loaded(0));

    assert!(!column.unload_source(4, &mut storage).unwrap());
    assert!(column.unload_source(0, &mut storage).unwrap());
    assert!(!column.cube_map().is_loaded(0));
    assert!(cube.get().leaf(world_surface).is_none());
    for ty in all_kinds() {
        assert_eq!(column.tree(ty).unwrap().len(), 1);
    }
}

#[test]
fn untracked_types_are_reported() {
    let mut column: SurfaceTrackerColumn<Cube> =
        SurfaceTrackerColumn::new(0, 0, [HeightmapKind::OceanFloor.heightmap_type()]);
    let untracked = HeightmapKind::WorldSurface.heightmap_type();
    let mut data = PackedHeights::new(9, 256);

    assert_eq!(column.get_height(untracked, 0, 0), None);
    assert!(!column.write_data_for_client(untracked, &mut data, 0));
    assert!(column.tree(untracked).is_none());
}

#[test]
fn exports_client_heightmaps() {
    let mut storage = NullHeightmapStorage;
    let mut column = SurfaceTrackerColumn::new(1, 1, all_kinds());
    let cube = Shared::new(Cube::flat(1, 0, 1, 12));
    column.load_source(&mut storage, cube.clone()).unwrap();
    change_block(&mut column, &BTreeMap::from([(0, cube)]), 17, 20, 18, BlockType::FLOWER);

    let mut data = PackedHeights::new(9, 256);
    let min_value = -64;
    assert!(column.write_data_for_client(
        HeightmapKind::WorldSurface.heightmap_type(),
        &mut data,
        min_value
    ));
    assert_eq!(data.get(1 + 2 * 16), (20 + 1 - min_value) as u32);
    assert_eq!(data.get(0), (12 + 1 - min_value) as u32);

    assert!(column.write_data_for_client(
        HeightmapKind::MotionBlocking.heightmap_type(),
        &mut data,
        min_value
    ));
    assert_eq!(data.get(1 + 2 * 16), (12 + 1 - min_value) as u32);
}
