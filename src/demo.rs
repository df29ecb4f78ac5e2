//! # Demo Module
//!
//! The workload behind [`run`](crate::run). Every column-group gets its own worker thread,
//! its own trees and its own file storage; results come back over a channel the way the
//! worker pool of a larger engine would report them.
//!
//! Each worker:
//! 1. generates Perlin terrain for a stack of cubes and loads them into a
//!    [`SurfaceTrackerColumn`] tracking every [`HeightmapKind`]
//! 2. applies seeded random block changes
//! 3. unloads everything into [`FileHeightmapStorage`] and loads it back
//!
//! and compares every height against a brute-force scan of the cubes after each step.

use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use web_time::{Duration, Instant};

use crate::core::Shared;
use crate::heightmap::coords::{block_to_cube, cube_to_min_block, COLUMNS_PER_NODE, WIDTH_BLOCKS};
use crate::heightmap::{
    FileHeightmapStorage, PackedHeights, Result, StorageConfig, StorageError,
    SurfaceTrackerColumn, NO_HEIGHT,
};
use crate::voxels::block::block_type::BlockType;
use crate::voxels::cube::Cube;
use crate::voxels::HeightmapKind;

/// Environment variable naming a JSON [`StorageConfig`] file.
pub const SURFACE_TRACKER_CONFIG: &str = "SURFACE_TRACKER_CONFIG";

const COLUMN_GROUPS_PER_AXIS: i32 = 2;
const CUBE_RANGE: RangeInclusive<i32> = -2..=2;
const MUTATIONS_PER_COLUMN: usize = 4096;
const WORLD_SEED: u32 = 1234;
/// Bits per entry of the exported client heightmap; covers `CUBE_RANGE`.
const CLIENT_HEIGHT_BITS: usize = 9;

const MUTATION_TYPES: [BlockType; 8] = [
    BlockType::AIR,
    BlockType::AIR,
    BlockType::DIRT,
    BlockType::WOOD,
    BlockType::WHITE,
    BlockType::WATER,
    BlockType::LEAVES,
    BlockType::FLOWER,
];

type Cubes = BTreeMap<i32, Shared<Cube>>;

#[derive(Debug, Default)]
struct ColumnReport {
    column_x: i32,
    column_z: i32,
    checked: usize,
    mismatches: usize,
    nodes: usize,
    load_time: Duration,
    mutate_time: Duration,
    reload_time: Duration,
}

/// Runs every worker and returns how many heights disagreed with the brute-force scan.
pub(crate) fn run_demo() -> Result<usize> {
    let config = storage_config()?;
    info!(
        "Tracking {} column-groups, storage under {}",
        COLUMN_GROUPS_PER_AXIS * COLUMN_GROUPS_PER_AXIS,
        config.directory.display()
    );
    info!(
        "Available parallelism: {:?}",
        thread::available_parallelism()
    );

    let (report_tx, report_rx) = channel::<Result<ColumnReport>>();
    let mut workers = Vec::new();
    for column_x in 0..COLUMN_GROUPS_PER_AXIS {
        for column_z in 0..COLUMN_GROUPS_PER_AXIS {
            let report_tx = report_tx.clone();
            let config = StorageConfig {
                directory: config
                    .directory
                    .join(format!("worker.{column_x}.{column_z}")),
                ..config.clone()
            };
            workers.push(thread::spawn(move || {
                let report = track_column(column_x, column_z, config);
                if report_tx.send(report).is_err() {
                    warn!("Report of column ({column_x}, {column_z}) had no receiver");
                }
            }));
        }
    }
    drop(report_tx);

    let start = Instant::now();
    let mismatches = collect_reports(report_rx, workers);
    info!("All workers finished in {:?}", start.elapsed());
    mismatches
}

/// Logs every report until all senders are gone, then joins `workers`. Returns the total
/// number of mismatches, or the first worker error once every worker has been joined.
fn collect_reports(
    report_rx: Receiver<Result<ColumnReport>>,
    workers: Vec<JoinHandle<()>>,
) -> Result<usize> {
    let mut mismatches = 0;
    let mut first_error = None;
    for report in report_rx {
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                error!("A surface tracker worker failed: {err}");
                first_error.get_or_insert(err);
                continue;
            }
        };
        info!(
            "Column ({}, {}): {} heights checked, {} mismatched, {} nodes; load {:?}, mutate {:?}, reload {:?}",
            report.column_x,
            report.column_z,
            report.checked,
            report.mismatches,
            report.nodes,
            report.load_time,
            report.mutate_time,
            report.reload_time
        );
        mismatches += report.mismatches;
    }
    for worker in workers {
        if worker.join().is_err() {
            warn!("A surface tracker worker panicked");
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(mismatches),
    }
}

fn storage_config() -> Result<StorageConfig> {
    match std::env::var_os(SURFACE_TRACKER_CONFIG) {
        Some(path) => {
            info!("Reading storage config from {}", path.to_string_lossy());
            Ok(StorageConfig::from_json_file(path)?)
        }
        None => Ok(StorageConfig::in_directory(
            std::env::temp_dir().join("surface-tracker-demo"),
        )),
    }
}

fn track_column(column_x: i32, column_z: i32, config: StorageConfig) -> Result<ColumnReport> {
    // records from an earlier run would be rehydrated over the fresh terrain
    if config.directory.exists() {
        debug!("Clearing {}", config.directory.display());
        fs::remove_dir_all(&config.directory).map_err(StorageError::from)?;
    }

    let mut storage = FileHeightmapStorage::new(config);
    let mut column =
        SurfaceTrackerColumn::new(column_x, column_z, HeightmapKind::ALL.map(HeightmapKind::heightmap_type));
    let mut report = ColumnReport {
        column_x,
        column_z,
        ..Default::default()
    };
    let mut rng = fastrand::Rng::with_seed(
        u64::from(WORLD_SEED) ^ ((column_x as u64) << 32) ^ (column_z as u64 & 0xFFFF_FFFF),
    );

    let start = Instant::now();
    let cubes: Cubes = CUBE_RANGE
        .map(|cube_y| {
            let cube = Cube::perlin(column_x, cube_y, column_z, WORLD_SEED);
            (cube_y, Shared::new(cube))
        })
        .collect();
    for cube in cubes.values() {
        column.load_source(&mut storage, cube.clone())?;
    }
    report.load_time = start.elapsed();
    report.verify(&mut column, &cubes, "generated");

    let start = Instant::now();
    mutate(&mut column, &cubes, &mut rng);
    report.mutate_time = start.elapsed();
    report.verify(&mut column, &cubes, "mutated");
    export_world_surface(&mut column);

    let start = Instant::now();
    column.unload_all(&mut storage)?;
    for cube in cubes.values() {
        column.load_source(&mut storage, cube.clone())?;
    }
    report.reload_time = start.elapsed();
    report.verify(&mut column, &cubes, "reloaded");

    report.nodes = column
        .heightmap_types()
        .filter_map(|ty| column.tree(ty))
        .map(|tree| tree.len())
        .sum();
    column.unload_all(&mut storage)?;
    Ok(report)
}

/// Applies random block changes to the loaded cubes, routing each one to the trees.
fn mutate(column: &mut SurfaceTrackerColumn<Cube>, cubes: &Cubes, rng: &mut fastrand::Rng) {
    let min_y = cube_to_min_block(*CUBE_RANGE.start());
    let max_y = cube_to_min_block(*CUBE_RANGE.end() + 1);
    let (base_x, base_z) = (column.column_x() * WIDTH_BLOCKS, column.column_z() * WIDTH_BLOCKS);

    for _ in 0..MUTATIONS_PER_COLUMN {
        let (x, z) = (base_x + rng.i32(0..WIDTH_BLOCKS), base_z + rng.i32(0..WIDTH_BLOCKS));
        let y = rng.i32(min_y..max_y);
        let block_type = MUTATION_TYPES[rng.usize(..MUTATION_TYPES.len())];
        let cube_y = block_to_cube(y);
        let Some(cube) = cubes.get(&cube_y) else {
            continue;
        };
        cube.get_mut()
            .set_block(x, y - cube_to_min_block(cube_y), z, block_type);
        column.on_block_changed(x, y, z, |ty| {
            HeightmapKind::from_type(ty).is_some_and(|kind| kind.qualifies(block_type))
        });
    }
}

fn export_world_surface(column: &mut SurfaceTrackerColumn<Cube>) {
    let mut data = PackedHeights::new(CLIENT_HEIGHT_BITS, COLUMNS_PER_NODE);
    let min_value = cube_to_min_block(*CUBE_RANGE.start());
    if column.write_data_for_client(
        HeightmapKind::WorldSurface.heightmap_type(),
        &mut data,
        min_value,
    ) {
        let highest = (0..data.len()).map(|idx| data.get(idx)).max().unwrap_or(0);
        debug!(
            "Column ({}, {}) exported {} words, highest entry {}",
            column.column_x(),
            column.column_z(),
            data.to_raw().len(),
            highest
        );
    }
}

/// The height the trees should report, found by scanning the cubes top-down.
fn brute_force_height(cubes: &Cubes, x: i32, z: i32, kind: HeightmapKind) -> i32 {
    cubes
        .values()
        .rev()
        .map(|cube| cube.get().highest(x, z, kind))
        .find(|&height| height != NO_HEIGHT)
        .unwrap_or(NO_HEIGHT)
}

impl ColumnReport {
    fn verify(&mut self, column: &mut SurfaceTrackerColumn<Cube>, cubes: &Cubes, phase: &str) {
        let (base_x, base_z) = (self.column_x * WIDTH_BLOCKS, self.column_z * WIDTH_BLOCKS);
        for kind in HeightmapKind::ALL {
            for dx in 0..WIDTH_BLOCKS {
                for dz in 0..WIDTH_BLOCKS {
                    let (x, z) = (base_x + dx, base_z + dz);
                    let expected = brute_force_height(cubes, x, z, kind);
                    let tracked = column.get_height(kind.heightmap_type(), x, z);
                    self.checked += 1;
                    if tracked != Some(expected) {
                        self.mismatches += 1;
                        warn!(
                            "{phase}: column ({x}, {z}) {kind:?} tracked {tracked:?}, scan found {expected}"
                        );
                    }
                }
            }
        }
    }
}
