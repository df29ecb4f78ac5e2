//! # Cube Generation Module
//!
//! Terrain generators for cubes. All of them are deterministic for a given cube position
//! (and seed, where they take one), so that a column generated cube by cube is seamless.

use noise::{NoiseFn, Perlin};

use super::{Cube, CUBE_WIDTH};
use crate::heightmap::coords::cube_to_min_block;
use crate::voxels::block::block_type::BlockType;

/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;
/// Terrain height where the noise is zero.
pub const PERLIN_BASE_HEIGHT: i32 = 16;
/// How far the terrain strays from [`PERLIN_BASE_HEIGHT`].
pub const PERLIN_AMPLITUDE: f64 = 40.0;
/// Terrain below this height is flooded.
pub const SEA_LEVEL: i32 = 0;

const TREE_CHANCE: f64 = 0.02;
const FLOWER_CHANCE: f64 = 0.1;
const TRUNK_HEIGHT: i32 = 3;

impl Cube {
    /// Creates a new, completely empty cube (all blocks are air).
    pub fn empty(cube_x: i32, cube_y: i32, cube_z: i32) -> Self {
        Self::from_fn(cube_x, cube_y, cube_z, |_, _, _| BlockType::AIR)
    }

    /// Creates a cube of flat terrain: dirt below world Y `surface_y` and grass at it.
    pub fn flat(cube_x: i32, cube_y: i32, cube_z: i32, surface_y: i32) -> Self {
        let min_y = cube_to_min_block(cube_y);
        Self::from_fn(cube_x, cube_y, cube_z, |_, y, _| {
            match (min_y + y).cmp(&surface_y) {
                std::cmp::Ordering::Less => BlockType::DIRT,
                std::cmp::Ordering::Equal => BlockType::GRASS,
                std::cmp::Ordering::Greater => BlockType::AIR,
            }
        })
    }

    /// Creates a cube with randomly placed blocks (for testing purposes).
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from
    /// * `sparseness` - Probability that a block is air
    pub fn random(
        cube_x: i32,
        cube_y: i32,
        cube_z: i32,
        rng: &mut fastrand::Rng,
        sparseness: f64,
    ) -> Self {
        Self::from_fn(cube_x, cube_y, cube_z, |_, _, _| {
            if rng.f64() < sparseness {
                BlockType::AIR
            } else {
                BlockType::get_random_type(rng)
            }
        })
    }

    /// Generates a cube of rolling terrain from 2D Perlin noise.
    ///
    /// The surface height of a column comes from the noise; below it is dirt, on it grass
    /// (or dirt under water), and between it and [`SEA_LEVEL`] water. Dry columns may grow
    /// a flower or a small tree, decided per column so that neighbouring cubes agree.
    pub fn perlin(cube_x: i32, cube_y: i32, cube_z: i32, seed: u32) -> Self {
        let perlin = Perlin::new(seed);
        let min_y = cube_to_min_block(cube_y);
        let mut columns = [(0_i32, Decoration::None); (CUBE_WIDTH * CUBE_WIDTH) as usize];
        for (column, slot) in columns.iter_mut().enumerate() {
            let column = column as i32;
            let world_x = cube_x * CUBE_WIDTH + column % CUBE_WIDTH;
            let world_z = cube_z * CUBE_WIDTH + column / CUBE_WIDTH;
            let sample = perlin.get([
                world_x as f64 * PERLIN_SCALE_FACTOR,
                world_z as f64 * PERLIN_SCALE_FACTOR,
            ]);
            let surface = PERLIN_BASE_HEIGHT + (sample * PERLIN_AMPLITUDE) as i32;
            *slot = (surface, Decoration::pick(seed, world_x, world_z, surface));
        }

        Self::from_fn(cube_x, cube_y, cube_z, |x, y, z| {
            let (surface, decoration) = columns[(z * CUBE_WIDTH + x) as usize];
            let world_y = min_y + y;
            let above = world_y - surface;
            match above {
                a if a < 0 => BlockType::DIRT,
                0 if surface < SEA_LEVEL => BlockType::DIRT,
                0 => BlockType::GRASS,
                _ if world_y <= SEA_LEVEL => BlockType::WATER,
                a => decoration.block_at(a),
            }
        })
    }
}

#[derive(Copy, Clone)]
enum Decoration {
    None,
    Flower,
    Tree,
}

impl Decoration {
    fn pick(seed: u32, world_x: i32, world_z: i32, surface: i32) -> Self {
        if surface < SEA_LEVEL {
            return Decoration::None;
        }
        let column_seed = (u64::from(seed) << 32)
            ^ (u64::from(world_x as u32) << 16)
            ^ u64::from(world_z as u32).rotate_left(40);
        let roll = fastrand::Rng::with_seed(column_seed).f64();
        if roll < TREE_CHANCE {
            Decoration::Tree
        } else if roll < TREE_CHANCE + FLOWER_CHANCE {
            Decoration::Flower
        } else {
            Decoration::None
        }
    }

    /// Block at `above` blocks over the surface.
    fn block_at(self, above: i32) -> BlockType {
        match (self, above) {
            (Decoration::Flower, 1) => BlockType::FLOWER,
            (Decoration::Tree, a) if a <= TRUNK_HEIGHT => BlockType::WOOD,
            (Decoration::Tree, a) if a == TRUNK_HEIGHT + 1 => BlockType::LEAVES,
            _ => BlockType::AIR,
        }
    }
}
