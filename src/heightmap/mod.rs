//! # Heightmap Module
//!
//! Surface tracking for an unbounded vertical world: for every 16×16 column-group and every
//! heightmap type, the height of the highest qualifying block per column.
//!
//! ## Key Types
//!
//! * [`SurfaceTrackerTree`] - the sparse multi-resolution height cache of one heightmap type
//! * [`SurfaceTrackerColumn`] - all trees of one column-group behind one interface
//! * [`HeightmapSource`] - the block data of one cube, as seen by a leaf
//! * [`HeightmapStorage`] - where unloaded nodes go, with null, memory and file backends
//!
//! ## Usage
//!
//! ```
//! use surface_tracker::core::Shared;
//! use surface_tracker::heightmap::{MemoryHeightmapStorage, SurfaceTrackerTree};
//! use surface_tracker::voxels::{block::block_type::BlockType, cube::Cube, HeightmapKind};
//!
//! let mut storage = MemoryHeightmapStorage::new();
//! let world_surface = HeightmapKind::WorldSurface.heightmap_type();
//! let mut tree: SurfaceTrackerTree<Cube> = SurfaceTrackerTree::new(0, 0, world_surface);
//!
//! let cube = Shared::new(Cube::flat(0, 0, 0, 10));
//! let leaf = tree.load_source(tree.root(), &mut storage, cube.clone()).unwrap();
//! assert_eq!(tree.get_height(tree.root(), 3, 4), 10);
//!
//! cube.get_mut().set_block(3, 20, 4, BlockType::WOOD);
//! tree.on_block_changed(leaf, 3, 20, 4, true);
//! assert_eq!(tree.get_height(tree.root(), 3, 4), 20);
//!
//! tree.unload_source(leaf, &mut storage).unwrap();
//! assert!(tree.get_leaf(tree.root(), 0).is_none());
//! ```

mod column;
pub mod coords;
mod error;
mod node;
mod packed;
mod source;
mod storage;
mod tree;

pub use column::{ColumnCubeMap, SurfaceTrackerColumn};
pub use coords::{MAX_SCALE, NO_HEIGHT};
pub use error::{Result, StorageError, SurfaceTrackerError};
pub use node::{DirtyPositions, HeightmapType, LeafHandle, NodeId, NodeState};
pub use packed::PackedHeights;
pub use source::HeightmapSource;
pub use storage::{
    FileHeightmapStorage, HeightmapStorage, MemoryHeightmapStorage, NodeKey, NodeRecord,
    NullHeightmapStorage, StorageConfig,
};
pub use tree::SurfaceTrackerTree;
