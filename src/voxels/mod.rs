//! # Voxels Module
//!
//! Block data that feeds the surface trackers. A [`cube::Cube`] is one 16×32×16 volume of
//! blocks and implements [`HeightmapSource`](crate::heightmap::HeightmapSource) for the
//! heightmap kinds in [`HeightmapKind`].
//!
//! ## Key Components
//!
//! * `block` - Block types and their physical properties
//! * `cube` - Block volumes and their terrain generators
//! * [`HeightmapKind`] - Which blocks each standard heightmap counts

pub mod block;
pub mod cube;
mod heightmap_kind;

pub use heightmap_kind::HeightmapKind;
