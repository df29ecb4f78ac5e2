#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Surface Tracker
//!
//! Incremental tracking of the highest qualifying block of every column in a world that is
//! unbounded vertically and loaded in cubes.
//!
//! Each 16×16 column-group keeps, per heightmap type, a sparse tree whose leaves cache the
//! heights of one loaded cube and whose branches cache the maximum over their children.
//! Block writes above the known top update the cache eagerly; removals of the top block mark
//! columns dirty and are resolved on the next query. Unloaded parts of a tree go to a
//! pluggable storage and come back on demand.
//!
//! ## Key Modules
//!
//! * `core` - Small shared building blocks
//! * `heightmap` - The trees, their node state, column facade and storage backends
//! * `voxels` - Blocks, cubes and the standard heightmap kinds
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     surface_tracker::run();
//! }
//! ```
//!
//! See the [`heightmap`] module for driving a tree directly.

use log::{error, info};

pub mod core;
mod demo;
pub mod heightmap;
pub mod voxels;

pub use demo::SURFACE_TRACKER_CONFIG;

/// Initializes `env_logger` from `RUST_LOG`, writing to stdout.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");
}

/// Runs the demo: generates terrain for a few column-groups on worker threads, tracks every
/// standard heightmap, mutates blocks, and checks the trees against a brute-force scan
/// before and after a round trip through file storage.
///
/// Storage settings are read from the JSON file named by [`SURFACE_TRACKER_CONFIG`] if set.
pub fn run() {
    init_logging();
    match demo::run_demo() {
        Ok(0) => info!("Every tracked height matched the block data"),
        Ok(mismatches) => {
            error!("{mismatches} tracked heights disagreed with the block data");
            std::process::exit(1);
        }
        Err(err) => {
            error!("Surface tracker demo failed: {err}");
            std::process::exit(1);
        }
    }
}
