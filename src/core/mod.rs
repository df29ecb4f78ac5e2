//! # Core Module
//!
//! Small building blocks shared by the rest of the crate.
//!
//! ## Key Components
//! - `Shared`: Thread-safe reference-counted handle with read-write locking, used to share
//!   block-data sources between their owner and the surface tracker
//!
//! ## Usage
//! ```rust
//! use surface_tracker::core::Shared;
//!
//! let counter = Shared::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod shared;

pub use shared::Shared;
