//! Error types for the surface tracker and its storage backends.

use thiserror::Error;

use crate::heightmap::storage::NodeKey;

/// Result type alias using [`SurfaceTrackerError`].
pub type Result<T> = std::result::Result<T, SurfaceTrackerError>;

/// Errors raised by tree operations.
#[derive(Error, Debug)]
pub enum SurfaceTrackerError {
    /// A node was requested at a scale outside `0..=MAX_SCALE`, or a branch at scale 0.
    #[error("invalid scale for node: {scale}")]
    InvalidScale {
        /// The rejected scale.
        scale: i32,
    },

    /// A source was attached below a node whose span does not contain it.
    #[error("source at cube y {source_y} is outside node (scale {scale}, scaled y {scaled_y})")]
    SourceOutOfRange {
        /// The source's vertical index.
        source_y: i32,
        /// Scale of the node the source was offered to.
        scale: u8,
        /// Scaled Y of the node the source was offered to.
        scaled_y: i32,
    },

    /// The storage collaborator failed; passed through unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by [`HeightmapStorage`](crate::heightmap::HeightmapStorage) implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error (serde_json)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored record does not describe the node it was loaded for.
    #[error("corrupt node record {key}: {reason}")]
    Corrupt {
        /// Key the record was stored or requested under.
        key: NodeKey,
        /// What is wrong with it.
        reason: String,
    },
}

impl StorageError {
    /// Create a corrupt record error
    pub fn corrupt(key: NodeKey, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            key,
            reason: reason.into(),
        }
    }
}
