//! # Storage Module
//!
//! Persistence boundary of the surface tracker. The tree hands plain [`NodeRecord`]s to a
//! [`HeightmapStorage`] and gets them back keyed by [`NodeKey`]; it never performs I/O on
//! its own.
//!
//! ## Backends
//!
//! - [`NullHeightmapStorage`]: drops every save and never finds anything.
//! - [`MemoryHeightmapStorage`]: keeps records in a hash map. Used by tests and by callers
//!   that only need state to survive an unload.
//! - [`FileHeightmapStorage`]: groups records into JSON region files on disk.
//!
//! ## Sparsity
//!
//! Branch child presence is never stored. A subtree is rebuilt purely from the keys that
//! exist, one level at a time, as sources are attached below it.

mod file;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::heightmap::error::StorageError;
use crate::heightmap::node::{HeightmapType, DIRTY_WORDS};

pub use file::{FileHeightmapStorage, StorageConfig};

/// Identity of a persisted node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Column-group X.
    pub column_x: i32,
    /// Column-group Z.
    pub column_z: i32,
    /// Heightmap type of the node's tree.
    pub heightmap_type: HeightmapType,
    /// Scale of the node.
    pub scale: u8,
    /// Scaled Y of the node.
    pub scaled_y: i32,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) type {} scale {} y {}",
            self.column_x, self.column_z, self.heightmap_type, self.scale, self.scaled_y
        )
    }
}

/// Persisted payload of one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Scale of the node.
    pub scale: u8,
    /// Scaled Y of the node.
    pub scaled_y: i32,
    /// Heightmap type of the node's tree.
    pub heightmap_type: HeightmapType,
    /// `requires_save` of the node; `false` in records written by a save.
    pub requires_save: bool,
    /// Backing words of the node's packed heights.
    pub heights: Vec<u64>,
    /// One bit per column.
    pub dirty_positions: [u64; DIRTY_WORDS],
}

/// Persistence backend for surface tracker nodes.
///
/// Implementations own durability and retries. Errors are passed through the tree
/// unchanged.
pub trait HeightmapStorage {
    /// Stores `record` for the node it describes in column-group `(column_x, column_z)`,
    /// replacing any previous record under the same key.
    fn save_node(
        &mut self,
        column_x: i32,
        column_z: i32,
        record: &NodeRecord,
    ) -> Result<(), StorageError>;

    /// Returns the record previously saved under the key, or `None` if nothing was ever
    /// saved there.
    fn load_node(
        &mut self,
        column_x: i32,
        column_z: i32,
        heightmap_type: HeightmapType,
        scale: u8,
        scaled_y: i32,
    ) -> Result<Option<NodeRecord>, StorageError>;

    /// Makes every save so far durable.
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Storage that keeps nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullHeightmapStorage;

impl HeightmapStorage for NullHeightmapStorage {
    fn save_node(&mut self, _: i32, _: i32, _: &NodeRecord) -> Result<(), StorageError> {
        Ok(())
    }

    fn load_node(
        &mut self,
        _: i32,
        _: i32,
        _: HeightmapType,
        _: u8,
        _: i32,
    ) -> Result<Option<NodeRecord>, StorageError> {
        Ok(None)
    }
}

/// In-memory storage. Loading a record leaves it in place.
#[derive(Clone, Debug, Default)]
pub struct MemoryHeightmapStorage {
    records: HashMap<NodeKey, NodeRecord>,
}

impl MemoryHeightmapStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record stored under `key`, if any.
    pub fn get(&self, key: &NodeKey) -> Option<&NodeRecord> {
        self.records.get(key)
    }

    /// Iterates over every stored key.
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.records.keys()
    }
}

impl HeightmapStorage for MemoryHeightmapStorage {
    fn save_node(
        &mut self,
        column_x: i32,
        column_z: i32,
        record: &NodeRecord,
    ) -> Result<(), StorageError> {
        self.records
            .insert(record.key(column_x, column_z), record.clone());
        Ok(())
    }

    fn load_node(
        &mut self,
        column_x: i32,
        column_z: i32,
        heightmap_type: HeightmapType,
        scale: u8,
        scaled_y: i32,
    ) -> Result<Option<NodeRecord>, StorageError> {
        let key = NodeKey {
            column_x,
            column_z,
            heightmap_type,
            scale,
            scaled_y,
        };
        Ok(self.records.get(&key).cloned())
    }
}

impl NodeRecord {
    /// Key this record is stored under in column-group `(column_x, column_z)`.
    pub fn key(&self, column_x: i32, column_z: i32) -> NodeKey {
        NodeKey {
            column_x,
            column_z,
            heightmap_type: self.heightmap_type,
            scale: self.scale,
            scaled_y: self.scaled_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::node::NodeState;

    fn record(scale: i32, scaled_y: i32) -> NodeRecord {
        NodeState::new(scale, scaled_y, HeightmapType(2))
            .unwrap()
            .to_record()
    }

    #[test]
    fn null_storage_never_loads() {
        let mut storage = NullHeightmapStorage;
        storage.save_node(0, 0, &record(0, 0)).unwrap();
        assert!(storage
            .load_node(0, 0, HeightmapType(2), 0, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn memory_storage_keys_by_column_and_node() {
        let mut storage = MemoryHeightmapStorage::new();
        storage.save_node(1, 2, &record(0, 5)).unwrap();
        storage.save_node(1, 2, &record(1, 0)).unwrap();
        storage.save_node(3, 2, &record(0, 5)).unwrap();
        storage.save_node(1, 2, &record(0, 5)).unwrap();
        assert_eq!(storage.len(), 3);

        let loaded = storage.load_node(1, 2, HeightmapType(2), 0, 5).unwrap();
        assert_eq!(loaded, Some(record(0, 5)));
        assert!(storage
            .load_node(1, 2, HeightmapType(1), 0, 5)
            .unwrap()
            .is_none());
        assert!(storage
            .load_node(2, 2, HeightmapType(2), 0, 5)
            .unwrap()
            .is_none());
        // loads do not consume
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn keys_display_every_component() {
        let key = record(4, -7).key(-1, 9);
        assert_eq!(key.to_string(), "(-1, 9) type 2 scale 4 y -7");
    }
}
