//! # File Storage Module
//!
//! Stores node records on disk, grouped by region.
//!
//! ## Layout
//!
//! Column-groups are bucketed into regions of 32×32. Every region is one JSON file named
//! `r.<region_x>.<region_z>.json` under the configured directory, holding every record of
//! every tree of every column-group in the region.
//!
//! ## Caching
//!
//! Regions are read whole on first access and kept in an LRU cache. Saves only touch the
//! cached copy; a region is written back when it is evicted, on [`flush`], and when the
//! storage is dropped. Files are replaced by writing a temporary file and renaming it over
//! the old one.
//!
//! [`flush`]: HeightmapStorage::flush

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::{HeightmapStorage, NodeKey, NodeRecord};
use crate::heightmap::error::StorageError;
use crate::heightmap::node::HeightmapType;

/// log2 of the width of a region in column-groups.
const REGION_BITS: u32 = 5;

/// Settings for [`FileHeightmapStorage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the region files. Created on first write.
    pub directory: PathBuf,
    /// Number of regions kept in memory at once.
    pub region_cache_capacity: usize,
    /// Pretty-print region files.
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("heightmaps"),
            region_cache_capacity: 16,
            pretty: false,
        }
    }
}

impl StorageConfig {
    /// Default settings rooted at `directory`.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Reads settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read and `Json` if it is not a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[derive(Default)]
struct Region {
    records: HashMap<NodeKey, NodeRecord>,
    modified: bool,
}

#[derive(Serialize, Deserialize)]
struct StoredNode {
    column_x: i32,
    column_z: i32,
    record: NodeRecord,
}

#[derive(Default, Serialize, Deserialize)]
struct RegionFile {
    nodes: Vec<StoredNode>,
}

/// Region-file backed [`HeightmapStorage`].
pub struct FileHeightmapStorage {
    config: StorageConfig,
    regions: LruCache<(i32, i32), Region>,
}

impl FileHeightmapStorage {
    /// Creates a storage with the given settings. Nothing is read until a node is loaded.
    pub fn new(config: StorageConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.region_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            regions: LruCache::new(capacity),
        }
    }

    /// Settings this storage was created with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Number of regions currently held in memory.
    pub fn cached_regions(&self) -> usize {
        self.regions.len()
    }

    fn region_of(column_x: i32, column_z: i32) -> (i32, i32) {
        (column_x >> REGION_BITS, column_z >> REGION_BITS)
    }

    fn region(&mut self, pos: (i32, i32)) -> Result<&mut Region, StorageError> {
        if !self.regions.contains(&pos) && self.regions.len() == self.regions.cap().get() {
            if let Some((&old_pos, old)) = self.regions.peek_lru() {
                if old.modified {
                    write_region(&self.config, old_pos, old)?;
                }
            }
            self.regions.pop_lru();
        }
        let config = &self.config;
        self.regions
            .try_get_or_insert_mut(pos, || read_region(config, pos))
    }
}

impl HeightmapStorage for FileHeightmapStorage {
    fn save_node(
        &mut self,
        column_x: i32,
        column_z: i32,
        record: &NodeRecord,
    ) -> Result<(), StorageError> {
        let region = self.region(Self::region_of(column_x, column_z))?;
        region
            .records
            .insert(record.key(column_x, column_z), record.clone());
        region.modified = true;
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
        let region = self.region(Self::region_of(column_x, column_z))?;
        Ok(region.records.get(&key).cloned())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        for (&pos, region) in self.regions.iter_mut() {
            if region.modified {
                write_region(&self.config, pos, region)?;
                region.modified = false;
            }
        }
        Ok(())
    }
}

impl Drop for FileHeightmapStorage {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(
                "Failed to flush heightmap regions to {}: {err}",
                self.config.directory.display()
            );
        }
    }
}

fn region_path(config: &StorageConfig, (region_x, region_z): (i32, i32)) -> PathBuf {
    config
        .directory
        .join(format!("r.{region_x}.{region_z}.json"))
}

fn read_region(config: &StorageConfig, pos: (i32, i32)) -> Result<Region, StorageError> {
    let path = region_path(config, pos);
    if !path.exists() {
        return Ok(Region::default());
    }
    debug!("Reading heightmap region {}", path.display());
    let file: RegionFile = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
    let mut records = HashMap::with_capacity(file.nodes.len());
    for node in file.nodes {
        let key = node.record.key(node.column_x, node.column_z);
        if FileHeightmapStorage::region_of(node.column_x, node.column_z) != pos {
            return Err(StorageError::corrupt(
                key,
                format!("stored in region file {}", path.display()),
            ));
        }
        records.insert(key, node.record);
    }
    Ok(Region {
        records,
        modified: false,
    })
}

fn write_region(
    config: &StorageConfig,
    pos: (i32, i32),
    region: &Region,
) -> Result<(), StorageError> {
    fs::create_dir_all(&config.directory)?;
    let path = region_path(config, pos);
    let tmp_path = path.with_extension("json.tmp");
    debug!(
        "Writing {} heightmap nodes to {}",
        region.records.len(),
        path.display()
    );

    let mut keys: Vec<&NodeKey> = region.records.keys().collect();
    keys.sort();
    let file = RegionFile {
        nodes: keys
            .into_iter()
            .map(|key| StoredNode {
                column_x: key.column_x,
                column_z: key.column_z,
                record: region.records[key].clone(),
            })
            .collect(),
    };

    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        if config.pretty {
            serde_json::to_writer_pretty(&mut writer, &file)?;
        } else {
            serde_json::to_writer(&mut writer, &file)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, &path)?;
    Ok(())
}
