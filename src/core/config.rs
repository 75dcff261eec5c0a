//! World configuration, persisted as JSON next to the world file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::TerrainParams;
use crate::voxel::world::WorldDims;

/// Configuration for a streamed world.
///
/// Every field has a default, so a partial JSON file only needs to name
/// the values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World width in chunks (x axis).
    pub width: u32,
    /// World height in chunks (y axis).
    pub height: u32,
    /// World depth in chunks (z axis).
    pub depth: u32,
    /// Voxels per chunk side.
    pub chunk_size: u32,
    /// Full width of the horizontal streaming window, in chunks.
    pub render_distance: u32,
    /// Number of blocking I/O workers used by the streaming loader.
    pub io_workers: usize,
    /// Path of the world store file.
    pub world_path: PathBuf,
    /// Parameters for the sample terrain generator.
    pub terrain: TerrainParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 2,
            depth: 32,
            chunk_size: 32,
            render_distance: 8, // 4-chunk radius around the observer
            io_workers: 4,
            world_path: PathBuf::from("assets/worlds/world.dat"),
            terrain: TerrainParams::default(),
        }
    }
}

impl WorldConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject configurations the store format or the grid cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(Error::Config(format!(
                "world dimensions must be non-zero, got {}x{}x{}",
                self.width, self.height, self.depth
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be non-zero".into()));
        }
        if self.io_workers == 0 {
            return Err(Error::Config("io_workers must be non-zero".into()));
        }

        let volume = self.width as u64 * self.height as u64 * self.depth as u64;
        if volume > u32::MAX as u64 {
            return Err(Error::Config(format!(
                "world volume {} does not fit the u32 chunk count",
                volume
            )));
        }

        let chunk_volume = (self.chunk_size as u64).pow(3);
        if chunk_volume > u32::MAX as u64 {
            return Err(Error::Config(format!(
                "chunk_size {} gives a chunk volume beyond a single run",
                self.chunk_size
            )));
        }
        Ok(())
    }

    /// Grid dimensions in chunks.
    pub fn dims(&self) -> WorldDims {
        WorldDims::new(self.width, self.height, self.depth)
    }

    /// Settings the streaming loader needs.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            render_distance: self.render_distance,
            io_workers: self.io_workers,
        }
    }
}

/// Streaming loader settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Full width of the horizontal window, in chunks
    pub render_distance: u32,
    /// Size of the blocking I/O pool
    pub io_workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        WorldConfig::default().loader_config()
    }
}
