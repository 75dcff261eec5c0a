//! Noise-based procedural terrain generation

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::core::{VoxelId, AIR};
use crate::generation::ChunkGenerator;
use crate::voxel::chunk::{chunk_volume, local_index, ChunkCoord};

pub const STONE: VoxelId = 1;
pub const DIRT: VoxelId = 2;
pub const GRASS: VoxelId = 3;
pub const WATER: VoxelId = 4;

/// Depth of the dirt layer below the grass surface, in voxels
const DIRT_DEPTH: f32 = 4.0;

/// Parameters controlling terrain generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Vertical scale (max height, in voxels)
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
    pub sea_level: f32,    // Air below this height becomes water
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 48.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            sea_level: 20.0,
        }
    }
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Get terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // FBM can overshoot [-1, 1] slightly
        let noise_value = self.noise.get([nx, nz]).clamp(-1.0, 1.0);

        let normalized = (noise_value + 1.0) / 2.0;
        (normalized * self.params.height_scale as f64) as f32
    }

    /// Material at a voxel given the column's surface height
    fn voxel_at(&self, y: f32, surface: f32) -> VoxelId {
        if y < surface - DIRT_DEPTH {
            STONE
        } else if y < surface - 1.0 {
            DIRT
        } else if y < surface {
            GRASS
        } else if y < self.params.sea_level {
            WATER
        } else {
            AIR
        }
    }
}

impl ChunkGenerator for TerrainGenerator {
    fn generate(&self, position: ChunkCoord, chunk_size: u32) -> Vec<VoxelId> {
        let origin = position.world_origin(chunk_size);
        let mut voxels = vec![AIR; chunk_volume(chunk_size)];

        for lz in 0..chunk_size {
            for lx in 0..chunk_size {
                let column = origin + Vec3::new(lx as f32 + 0.5, 0.0, lz as f32 + 0.5);
                let surface = self.height_at(column.x, column.z);
                for ly in 0..chunk_size {
                    let y = origin.y + ly as f32;
                    voxels[local_index(chunk_size, lx, ly, lz)] = self.voxel_at(y, surface);
                }
            }
        }
        voxels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::chunk::is_all_air;

    #[test]
    fn test_terrain_params_default() {
        let params = TerrainParams::default();
        assert_eq!(params.seed, 12345);
        assert_eq!(params.height_scale, 48.0);
        assert_eq!(params.octaves, 4);
        assert_eq!(params.sea_level, 20.0);
    }

    #[test]
    fn test_height_at() {
        let generator = TerrainGenerator::new(TerrainParams::default());

        for (x, z) in [(0.0, 0.0), (50.0, 50.0), (100.0, 100.0), (-50.0, -50.0)] {
            let h = generator.height_at(x, z);
            assert!((0.0..=48.0).contains(&h), "height {} out of range at ({}, {})", h, x, z);
            assert_eq!(h, generator.height_at(x, z));
        }
    }

    #[test]
    fn test_different_seeds() {
        let gen1 = TerrainGenerator::new(TerrainParams { seed: 1, ..Default::default() });
        let gen2 = TerrainGenerator::new(TerrainParams { seed: 2, ..Default::default() });
        assert_ne!(gen1.height_at(50.0, 50.0), gen2.height_at(50.0, 50.0));
    }

    #[test]
    fn test_generate_has_chunk_volume() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let voxels = generator.generate(ChunkCoord::new(0, 0, 0), 8);
        assert_eq!(voxels.len(), 512);
    }

    #[test]
    fn test_chunk_above_terrain_is_air() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        // Terrain never rises above height_scale, sea level is lower still
        let voxels = generator.generate(ChunkCoord::new(0, 4, 0), 16);
        assert!(is_all_air(&voxels));
    }

    #[test]
    fn test_chunk_below_terrain_is_solid() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        // Surface is never below 0, so y in -16..-8 is under the dirt layer
        let voxels = generator.generate(ChunkCoord::new(0, -2, 0), 8);
        assert!(voxels.iter().all(|&v| v == STONE));
    }

    #[test]
    fn test_column_layering() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        assert_eq!(generator.voxel_at(0.0, 10.0), STONE);
        assert_eq!(generator.voxel_at(7.0, 10.0), DIRT);
        assert_eq!(generator.voxel_at(9.5, 10.0), GRASS);
        assert_eq!(generator.voxel_at(15.0, 10.0), WATER);
        assert_eq!(generator.voxel_at(25.0, 10.0), AIR);
    }
}
