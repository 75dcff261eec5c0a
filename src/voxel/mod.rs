//! Voxel data structures: chunk views and the world grid

pub mod chunk;
pub mod world;

pub use chunk::{Chunk, ChunkCoord, ChunkHeader, ChunkState};
pub use world::{WorldDims, WorldGrid};
