//! Core type aliases and re-exports

pub use glam::Vec3;

/// An 8-bit voxel identifier; 0 is empty space (air).
pub type VoxelId = u8;

/// Voxel id for empty space
pub const AIR: VoxelId = 0;

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
