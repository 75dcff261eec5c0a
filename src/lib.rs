//! Voxstream - single-file voxel chunk store with observer-driven streaming

pub mod core;
pub mod voxel;
pub mod streaming;
pub mod terrain;
pub mod generation;
