//! One-shot world creation: fill the grid from a generator, then save it.
//!
//! Only used when starting a brand-new world. Later runs stream from the
//! saved file instead.

use std::time::Instant;

use rayon::prelude::*;

use crate::core::{Error, Result, VoxelId};
use crate::streaming::disk_io::ChunkStore;
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::world::WorldGrid;

/// Source of procedural chunk data.
pub trait ChunkGenerator: Sync {
    /// Voxels for the chunk at `position`, exactly `chunk_size^3` long, in
    /// the layout `x + s*z + s*s*y`.
    fn generate(&self, position: ChunkCoord, chunk_size: u32) -> Vec<VoxelId>;
}

impl<F> ChunkGenerator for F
where
    F: Fn(ChunkCoord, u32) -> Vec<VoxelId> + Sync,
{
    fn generate(&self, position: ChunkCoord, chunk_size: u32) -> Vec<VoxelId> {
        self(position, chunk_size)
    }
}

/// Outcome of [`create_world`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldSummary {
    pub chunk_count: usize,
    pub non_empty_chunks: usize,
    pub bytes_written: u64,
}

/// Generate every chunk of `grid`, mark all of them resident, and save the
/// world to `store` exactly once.
///
/// Chunks are generated in parallel; installs happen on the calling thread.
/// Save failures are returned as-is, since a half-written world file must
/// never be streamed later.
pub fn create_world<G: ChunkGenerator>(
    generator: &G,
    grid: &mut WorldGrid,
    store: &ChunkStore,
) -> Result<WorldSummary> {
    let start = Instant::now();
    let dims = grid.dims();
    let chunk_size = grid.chunk_size();
    let volume = grid.chunk_volume();

    let generated: Vec<Vec<VoxelId>> = (0..grid.volume())
        .into_par_iter()
        .map(|i| generator.generate(dims.coord_of(i), chunk_size))
        .collect();

    let mut non_empty_chunks = 0;
    for (index, voxels) in generated.into_iter().enumerate() {
        if voxels.len() != volume {
            return Err(Error::Generation(format!(
                "generator returned {} voxels for chunk {}, expected {}",
                voxels.len(),
                index,
                volume
            )));
        }
        let header = grid.set_chunk(index, dims.coord_of(index), &voxels);
        if !header.is_empty {
            non_empty_chunks += 1;
        }
    }
    log::debug!("Generated {} chunks in {:.2?}", grid.volume(), start.elapsed());

    let bytes_written = store.save(grid)?;

    let summary = WorldSummary {
        chunk_count: grid.volume(),
        non_empty_chunks,
        bytes_written,
    };
    log::info!(
        "Created world {}: {} chunks ({} non-empty), {} bytes in {:.2?}",
        store.path().display(),
        summary.chunk_count,
        summary.non_empty_chunks,
        summary.bytes_written,
        start.elapsed()
    );
    Ok(summary)
}
