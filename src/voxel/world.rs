//! WorldGrid - linear chunk addressing over one contiguous voxel arena.

use crate::core::{VoxelId, AIR};
use crate::voxel::chunk::{chunk_volume, is_all_air, Chunk, ChunkCoord, ChunkHeader, ChunkState};

/// World size in chunk units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldDims {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl WorldDims {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    /// Chunks per horizontal layer (`W * D`)
    pub fn area(&self) -> usize {
        self.width as usize * self.depth as usize
    }

    /// Total chunk slots (`W * H * D`)
    pub fn volume(&self) -> usize {
        self.area() * self.height as usize
    }

    /// Linear index `x + W*z + W*D*y`, or `None` outside the grid.
    pub fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as u32, y as u32, z as u32);
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        Some(x as usize + self.width as usize * z as usize + self.area() * y as usize)
    }

    /// Inverse of [`WorldDims::index`].
    pub fn coord_of(&self, index: usize) -> ChunkCoord {
        let area = self.area();
        let y = index / area;
        let rem = index % area;
        let z = rem / self.width as usize;
        let x = rem % self.width as usize;
        ChunkCoord::new(x as i32, y as i32, z as i32)
    }
}

/// Backing storage for every chunk slot in the world.
///
/// Slot `i` owns `voxels[i * CHUNK_VOLUME..(i + 1) * CHUNK_VOLUME]`. A slot
/// only counts as resident once generation or a load has populated it.
pub struct WorldGrid {
    dims: WorldDims,
    chunk_size: u32,
    chunk_volume: usize,
    voxels: Vec<VoxelId>,
    headers: Vec<Option<ChunkHeader>>,
    resident: usize,
}

impl WorldGrid {
    /// Allocate an all-air, fully non-resident grid.
    pub fn new(dims: WorldDims, chunk_size: u32) -> Self {
        let chunk_volume = chunk_volume(chunk_size);
        let volume = dims.volume();
        Self {
            dims,
            chunk_size,
            chunk_volume,
            voxels: vec![AIR; volume * chunk_volume],
            headers: vec![None; volume],
            resident: 0,
        }
    }

    pub fn dims(&self) -> WorldDims {
        self.dims
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Voxels per chunk
    pub fn chunk_volume(&self) -> usize {
        self.chunk_volume
    }

    /// Number of chunk slots
    pub fn volume(&self) -> usize {
        self.headers.len()
    }

    pub fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        self.dims.index(x, y, z)
    }

    pub fn coord_of(&self, index: usize) -> ChunkCoord {
        self.dims.coord_of(index)
    }

    fn range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.chunk_volume;
        start..start + self.chunk_volume
    }

    /// Backing voxels of a slot, resident or not.
    pub fn slice_at(&self, index: usize) -> &[VoxelId] {
        let range = self.range(index);
        &self.voxels[range]
    }

    /// Mutable backing voxels of a slot.
    ///
    /// Writing here does not change residency; use [`WorldGrid::set_chunk`]
    /// to install data.
    pub fn slice_at_mut(&mut self, index: usize) -> &mut [VoxelId] {
        let range = self.range(index);
        &mut self.voxels[range]
    }

    /// Copy `voxels` into slot `index` and mark it resident.
    ///
    /// # Panics
    /// If `voxels.len()` is not the chunk volume or `index` is outside the
    /// grid. Callers normalize lengths before installing.
    pub fn set_chunk(&mut self, index: usize, position: ChunkCoord, voxels: &[VoxelId]) -> ChunkHeader {
        assert_eq!(
            voxels.len(),
            self.chunk_volume,
            "chunk data for slot {} has wrong length",
            index
        );

        self.slice_at_mut(index).copy_from_slice(voxels);

        let header = ChunkHeader {
            index,
            position,
            is_empty: is_all_air(voxels),
        };
        if self.headers[index].replace(header).is_none() {
            self.resident += 1;
        }
        header
    }

    /// Header of a slot, `None` while it is not resident.
    pub fn header(&self, index: usize) -> Option<ChunkHeader> {
        self.headers.get(index).copied().flatten()
    }

    /// Residency state and, when resident, a view of the chunk.
    pub fn chunk(&self, index: usize) -> ChunkState<'_> {
        match self.header(index) {
            Some(header) => ChunkState::Resident(Chunk::new(header, self.chunk_size, self.slice_at(index))),
            None => ChunkState::NotResident,
        }
    }

    pub fn is_resident(&self, index: usize) -> bool {
        self.header(index).is_some()
    }

    /// Number of resident slots
    pub fn resident_count(&self) -> usize {
        self.resident
    }

    /// Iterate all resident chunks in index order.
    pub fn resident_chunks(&self) -> impl Iterator<Item = Chunk<'_>> {
        self.headers
            .iter()
            .flatten()
            .map(|header| Chunk::new(*header, self.chunk_size, self.slice_at(header.index)))
    }
}

impl std::fmt::Debug for WorldGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldGrid")
            .field("dims", &self.dims)
            .field("chunk_size", &self.chunk_size)
            .field("resident", &self.resident)
            .field("voxels", &"<arena>")
            .finish()
    }
}
