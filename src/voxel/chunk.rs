//! Chunk coordinates, residency headers and borrowed chunk views

use glam::Vec3;

use crate::core::{VoxelId, AIR};

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert a continuous world position to the chunk containing it.
    ///
    /// Floors per axis, so negative positions land in negative chunks.
    pub fn from_world_pos(pos: Vec3, chunk_size: u32) -> Self {
        let cs = chunk_size as f32;
        Self {
            x: (pos.x / cs).floor() as i32,
            y: (pos.y / cs).floor() as i32,
            z: (pos.z / cs).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this chunk
    pub fn world_origin(&self, chunk_size: u32) -> Vec3 {
        let cs = chunk_size as f32;
        Vec3::new(self.x as f32 * cs, self.y as f32 * cs, self.z as f32 * cs)
    }
}

/// Residency record for one grid slot.
///
/// Created the first time the slot is populated and never removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Linear index in the world grid
    pub index: usize,
    /// Chunk-space position
    pub position: ChunkCoord,
    /// True iff every voxel in the chunk is air
    pub is_empty: bool,
}

/// A resident chunk: its header plus a view into the grid's voxel arena.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    header: ChunkHeader,
    chunk_size: u32,
    voxels: &'a [VoxelId],
}

impl<'a> Chunk<'a> {
    pub(crate) fn new(header: ChunkHeader, chunk_size: u32, voxels: &'a [VoxelId]) -> Self {
        Self { header, chunk_size, voxels }
    }

    pub fn header(&self) -> ChunkHeader {
        self.header
    }

    pub fn index(&self) -> usize {
        self.header.index
    }

    pub fn position(&self) -> ChunkCoord {
        self.header.position
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty
    }

    /// All voxels in storage order (`x + s*z + s*s*y`)
    pub fn voxels(&self) -> &'a [VoxelId] {
        self.voxels
    }

    /// Voxel at local coordinates, or `None` outside the chunk.
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> Option<VoxelId> {
        let s = self.chunk_size;
        if x >= s || y >= s || z >= s {
            return None;
        }
        let idx = local_index(s, x, y, z);
        self.voxels.get(idx).copied()
    }
}

/// Residency state of a grid slot.
///
/// Keeps an unloaded slot distinguishable from a loaded all-air chunk.
#[derive(Clone, Copy, Debug)]
pub enum ChunkState<'a> {
    Resident(Chunk<'a>),
    NotResident,
}

impl<'a> ChunkState<'a> {
    pub fn is_resident(&self) -> bool {
        matches!(self, ChunkState::Resident(_))
    }

    pub fn resident(self) -> Option<Chunk<'a>> {
        match self {
            ChunkState::Resident(chunk) => Some(chunk),
            ChunkState::NotResident => None,
        }
    }
}

/// Index of a voxel inside one chunk's storage
#[inline]
pub fn local_index(chunk_size: u32, x: u32, y: u32, z: u32) -> usize {
    let s = chunk_size as usize;
    x as usize + s * z as usize + s * s * y as usize
}

/// Number of voxels in a chunk of the given side length
#[inline]
pub fn chunk_volume(chunk_size: u32) -> usize {
    (chunk_size as usize).pow(3)
}

/// True iff the voxels contain nothing but air
pub fn is_all_air(voxels: &[VoxelId]) -> bool {
    voxels.iter().all(|&v| v == AIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_pos() {
        let cs = 16;
        let csf = cs as f32;

        let coord = ChunkCoord::from_world_pos(Vec3::new(csf / 2.0, csf / 2.0, csf / 2.0), cs);
        assert_eq!(coord, ChunkCoord::new(0, 0, 0));

        let coord = ChunkCoord::from_world_pos(Vec3::new(csf, 0.0, 0.0), cs);
        assert_eq!(coord, ChunkCoord::new(1, 0, 0));

        let coord = ChunkCoord::from_world_pos(Vec3::new(csf * 1.5, csf * 2.5, csf * 3.5), cs);
        assert_eq!(coord, ChunkCoord::new(1, 2, 3));

        // Negative coordinates floor away from zero
        let coord = ChunkCoord::from_world_pos(Vec3::new(-1.0, -17.0, -32.0), cs);
        assert_eq!(coord, ChunkCoord::new(-1, -2, -2));
    }

    #[test]
    fn test_world_origin() {
        let coord = ChunkCoord::new(1, 2, 3);
        assert_eq!(coord.world_origin(8), Vec3::new(8.0, 16.0, 24.0));
    }

    #[test]
    fn test_local_index_layout() {
        assert_eq!(local_index(4, 0, 0, 0), 0);
        assert_eq!(local_index(4, 1, 0, 0), 1);
        assert_eq!(local_index(4, 0, 0, 1), 4);
        assert_eq!(local_index(4, 0, 1, 0), 16);
        assert_eq!(local_index(4, 3, 3, 3), 63);
    }

    #[test]
    fn test_chunk_voxel_access() {
        let mut voxels = vec![AIR; chunk_volume(2)];
        voxels[local_index(2, 1, 1, 0)] = 7;
        let header = ChunkHeader {
            index: 0,
            position: ChunkCoord::default(),
            is_empty: false,
        };
        let chunk = Chunk::new(header, 2, &voxels);

        assert_eq!(chunk.voxel(1, 1, 0), Some(7));
        assert_eq!(chunk.voxel(0, 0, 0), Some(AIR));
        assert_eq!(chunk.voxel(2, 0, 0), None);
    }

    #[test]
    fn test_is_all_air() {
        assert!(is_all_air(&[0, 0, 0]));
        assert!(!is_all_air(&[0, 3, 0]));
        assert!(is_all_air(&[]));
    }
}
