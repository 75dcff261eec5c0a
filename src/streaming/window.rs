//! Horizontal streaming window around the observer

use std::ops::Range;

use glam::Vec3;

use crate::voxel::chunk::ChunkCoord;
use crate::voxel::world::WorldDims;

/// Box of chunk coordinates that should be resident.
///
/// Windowed on x and z only; y always spans the full world height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingWindow {
    pub x: Range<i32>,
    pub y: Range<i32>,
    pub z: Range<i32>,
}

impl StreamingWindow {
    /// Window of half-width `render_distance / 2` around `center`,
    /// clamped to the grid.
    pub fn around(center: ChunkCoord, render_distance: u32, dims: WorldDims) -> Self {
        let r = (render_distance / 2) as i32;
        Self {
            x: clamp_axis(center.x.saturating_sub(r), center.x.saturating_add(r), dims.width),
            y: 0..dims.height as i32,
            z: clamp_axis(center.z.saturating_sub(r), center.z.saturating_add(r), dims.depth),
        }
    }

    /// Window for a continuous observer position.
    pub fn for_observer(observer: Vec3, chunk_size: u32, render_distance: u32, dims: WorldDims) -> Self {
        Self::around(ChunkCoord::from_world_pos(observer, chunk_size), render_distance, dims)
    }

    /// Number of chunk slots covered
    pub fn len(&self) -> usize {
        self.x.len() * self.y.len() * self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.x.contains(&coord.x) && self.y.contains(&coord.y) && self.z.contains(&coord.z)
    }

    /// Iterate covered coordinates, y-major then z then x.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.y.clone().flat_map(move |y| {
            self.z
                .clone()
                .flat_map(move |z| self.x.clone().map(move |x| ChunkCoord::new(x, y, z)))
        })
    }
}

fn clamp_axis(lo: i32, hi: i32, extent: u32) -> Range<i32> {
    let start = lo.max(0);
    let end = hi.min(extent as i32).max(start);
    start..end
}
