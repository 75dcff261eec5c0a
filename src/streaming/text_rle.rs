//! Legacy text run encoding
//!
//! Older world files stored each chunk as a string of runs of the form
//! `;<count>-<id>`, with the count in base62 (`0-9`, `a-z`, `A-Z`) and the
//! id in decimal. The binary codec in [`super::rle`] replaced it; this
//! module reads and writes the old form, and [`LegacyWorld`] imports or
//! exports whole worlds in the old JSON layout.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result, VoxelId};
use crate::streaming::chunk_loader::normalize;
use crate::streaming::disk_io::ChunkStore;
use crate::streaming::rle;
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::world::{WorldDims, WorldGrid};

const BASE: u64 = 62;

fn digit_to_char(d: u8) -> char {
    match d {
        0..=9 => (b'0' + d) as char,
        10..=35 => (b'a' + d - 10) as char,
        _ => (b'A' + d - 36) as char,
    }
}

fn char_to_digit(c: char) -> Result<u64> {
    let d = match c {
        '0'..='9' => c as u64 - '0' as u64,
        'a'..='z' => c as u64 - 'a' as u64 + 10,
        'A'..='Z' => c as u64 - 'A' as u64 + 36,
        _ => return Err(Error::MalformedText(format!("invalid base62 digit {:?}", c))),
    };
    Ok(d)
}

/// Base62 representation of a run count. Zero encodes as `"0"`.
pub fn encode_count_base62(mut count: u64) -> String {
    if count == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while count > 0 {
        digits.push(digit_to_char((count % BASE) as u8));
        count /= BASE;
    }
    digits.iter().rev().collect()
}

/// Parse a base62 count. The empty string parses as zero.
pub fn decode_count_base62(s: &str) -> Result<u64> {
    s.chars().try_fold(0u64, |acc, c| {
        let d = char_to_digit(c)?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(d))
            .ok_or_else(|| Error::MalformedText(format!("count {:?} overflows", s)))
    })
}

/// Encode voxels as legacy run text. Empty input gives an empty string.
pub fn encode_text(voxels: &[VoxelId]) -> String {
    rle::runs(voxels)
        .iter()
        .map(|run| format!(";{}-{}", encode_count_base62(run.count as u64), run.id))
        .collect()
}

/// Decode legacy run text into voxels, expanding to at most
/// [`rle::DEFAULT_DECODE_LIMIT`] voxels.
///
/// Anything before the first `;` is ignored, matching how old files were
/// read back.
pub fn decode_text(text: &str) -> Result<Vec<VoxelId>> {
    decode_text_limited(text, rle::DEFAULT_DECODE_LIMIT)
}

/// Decode legacy run text, failing once the runs would expand past
/// `limit` voxels.
///
/// Counts are checked before anything is allocated, so a short string
/// with a huge base62 count is rejected rather than expanded.
pub fn decode_text_limited(text: &str, limit: usize) -> Result<Vec<VoxelId>> {
    let mut out = Vec::new();
    for part in text.split(';').skip(1) {
        let (count, id) = part
            .split_once('-')
            .ok_or_else(|| Error::MalformedText(format!("run {:?} has no '-' separator", part)))?;
        let count = decode_count_base62(count)?;
        let id: VoxelId = id
            .parse()
            .map_err(|_| Error::MalformedText(format!("invalid voxel id {:?}", id)))?;
        let total = usize::try_from(count)
            .ok()
            .and_then(|count| out.len().checked_add(count))
            .filter(|&total| total <= limit)
            .ok_or_else(|| {
                Error::MalformedText(format!("runs expand past the {} voxel limit", limit))
            })?;
        out.resize(total, id);
    }
    Ok(out)
}

/// Re-encode a binary run payload as legacy run text.
///
/// Works record by record, so nothing is expanded.
pub fn binary_to_text(payload: &[u8]) -> Result<String> {
    Ok(rle::decode_runs(payload)?
        .iter()
        .map(|run| format!(";{}-{}", encode_count_base62(run.count as u64), run.id))
        .collect())
}

/// A whole world in the old JSON layout: one run string per chunk and the
/// chunk's position, both in linear index order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyWorld {
    pub voxels: Vec<String>,
    pub chunk_pos: Vec<[i32; 3]>,
}

impl LegacyWorld {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Export every chunk of `store` as run text.
    pub fn from_store(store: &ChunkStore, dims: WorldDims) -> Result<Self> {
        let stored = store.chunk_count()?;
        if stored as usize != dims.volume() {
            return Err(Error::ConfigurationMismatch {
                stored,
                expected: dims.volume(),
            });
        }

        let mut world = Self::default();
        for index in 0..dims.volume() {
            world.voxels.push(binary_to_text(&store.load_payload(index)?)?);
            let c = dims.coord_of(index);
            world.chunk_pos.push([c.x, c.y, c.z]);
        }
        Ok(world)
    }

    /// Install every chunk into `grid`.
    ///
    /// Each entry must sit at the slot its position addresses. Short chunks
    /// are padded with air; a chunk that expands past the chunk volume is
    /// rejected. Returns the number of non-empty chunks.
    pub fn install(&self, grid: &mut WorldGrid) -> Result<usize> {
        if self.voxels.len() != grid.volume() {
            return Err(Error::ConfigurationMismatch {
                stored: u32::try_from(self.voxels.len()).unwrap_or(u32::MAX),
                expected: grid.volume(),
            });
        }
        if self.chunk_pos.len() != self.voxels.len() {
            return Err(Error::MalformedText(format!(
                "{} chunk positions for {} chunks",
                self.chunk_pos.len(),
                self.voxels.len()
            )));
        }

        let volume = grid.chunk_volume();
        let mut non_empty = 0;
        for (index, (text, &[x, y, z])) in self.voxels.iter().zip(&self.chunk_pos).enumerate() {
            if grid.index(x, y, z) != Some(index) {
                return Err(Error::MalformedText(format!(
                    "chunk {} stored at position ({}, {}, {}) which addresses another slot",
                    index, x, y, z
                )));
            }
            let voxels = normalize(decode_text_limited(text, volume)?, volume);
            if !grid.set_chunk(index, ChunkCoord::new(x, y, z), &voxels).is_empty {
                non_empty += 1;
            }
        }
        Ok(non_empty)
    }
}

/// Convert a legacy JSON world into `store`, filling `grid` on the way.
///
/// Nothing is written unless every chunk decodes.
pub fn import_legacy_world(
    legacy_path: &Path,
    grid: &mut WorldGrid,
    store: &ChunkStore,
) -> Result<u64> {
    let world = LegacyWorld::load(legacy_path)?;
    let non_empty = world.install(grid)?;
    let written = store.save(grid)?;
    log::info!(
        "Imported {} chunks ({} non-empty) from {} into {}",
        grid.volume(),
        non_empty,
        legacy_path.display(),
        store.path().display()
    );
    Ok(written)
}
