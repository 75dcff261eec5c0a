//! Run-length codec for chunk payloads
//!
//! A payload is a sequence of 5-byte records, each a little-endian `u32`
//! count followed by a `u8` voxel id. Records are concatenated without
//! padding. Uniform chunks collapse to a single record.

use crate::core::{Error, Result, VoxelId};

/// Size of one encoded run record in bytes
pub const RUN_RECORD_SIZE: usize = 5;

/// Expansion cap used when no chunk volume is known (a 256^3 chunk)
pub const DEFAULT_DECODE_LIMIT: usize = 1 << 24;

/// A run of `count` consecutive copies of `id`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub count: u32,
    pub id: VoxelId,
}

impl Run {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count.to_le_bytes());
        out.push(self.id);
    }

    fn read_from(record: &[u8]) -> Self {
        let count = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        Self { count, id: record[4] }
    }
}

/// Split voxels into maximal runs.
///
/// Runs longer than `u32::MAX` are split so every count fits its field.
pub fn runs(voxels: &[VoxelId]) -> Vec<Run> {
    let mut out = Vec::new();
    let Some((&first, rest)) = voxels.split_first() else {
        return out;
    };

    let mut current = Run { count: 1, id: first };
    for &v in rest {
        if v == current.id && current.count < u32::MAX {
            current.count += 1;
        } else {
            out.push(current);
            current = Run { count: 1, id: v };
        }
    }
    out.push(current);
    out
}

/// Encode voxels into run records.
///
/// Empty input gives an empty payload. Output length is always
/// `RUN_RECORD_SIZE * runs`.
pub fn encode(voxels: &[VoxelId]) -> Vec<u8> {
    let runs = runs(voxels);
    let mut out = Vec::with_capacity(runs.len() * RUN_RECORD_SIZE);
    for run in &runs {
        run.write_to(&mut out);
    }
    out
}

/// Decode run records back into voxels.
///
/// The expanded length is not checked against a chunk volume; callers
/// that know the expected shape normalize the result themselves.
pub fn decode(bytes: &[u8]) -> Result<Vec<VoxelId>> {
    decode_limited(bytes, usize::MAX)
}

/// Decode, producing at most `limit` voxels.
///
/// Record alignment is validated over the whole payload before any
/// expansion, so a payload that ends in a partial record fails even when
/// the limit would have stopped decoding earlier.
pub fn decode_limited(bytes: &[u8], limit: usize) -> Result<Vec<VoxelId>> {
    check_alignment(bytes)?;

    let mut out = Vec::new();
    for record in bytes.chunks_exact(RUN_RECORD_SIZE) {
        let run = Run::read_from(record);
        let room = limit - out.len();
        let take = (run.count as usize).min(room);
        out.resize(out.len() + take, run.id);
        if out.len() == limit {
            break;
        }
    }
    Ok(out)
}

/// Parse run records without expanding them.
pub fn decode_runs(bytes: &[u8]) -> Result<Vec<Run>> {
    check_alignment(bytes)?;
    Ok(bytes.chunks_exact(RUN_RECORD_SIZE).map(Run::read_from).collect())
}

/// Number of records in a payload
pub fn run_count(bytes: &[u8]) -> Result<usize> {
    check_alignment(bytes)?;
    Ok(bytes.len() / RUN_RECORD_SIZE)
}

fn check_alignment(bytes: &[u8]) -> Result<()> {
    let residual = bytes.len() % RUN_RECORD_SIZE;
    if residual != 0 {
        return Err(Error::MalformedRecord { len: bytes.len(), residual });
    }
    Ok(())
}
