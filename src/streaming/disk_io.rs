//! Single-file chunk store with a random-access offset index
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! 0               chunk_count: u32
//! 4               offsets: [u64; chunk_count]
//! offsets[i]      payload_len: u32
//! offsets[i] + 4  payload: payload_len bytes of run records
//! ```
//!
//! Every chunk can be read with two seeks and no scan of earlier records.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::{Error, Result, VoxelId};
use crate::streaming::rle;
use crate::voxel::world::WorldGrid;

/// Size of the chunk count header
pub const HEADER_SIZE: u64 = 4;
/// Size of one offset table entry
pub const OFFSET_SIZE: u64 = 8;
/// Size of the per-record payload length prefix
pub const LENGTH_PREFIX_SIZE: u64 = 4;

/// Byte position of the offset table entry for `index`
pub fn offset_entry_pos(index: usize) -> u64 {
    HEADER_SIZE + index as u64 * OFFSET_SIZE
}

/// Handle to a world store file.
///
/// Holds only the path. Every read opens its own file handle, so one store
/// can be shared by any number of concurrent readers.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    path: PathBuf,
    decode_limit: usize,
}

impl ChunkStore {
    /// Store at `path`, decoding at most [`rle::DEFAULT_DECODE_LIMIT`]
    /// voxels per chunk until [`with_decode_limit`](Self::with_decode_limit)
    /// says otherwise.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            decode_limit: rle::DEFAULT_DECODE_LIMIT,
        }
    }

    /// Cap the number of voxels a single load may expand to.
    ///
    /// Protects against corrupt run counts. Set it above the chunk volume
    /// so over-long records still reach the caller as over-long.
    pub fn with_decode_limit(mut self, limit: usize) -> Self {
        self.decode_limit = limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write every chunk of `grid` to the store file.
    ///
    /// Returns the number of bytes written.
    pub fn save(&self, grid: &WorldGrid) -> Result<u64> {
        let payloads = (0..grid.volume()).map(|i| rle::encode(grid.slice_at(i)));
        self.write_payloads(payloads)
    }

    /// Write already-encoded payloads, one per linear index, in order.
    ///
    /// Data goes to a temporary sibling file that replaces `path` only after
    /// the offset table has been patched and flushed.
    pub fn write_payloads<I>(&self, payloads: I) -> Result<u64>
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: ExactSizeIterator,
    {
        let payloads = payloads.into_iter();
        let count = u32::try_from(payloads.len()).map_err(|_| {
            Error::Config(format!("{} chunks exceed the u32 chunk count", payloads.len()))
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        let written = match write_store(&tmp_path, count, payloads) {
            Ok(written) => written,
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        std::fs::rename(&tmp_path, &self.path)?;

        log::debug!("Wrote {} chunks ({} bytes) to {}", count, written, self.path.display());
        Ok(written)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read only the stored chunk count.
    pub fn chunk_count(&self) -> Result<u32> {
        let mut file = File::open(&self.path)?;
        read_u32(&mut file)
    }

    /// Read the raw, undecoded payload of one chunk.
    pub fn load_payload(&self, index: usize) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        let count = read_u32(&mut file)?;
        if index >= count as usize {
            return Err(Error::IndexOutOfRange { index, count });
        }

        let table_end = offset_entry_pos(count as usize);
        if table_end > file_len {
            return Err(Error::CorruptData(format!(
                "offset table needs {} bytes but file is {} bytes",
                table_end, file_len
            )));
        }

        file.seek(SeekFrom::Start(offset_entry_pos(index)))?;
        let offset = read_u64(&mut file)?;
        if offset < table_end || offset.saturating_add(LENGTH_PREFIX_SIZE) > file_len {
            return Err(Error::CorruptData(format!(
                "chunk {} offset {} outside record area {}..{}",
                index, offset, table_end, file_len
            )));
        }

        file.seek(SeekFrom::Start(offset))?;
        let len = read_u32(&mut file)? as u64;
        let payload_start = offset + LENGTH_PREFIX_SIZE;
        if payload_start + len > file_len {
            return Err(Error::CorruptData(format!(
                "chunk {} payload of {} bytes runs past end of file",
                index, len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Load and decode one chunk by linear index.
    ///
    /// The result is returned as decoded; its length is not forced to the
    /// chunk volume.
    pub fn load_by_index(&self, index: usize) -> Result<Vec<VoxelId>> {
        let payload = self.load_payload(index)?;
        rle::decode_limited(&payload, self.decode_limit)
    }
}

fn write_store<I>(path: &Path, count: u32, payloads: I) -> Result<u64>
where
    I: Iterator<Item = Vec<u8>>,
{
    let mut out = BufWriter::new(File::create(path)?);

    out.write_all(&count.to_le_bytes())?;
    // Placeholder offset table, patched once all records are written
    let table = vec![0u8; count as usize * OFFSET_SIZE as usize];
    out.write_all(&table)?;

    let mut offsets = Vec::with_capacity(count as usize);
    let mut pos = HEADER_SIZE + table.len() as u64;
    for payload in payloads {
        let len = u32::try_from(payload.len()).map_err(|_| {
            Error::CorruptData(format!("payload of {} bytes exceeds u32 length", payload.len()))
        })?;
        offsets.push(pos);
        out.write_all(&len.to_le_bytes())?;
        out.write_all(&payload)?;
        pos += LENGTH_PREFIX_SIZE + payload.len() as u64;
    }

    out.seek(SeekFrom::Start(HEADER_SIZE))?;
    for offset in &offsets {
        out.write_all(&offset.to_le_bytes())?;
    }

    let file = out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(pos)
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(eof_as_corrupt)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(eof_as_corrupt)?;
    Ok(u64::from_le_bytes(buf))
}

fn eof_as_corrupt(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::CorruptData("unexpected end of file".into())
    } else {
        Error::Io(e)
    }
}
