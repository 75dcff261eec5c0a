//! Chunk persistence and observer-driven streaming

pub mod rle;
pub mod text_rle;
pub mod disk_io;
pub mod window;
pub mod chunk_loader;

pub use rle::{Run, RUN_RECORD_SIZE, DEFAULT_DECODE_LIMIT};
pub use text_rle::{LegacyWorld, import_legacy_world};
pub use disk_io::ChunkStore;
pub use window::StreamingWindow;
pub use chunk_loader::{StreamingLoader, LoadStats, normalize};
