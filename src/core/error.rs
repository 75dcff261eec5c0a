//! Error types for voxstream

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk index {index} out of range (store holds {count} chunks)")]
    IndexOutOfRange { index: usize, count: u32 },

    /// Payload length is not a whole number of 5-byte run records.
    #[error("malformed run payload: {len} bytes leaves {residual} trailing bytes")]
    MalformedRecord { len: usize, residual: usize },

    #[error("corrupt chunk data: {0}")]
    CorruptData(String),

    /// Stored chunk count disagrees with the configured world volume.
    #[error("world file holds {stored} chunks but the grid expects {expected}")]
    ConfigurationMismatch { stored: u32, expected: usize },

    #[error("malformed text run data: {0}")]
    MalformedText(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Streaming error: {0}")]
    Streaming(String),
}
