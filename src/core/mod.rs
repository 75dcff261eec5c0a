//! Core types and utilities shared by the store, grid and loader

pub mod types;
pub mod error;
pub mod logging;
pub mod config;

pub use types::*;
pub use error::Error;
pub use config::{WorldConfig, LoaderConfig};
