//! Parsing and validation of `vtrace.toml` trace settings.
//!
//! The file holds a single `[trace]` table selecting the output format,
//! timescale, output path, and header metadata. Every field is optional.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
