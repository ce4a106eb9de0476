//! Configuration for pebble-tool
//!
//! Supports:
//! - `<persist_dir>/settings.toml` - Global settings
//! - `PEBBLE_PERSIST_DIR` - Override for the persist directory

pub mod settings;
pub mod types;

pub use settings::{load_settings, persist_dir, platform_persist_dir, PERSIST_DIR_ENV};
pub use types::*;
