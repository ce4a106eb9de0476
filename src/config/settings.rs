//! Settings loading and the persisted SDK directory

use super::types::Settings;
use pbt_core::prelude::*;
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.toml";
const PERSIST_DIR_NAME: &str = ".pebble-sdk";

/// Environment variable overriding [`persist_dir()`]
pub const PERSIST_DIR_ENV: &str = "PEBBLE_PERSIST_DIR";

/// Directory holding settings and per-platform emulator state.
///
/// `$PEBBLE_PERSIST_DIR` if set, otherwise `~/.pebble-sdk`.
pub fn persist_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(PERSIST_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PERSIST_DIR_NAME)
}

/// Persisted flash/state of one emulator platform
pub fn platform_persist_dir(persist_dir: &Path, sdk_version: &str, platform: &str) -> PathBuf {
    persist_dir.join(sdk_version).join(platform)
}

/// Load settings from `<persist_dir>/settings.toml`
///
/// Returns default settings if the file doesn't exist.
///
/// # Errors
///
/// [`Error::Config`] if the file exists but cannot be read or parsed.
pub fn load_settings(persist_dir: &Path) -> Result<Settings> {
    let path = persist_dir.join(SETTINGS_FILENAME);

    if !path.exists() {
        debug!("No settings file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    let settings = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))?;
    debug!("Loaded settings from {:?}", path);
    Ok(settings)
}
