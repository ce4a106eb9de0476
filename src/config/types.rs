//! Configuration types for pebble-tool
//!
//! Defines:
//! - `Settings` - Global settings read from `settings.toml`
//! - `SdkSettings`, `EmulatorSettings`, `PhoneSettings` - Per-section settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global settings (from `<persist_dir>/settings.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub sdk: SdkSettings,

    #[serde(default)]
    pub emulator: EmulatorSettings,

    #[serde(default)]
    pub phone: PhoneSettings,
}

impl Settings {
    /// Registry file written by the emulator launcher
    pub fn registry_path(&self) -> PathBuf {
        self.emulator
            .registry_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(REGISTRY_FILENAME))
    }
}

const REGISTRY_FILENAME: &str = "pb-emulator.json";

/// SDK selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SdkSettings {
    /// SDK version the emulators were started with
    #[serde(default = "default_sdk_version")]
    pub version: String,

    /// Platforms with persisted emulator state
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            version: default_sdk_version(),
            platforms: default_platforms(),
        }
    }
}

fn default_sdk_version() -> String {
    "4.3".to_string()
}

fn default_platforms() -> Vec<String> {
    ["aplite", "basalt", "chalk", "diorite", "emery"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

/// Emulator settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmulatorSettings {
    /// Override for the process registry location (defaults to the system
    /// temp directory)
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

/// Phone developer connection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhoneSettings {
    /// Websocket port of the developer connection
    #[serde(default = "default_phone_port")]
    pub port: u16,
}

impl Default for PhoneSettings {
    fn default() -> Self {
        Self {
            port: default_phone_port(),
        }
    }
}

fn default_phone_port() -> u16 {
    9000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.sdk.version, "4.3");
        assert_eq!(settings.sdk.platforms.len(), 5);
        assert_eq!(settings.phone.port, 9000);
        assert_eq!(
            settings.registry_path(),
            std::env::temp_dir().join("pb-emulator.json")
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[sdk]
version = "4.5"

[emulator]
registry_path = "/tmp/custom.json"
"#,
        )
        .unwrap();

        assert_eq!(settings.sdk.version, "4.5");
        assert_eq!(settings.sdk.platforms, default_platforms());
        assert_eq!(settings.registry_path(), PathBuf::from("/tmp/custom.json"));
        assert_eq!(settings.phone.port, 9000);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }
}
