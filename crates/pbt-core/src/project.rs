//! Pebble project resolution
//!
//! A project directory carries either a `package.json` with a `pebble` section
//! (current SDK layout) or a legacy `appinfo.json`. Both name the app UUID,
//! which is what status reporting compares the running app against.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::AppUuid;

const PACKAGE_JSON: &str = "package.json";
const LEGACY_APPINFO: &str = "appinfo.json";

/// Directory bundles are built into, relative to the project root
const BUILD_DIR: &str = "build";

/// A resolved Pebble project
#[derive(Debug, Clone, PartialEq)]
pub struct PebbleProject {
    /// Project root directory
    pub path: PathBuf,
    /// Package name
    pub name: String,
    /// App UUID
    pub uuid: AppUuid,
    /// Name shown in the watch launcher
    pub display_name: Option<String>,
    /// Declared SDK version ("2" or "3")
    pub sdk_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pebble: Option<PackagePebbleSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackagePebbleSection {
    uuid: AppUuid,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    sdk_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppInfoJson {
    uuid: AppUuid,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    sdk_version: Option<String>,
}

impl PebbleProject {
    /// Resolve the project rooted at `dir`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAProject`] if neither manifest exists (or `package.json`
    ///   has no `pebble` section and there is no `appinfo.json`).
    /// - [`Error::InvalidProject`] if a manifest exists but cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let package_path = dir.join(PACKAGE_JSON);
        if package_path.is_file() {
            let content = read_manifest(dir, &package_path)?;
            let package: PackageJson = serde_json::from_str(&content)
                .map_err(|e| Error::invalid_project(dir, format!("{PACKAGE_JSON}: {e}")))?;

            if let Some(pebble) = package.pebble {
                trace!("Resolved project from {}", package_path.display());
                return Ok(Self {
                    path: dir.to_path_buf(),
                    name: package.name.unwrap_or_else(|| dir_name(dir)),
                    uuid: pebble.uuid,
                    display_name: pebble.display_name,
                    sdk_version: pebble.sdk_version,
                });
            }
            debug!("{} has no pebble section", package_path.display());
        }

        let appinfo_path = dir.join(LEGACY_APPINFO);
        if appinfo_path.is_file() {
            let content = read_manifest(dir, &appinfo_path)?;
            let appinfo: AppInfoJson = serde_json::from_str(&content)
                .map_err(|e| Error::invalid_project(dir, format!("{LEGACY_APPINFO}: {e}")))?;

            trace!("Resolved legacy project from {}", appinfo_path.display());
            return Ok(Self {
                path: dir.to_path_buf(),
                name: appinfo.short_name.unwrap_or_else(|| dir_name(dir)),
                uuid: appinfo.uuid,
                display_name: appinfo.long_name,
                sdk_version: appinfo.sdk_version,
            });
        }

        Err(Error::not_a_project(dir))
    }

    /// Path of the bundle this project builds to
    pub fn bundle_path(&self) -> PathBuf {
        default_bundle_path(&self.path)
    }
}

/// Default bundle location for a project directory: `build/<dirname>.pbw`.
///
/// Does not require `dir` to be a valid project.
pub fn default_bundle_path(dir: &Path) -> PathBuf {
    dir.join(BUILD_DIR).join(format!("{}.pbw", dir_name(dir)))
}

fn read_manifest(dir: &Path, manifest: &Path) -> Result<String> {
    fs::read_to_string(manifest).map_err(|e| {
        Error::invalid_project(dir, format!("cannot read {}: {e}", manifest.display()))
    })
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}
