//! `pbt wipe` - delete persisted emulator state

use std::path::{Path, PathBuf};

use pbt_core::prelude::*;

use super::Context;
use crate::config::platform_persist_dir;

/// Remove the persisted state of every configured platform, or the whole
/// persist directory when `everything` is set.
///
/// Returns the directories that were removed. Directories that do not exist
/// are skipped.
pub fn run(ctx: &Context, everything: bool) -> Result<Vec<PathBuf>> {
    let targets: Vec<PathBuf> = if everything {
        vec![ctx.persist_dir.clone()]
    } else {
        ctx.settings
            .sdk
            .platforms
            .iter()
            .map(|platform| {
                platform_persist_dir(&ctx.persist_dir, &ctx.settings.sdk.version, platform)
            })
            .collect()
    };

    let mut removed = Vec::new();
    for dir in targets {
        if remove_dir_if_present(&dir)? {
            info!("Removed {}", dir.display());
            removed.push(dir);
        }
    }
    Ok(removed)
}

fn remove_dir_if_present(dir: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tempfile::TempDir;

    fn context(persist: &Path) -> Context {
        Context::new(persist.to_path_buf(), Settings::default(), persist.to_path_buf())
    }

    #[test]
    fn test_wipe_platforms_keeps_settings() {
        let temp = TempDir::new().unwrap();
        let persist = temp.path().join(".pebble-sdk");
        std::fs::create_dir_all(persist.join("4.3/basalt")).unwrap();
        std::fs::create_dir_all(persist.join("4.3/chalk")).unwrap();
        std::fs::write(persist.join("4.3/basalt/qemu_spi_flash.bin"), b"flash").unwrap();
        std::fs::write(persist.join("settings.toml"), "").unwrap();

        let removed = run(&context(&persist), false).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!persist.join("4.3/basalt").exists());
        assert!(!persist.join("4.3/chalk").exists());
        assert!(persist.join("settings.toml").exists());
    }

    #[test]
    fn test_wipe_everything() {
        let temp = TempDir::new().unwrap();
        let persist = temp.path().join(".pebble-sdk");
        std::fs::create_dir_all(persist.join("4.3/aplite")).unwrap();

        assert_eq!(run(&context(&persist), true).unwrap(), vec![persist.clone()]);
        assert!(!persist.exists());
    }

    #[test]
    fn test_wipe_missing_dirs_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let persist = temp.path().join("never-created");
        assert!(run(&context(&persist), false).unwrap().is_empty());
        assert!(run(&context(&persist), true).unwrap().is_empty());
    }
}
