//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Rolled files are named `<prefix>.<YYYY-MM-DD>` (UTC date).
const LOG_FILE_PREFIX: &str = "pbt.log";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/pebble-tool/logs/`, never to the
/// terminal, which is reserved for command output.
/// Log level is controlled by the `PBT_LOG` environment variable.
///
/// # Examples
/// ```bash
/// PBT_LOG=debug pbt status
/// PBT_LOG=pbt_device=trace pbt install
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    // Default to info, allow override via PBT_LOG
    let env_filter = EnvFilter::try_from_env("PBT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("pebble_tool=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("pebble-tool {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {}", log_dir.display());

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("pebble-tool").join("logs")
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> PathBuf {
    get_log_directory().join(daily_file_name(chrono::Utc::now().date_naive()))
}

fn daily_file_name(day: chrono::NaiveDate) -> String {
    format!("{}.{}", LOG_FILE_PREFIX, day.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_file_name_matches_rolling_appender() {
        let day = chrono::NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(daily_file_name(day), "pbt.log.2026-03-07");
    }

    #[test]
    fn test_current_log_file_is_in_log_directory() {
        let file = get_current_log_file();
        assert_eq!(file.parent(), Some(get_log_directory().as_path()));
        assert!(file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pbt.log."));
    }
}
