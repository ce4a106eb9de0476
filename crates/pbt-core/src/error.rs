//! Application error types with rich context

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Timed out waiting for {what} after {}s", .waited.as_secs())]
    Timeout { what: String, waited: Duration },

    #[error("Malformed message: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Install Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Transfer failed: {message}")]
    Transfer { message: String },

    #[error("App install failed (status {status})")]
    InstallRejected { status: u32 },

    // ─────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to probe process {pid}: {message}")]
    ProcessProbe { pid: u32, message: String },

    #[error("No running emulator for {platform}: {message}")]
    EmulatorNotRunning { platform: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Project Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No Pebble project found in: {path}")]
    NotAProject { path: PathBuf },

    #[error("Invalid Pebble project at {path}: {message}")]
    InvalidProject { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────
    /// A command was invoked in a way it cannot act on; shown verbatim.
    #[error("{message}")]
    Usage { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn process_probe(pid: u32, message: impl Into<String>) -> Self {
        Self::ProcessProbe {
            pid,
            message: message.into(),
        }
    }

    pub fn emulator_not_running(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmulatorNotRunning {
            platform: platform.into(),
            message: message.into(),
        }
    }

    pub fn not_a_project(path: impl Into<PathBuf>) -> Self {
        Self::NotAProject { path: path.into() }
    }

    pub fn invalid_project(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidProject {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a connection-level failure (refused, lost, closed).
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Whether this error is a bounded wait that expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::Timeout { .. }
                | Error::Protocol { .. }
                | Error::NotAProject { .. }
                | Error::EmulatorNotRunning { .. }
                | Error::Usage { .. }
        )
    }

    /// Check if this error should abort the current command
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ProcessProbe { .. } | Error::Config { .. } | Error::InvalidProject { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
