//! # pbt-core - Core Domain Types
//!
//! Foundation crate for pebble-tool. Provides domain types, error handling,
//! logging setup, and project resolution.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing, uuid).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`ProcessRole`] - Engine, Runtime, or DisplayBridge process of an emulator
//! - [`EmulatorInstanceKey`] - Platform + SDK version identifying one emulator
//! - [`ProcessRecord`] - Recorded pid/port/VNC flag for one role
//! - [`AppUuid`] - Watch application identifier
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum covering connection, timeout, transfer and probe failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Projects (`project`)
//! - [`PebbleProject`] - A resolved project directory and its app UUID
//! - [`default_bundle_path()`] - Where a project's `.pbw` is built
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use pbt_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod project;
pub mod types;

/// Prelude for common imports used throughout all pebble-tool crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use project::{default_bundle_path, PebbleProject};
pub use types::{AppUuid, EmulatorInstanceKey, ProcessRecord, ProcessRole};
