//! # pbt-emulator - Emulator Status and Control
//!
//! Reads the registry of emulator processes recorded by the launcher,
//! probes which of them are still alive, and reports a correlated status per
//! instance, including the app running on a live instance.
//!
//! Depends on [`pbt_core`] for domain types and [`pbt_device`] for the
//! connection used by the app-state query.
//!
//! ## Public API
//!
//! ### Registry (`registry`)
//! - [`ProcessRegistry`] - Handle to the launcher's JSON registry file
//! - [`EmulatorInstance`] - One `(platform, SDK version)` and its recorded processes
//!
//! ### Liveness (`liveness`)
//! - [`ProcessProbe`] / [`SignalProbe`] - Is a recorded pid still alive?
//! - [`is_alive()`] - Probe with the null signal
//! - [`KillSignal`], [`terminate()`] - Stop a recorded process
//!
//! ### Status (`status`, `app_state`, `report`)
//! - [`StatusAggregator`] - Compute [`EmulatorStatus`] for every instance
//! - [`CompositeState`] - RUNNING / DEGRADED / STOPPED
//! - [`query_app_state()`] - Ask a live instance which app is running
//! - [`render_report()`] - Text for the `status` command
//!
//! ### Control (`control`)
//! - [`kill_all()`] - Signal every recorded process

pub mod app_state;
pub mod control;
pub mod liveness;
pub mod registry;
pub mod report;
pub mod status;

pub use app_state::{
    query_app_state, AppState, Connector, LocalConnector, LocalhostConnector, ProjectDir,
    ProjectResolver, APP_STATE_QUERY_TIMEOUT,
};
pub use control::kill_all;
pub use liveness::{is_alive, terminate, KillSignal, ProcessProbe, SignalProbe};
pub use registry::{EmulatorInstance, ProcessRegistry};
pub use report::{render_report, render_status, NO_EMULATORS};
pub use status::{
    runtime_endpoint, AppQuery, CompositeState, DegradedReason, DisplayBridge, EmulatorStatus,
    RoleStatus, StatusAggregator,
};
