//! pebble-tool library
//!
//! Command implementations behind the `pbt` binary. Device and emulator
//! logic lives in the `pbt-device` and `pbt-emulator` crates.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{run, Cli, Command};
