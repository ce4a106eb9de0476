//! # pbt-device - Watch Connections and Bundle Installation
//!
//! Talks to a watch directly over a byte stream, or through a phone / the
//! emulator's pypkjs runtime over a websocket, and installs app bundles.
//!
//! Depends on [`pbt_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Wire Protocol (`protocol`)
//! - [`WatchPacket`] - Decoded Pebble Protocol packet (AppRunState, AppLog, PutBytes)
//! - [`Inbound`] / [`Outbound`] - Messages received from / sent to a peer
//! - [`PhoneMessage`] - Websocket messages addressed to the phone itself
//!
//! ### Transports (`transport`)
//! - [`Endpoint`] - Websocket URL, serial device or QEMU socket
//! - [`Connection`] - An open connection owning exactly one [`Transport`]
//! - [`StreamTransport`] - Byte stream with PutBytes transfer and progress
//! - [`MessageTransport`] - Websocket framing discrete messages
//!
//! ### Installation (`installer`)
//! - [`install()`] - Install a bundle, choosing the strategy by transport kind
//! - [`InstallResult`] - Terminal outcome of one attempt
//! - [`follow_logs()`] - Stream app log lines after an install

pub mod installer;
pub mod protocol;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod transport;

pub use installer::{follow_logs, install, InstallResult, LogLine, INSTALL_CONFIRMATION_TIMEOUT};
pub use protocol::{
    AppLogMessage, AppRunState, Inbound, InstallStatus, Outbound, PhoneMessage, WatchPacket,
};
pub use transport::{
    Connection, Endpoint, MessageTransport, StreamFraming, StreamTransport, TransferProgress,
    Transport, TransportKind,
};
