//! Bundle installation over an open [`Connection`].
//!
//! The transport kind decides the strategy, and this is the only place that
//! looks at it:
//!
//! - **Stream**: the bundle is pushed with PutBytes; every chunk is
//!   acknowledged by the watch, so completion of the transfer is success.
//! - **Message**: the whole bundle goes to the phone in one message, and
//!   the phone answers once with a terminal install status.
//!
//! Neither path retries. The first failure is the result.

use std::path::Path;
use std::time::Duration;

use pbt_core::prelude::*;

use crate::protocol::{AppLogMessage, InstallStatus, Inbound, Outbound, PhoneMessage, WatchPacket};
use crate::transport::{Connection, MessageTransport, Transport, TransferProgress};

/// Upper bound on the wait for the phone's install status
pub const INSTALL_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Terminal outcome of one install attempt
#[derive(Debug)]
pub enum InstallResult {
    Success,
    Failure(Error),
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallResult::Success)
    }

    /// Human-readable reason for a failure
    pub fn reason(&self) -> Option<String> {
        match self {
            InstallResult::Success => None,
            InstallResult::Failure(e) => Some(e.to_string()),
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            InstallResult::Success => Ok(()),
            InstallResult::Failure(e) => Err(e),
        }
    }
}

/// Install the bundle at `bundle` over `connection`.
///
/// `on_progress` is called inline after each acknowledged chunk on stream
/// transports; message transports report no progress.
pub async fn install<F>(connection: &mut Connection, bundle: &Path, on_progress: F) -> InstallResult
where
    F: FnMut(TransferProgress),
{
    info!("Installing {} via {}", bundle.display(), connection.endpoint());
    let outcome = match connection.transport_mut() {
        Transport::Stream(stream) => {
            let payload = match read_bundle(bundle).await {
                Ok(payload) => payload,
                Err(e) => return InstallResult::Failure(e),
            };
            debug!("Bundle is {} bytes", payload.len());
            stream
                .transfer_bytes(&bundle_name(bundle), &payload, on_progress)
                .await
        }
        Transport::Message(ws) => match read_bundle(bundle).await {
            Ok(payload) => install_via_phone(ws, payload).await,
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(()) => {
            info!("Installed {}", bundle.display());
            InstallResult::Success
        }
        Err(e) => {
            error!("Install of {} failed: {}", bundle.display(), e);
            InstallResult::Failure(e)
        }
    }
}

async fn install_via_phone(ws: &mut MessageTransport, payload: Vec<u8>) -> Result<()> {
    ws.send(Outbound::Phone(PhoneMessage::InstallBundle(payload)))
        .await?;

    let status = ws
        .read_message(
            "install confirmation",
            INSTALL_CONFIRMATION_TIMEOUT,
            |message| match message {
                Inbound::Phone(PhoneMessage::InstallStatus(status)) => Some(*status),
                _ => None,
            },
        )
        .await?;

    match status {
        InstallStatus::Success => Ok(()),
        InstallStatus::Failed(status) => Err(Error::InstallRejected { status }),
    }
}

async fn read_bundle(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

fn bundle_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app.pbw".to_string())
}

/// A log line seen while following an app's logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    /// From the app's phone-side JavaScript
    Phone(String),
    /// From the watch app itself
    Watch(AppLogMessage),
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLine::Phone(line) => write!(f, "[phone] {line}"),
            LogLine::Watch(message) => write!(f, "{message}"),
        }
    }
}

/// Pass every app log line to `on_line` until the peer closes the connection.
pub async fn follow_logs<F>(connection: &mut Connection, mut on_line: F)
where
    F: FnMut(LogLine),
{
    while let Some(message) = connection.next_message().await {
        match message {
            Inbound::Phone(PhoneMessage::AppLog(line)) => on_line(LogLine::Phone(line)),
            Inbound::Watch(WatchPacket::AppLog(message)) => on_line(LogLine::Watch(message)),
            other => trace!("Ignoring {:?} while following logs", other),
        }
    }
    debug!("Log stream from {} ended", connection.endpoint());
}
