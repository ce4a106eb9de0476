//! Best-effort query for the app running on a live emulator.
//!
//! Opens a fresh connection to the emulator's JS runtime, asks which app is
//! in the foreground, and always closes the connection before classifying
//! the outcome. Failures become [`AppState`] variants; nothing is raised.

use std::path::PathBuf;
use std::time::Duration;

use pbt_core::prelude::*;
use pbt_core::{AppUuid, PebbleProject};
use pbt_device::{AppRunState, Connection, Endpoint, Inbound, Outbound, WatchPacket};

/// How long the runtime has to answer an app-state request
pub const APP_STATE_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// What the emulator reported about its foreground app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// An app is running; `current_project` is set when it is the app built
    /// from the working directory
    Running { uuid: AppUuid, current_project: bool },
    /// The watchface or launcher is showing
    Idle,
    /// Connected, but no reply within [`APP_STATE_QUERY_TIMEOUT`]
    Unresponsive,
    /// The runtime could not be reached or dropped the connection
    Disconnected { detail: String },
    /// Anything else; `detail` is only shown in verbose output
    Unknown { detail: String },
}

/// Opens connections to an emulator's JS runtime.
#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    async fn connect(&self, port: u16) -> Result<Connection>;
}

/// Connects to `ws://localhost:<port>/`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalhostConnector;

impl Connector for LocalhostConnector {
    async fn connect(&self, port: u16) -> Result<Connection> {
        Connection::open(Endpoint::localhost(port)).await
    }
}

/// Resolves the app identifier of the project in the working directory.
pub trait ProjectResolver {
    /// # Errors
    ///
    /// [`Error::NotAProject`] when there is no project, which callers treat
    /// as "no match".
    fn current_app_uuid(&self) -> Result<AppUuid>;
}

/// Resolves the project in a fixed directory
#[derive(Debug, Clone)]
pub struct ProjectDir(pub PathBuf);

impl ProjectDir {
    /// The process's current working directory.
    pub fn current() -> Result<Self> {
        Ok(Self(std::env::current_dir()?))
    }
}

impl ProjectResolver for ProjectDir {
    fn current_app_uuid(&self) -> Result<AppUuid> {
        Ok(PebbleProject::load(&self.0)?.uuid)
    }
}

/// Ask the runtime on `port` which app is running.
pub async fn query_app_state<C, P>(connector: &C, port: u16, project: &P) -> AppState
where
    C: Connector,
    P: ProjectResolver,
{
    let mut connection = match connector.connect(port).await {
        Ok(connection) => connection,
        Err(e) => {
            debug!("App state query: cannot connect to port {}: {}", port, e);
            return classify_error(e);
        }
    };

    let reply = connection
        .send_and_read(
            Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request)),
            "app run state",
            APP_STATE_QUERY_TIMEOUT,
            running_app,
        )
        .await;
    connection.close().await;

    match reply {
        Ok(uuid) if uuid.is_nil() => AppState::Idle,
        Ok(uuid) => match project.current_app_uuid() {
            Ok(current) => AppState::Running {
                uuid,
                current_project: current == uuid,
            },
            Err(Error::NotAProject { .. }) => AppState::Running {
                uuid,
                current_project: false,
            },
            Err(e) => AppState::Unknown {
                detail: e.to_string(),
            },
        },
        Err(e) => classify_error(e),
    }
}

fn running_app(message: &Inbound) -> Option<AppUuid> {
    match message {
        Inbound::Watch(WatchPacket::AppRunState(AppRunState::Start(uuid))) => Some(*uuid),
        _ => None,
    }
}

fn classify_error(e: Error) -> AppState {
    match e {
        Error::Timeout { .. } => AppState::Unresponsive,
        Error::Connection { message } => AppState::Disconnected { detail: message },
        other => AppState::Unknown {
            detail: other.to_string(),
        },
    }
}
