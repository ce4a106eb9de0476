//! End-to-end status scenarios: registry file on disk, live pids, a scripted
//! runtime on the recorded port, and a project directory to match against.

use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use pbt_core::{AppUuid, Result};
use pbt_device::test_utils::{message_connection, MockPeer, PeerTranscript};
use pbt_device::{AppRunState, Connection, Inbound, Outbound, WatchPacket};
use pbt_emulator::{
    render_report, AppQuery, AppState, CompositeState, Connector, LocalhostConnector, ProcessRegistry,
    ProjectDir, SignalProbe, StatusAggregator,
};

const APP: &str = "3c2a1b6e-8f0d-4c57-9d3e-5a7b2c4e6f80";

struct ScriptedConnector {
    peer: MockPeer,
    ports: Mutex<Vec<u16>>,
    peers: Mutex<Vec<JoinHandle<PeerTranscript>>>,
}

impl ScriptedConnector {
    fn new(peer: MockPeer) -> Self {
        Self {
            peer,
            ports: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
        }
    }
}

impl Connector for ScriptedConnector {
    async fn connect(&self, port: u16) -> Result<Connection> {
        self.ports.lock().unwrap().push(port);
        let (connection, handle) = message_connection(self.peer.clone(), port).await;
        self.peers.lock().unwrap().push(handle);
        Ok(connection)
    }
}

fn write_registry(dir: &TempDir, json: &str) -> ProcessRegistry {
    let path = dir.path().join("pb-emulator.json");
    std::fs::write(&path, json).unwrap();
    ProcessRegistry::new(path)
}

fn write_project(dir: &TempDir, uuid: &str) -> ProjectDir {
    let root = dir.path().join("my-watchface");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join("package.json"),
        format!(r#"{{"name": "my-watchface", "pebble": {{"uuid": "{uuid}", "displayName": "Mine"}}}}"#),
    )
    .unwrap();
    ProjectDir(root)
}

fn exited_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[tokio::test]
async fn test_running_instance_with_current_project() {
    let temp = TempDir::new().unwrap();
    let pid = std::process::id();
    let registry = write_registry(
        &temp,
        &format!(
            r#"{{"basalt": {{"4.3": {{
                "qemu": {{"pid": {pid}}},
                "pypkjs": {{"pid": {pid}, "port": 9000}}
            }}}}}}"#
        ),
    );
    let project = write_project(&temp, APP);
    let app: AppUuid = APP.parse().unwrap();

    let connector = ScriptedConnector::new(MockPeer::cooperative(app));
    let aggregator = StatusAggregator::new(registry, SignalProbe, connector, project);
    let statuses = aggregator.compute_status().await.unwrap();

    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, CompositeState::Running);
    assert_eq!(
        statuses[0].app,
        AppQuery::Queried(AppState::Running {
            uuid: app,
            current_project: true
        })
    );

    let report = render_report(&statuses, false);
    assert!(report.contains("Status: RUNNING"));
    assert!(report.contains(&format!("App:    RUNNING ({APP} - current project)")));
}

#[tokio::test]
async fn test_mixed_registry_queries_only_running_instances() {
    let temp = TempDir::new().unwrap();
    let live = std::process::id();
    let dead = exited_pid();
    let registry = write_registry(
        &temp,
        &format!(
            r#"{{
                "aplite": {{"4.3": {{"qemu": {{"pid": {dead}}}, "pypkjs": {{"pid": {dead}, "port": 9001}}}}}},
                "basalt": {{"4.3": {{"qemu": {{"pid": {live}}}, "pypkjs": {{"pid": {dead}, "port": 9002}}}}}},
                "chalk": {{"4.3": {{"qemu": {{"pid": {live}}}, "pypkjs": {{"pid": {live}, "port": 9003}}}}}}
            }}"#
        ),
    );
    let project = ProjectDir(temp.path().to_path_buf());

    let connector = ScriptedConnector::new(MockPeer::cooperative(AppUuid::nil()));
    let aggregator = StatusAggregator::new(registry, SignalProbe, connector, project);
    let statuses = aggregator.compute_status().await.unwrap();

    let states: Vec<CompositeState> = statuses.iter().map(|s| s.state).collect();
    assert_eq!(states[0], CompositeState::Stopped);
    assert!(matches!(states[1], CompositeState::Degraded(_)));
    assert_eq!(states[2], CompositeState::Running);
    assert_eq!(statuses[2].app, AppQuery::Queried(AppState::Idle));

    let report = render_report(&statuses, false);
    assert!(report.contains("Status: STOPPED"));
    assert!(report.contains("Status: DEGRADED (pypkjs not running)"));
    assert!(report.contains("App:    no app running (showing watchface)"));
}

#[tokio::test]
async fn test_unreachable_runtime_does_not_abort_report() {
    let temp = TempDir::new().unwrap();
    let pid = std::process::id();
    // Bind and drop to find a port nothing is listening on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let registry = write_registry(
        &temp,
        &format!(
            r#"{{"emery": {{"4.3": {{"qemu": {{"pid": {pid}}}, "pypkjs": {{"pid": {pid}, "port": {port}}}}}}}}}"#
        ),
    );

    let aggregator = StatusAggregator::new(
        registry,
        SignalProbe,
        LocalhostConnector,
        ProjectDir(temp.path().to_path_buf()),
    );
    let statuses = aggregator.compute_status().await.unwrap();
    assert!(matches!(
        statuses[0].app,
        AppQuery::Queried(AppState::Disconnected { .. })
    ));
    assert!(render_report(&statuses, true).contains("DISCONNECTED (could not connect to emulator)"));
}

#[tokio::test]
async fn test_localhost_connector_queries_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app: AppUuid = APP.parse().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut saw_close = false;
        while let Some(Ok(frame)) = ws.next().await {
            match frame {
                WsMessage::Binary(data) => {
                    let request = Outbound::from_ws_frame(&data).unwrap();
                    assert_eq!(
                        request,
                        Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request))
                    );
                    let reply = Inbound::Watch(WatchPacket::AppRunState(AppRunState::Start(app)));
                    ws.send(WsMessage::Binary(reply.to_ws_frame().into()))
                        .await
                        .unwrap();
                }
                WsMessage::Close(_) => {
                    saw_close = true;
                    break;
                }
                _ => {}
            }
        }
        saw_close
    });

    let temp = TempDir::new().unwrap();
    let state = pbt_emulator::query_app_state(
        &LocalhostConnector,
        port,
        &ProjectDir(temp.path().to_path_buf()),
    )
    .await;

    assert_eq!(
        state,
        AppState::Running {
            uuid: app,
            current_project: false
        }
    );
    assert!(server.await.unwrap(), "connection was not closed");
}
