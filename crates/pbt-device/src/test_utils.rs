//! Scripted peers for exercising transports without a watch, phone or emulator.
//!
//! Each helper returns the tool's side of a connection plus a handle to the
//! peer task. Awaiting the handle yields a [`PeerTranscript`] of everything
//! the peer received and whether the tool closed the connection.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::{Message as WsMessage, Role};
use tokio_tungstenite::WebSocketStream;

use pbt_core::AppUuid;

use crate::protocol::{
    AppRunState, Direction, FrameAssembler, InstallStatus, Inbound, Outbound, PhoneMessage,
    PutBytesCommand, PutBytesResponse, WatchPacket,
};
use crate::transport::{Connection, Endpoint, MessageTransport, StreamFraming, StreamTransport, Transport};

/// Cookie the mock watch hands out for PutBytes transfers
pub const MOCK_COOKIE: u32 = 0x00C0_FFEE;

/// How a mock peer answers
#[derive(Debug, Clone, Default)]
pub struct MockPeer {
    /// App reported in reply to an app-state request (nil for the
    /// watchface). `None` leaves requests unanswered.
    pub running_app: Option<AppUuid>,
    /// Status code returned for an install bundle. `None` never answers.
    pub install_status: Option<u32>,
    /// PutBytes stage (`"init"`, `"put"`, `"commit"`, `"install"`) to NACK.
    pub nack_stage: Option<&'static str>,
    /// Drop the connection as soon as an app-state request arrives.
    pub hang_up_on_request: bool,
}

impl MockPeer {
    /// A peer that accepts everything and reports `app` as running.
    pub fn cooperative(app: AppUuid) -> Self {
        Self {
            running_app: Some(app),
            install_status: Some(InstallStatus::Success.code()),
            nack_stage: None,
            hang_up_on_request: false,
        }
    }

    /// A peer that never answers anything.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_install_status(mut self, code: u32) -> Self {
        self.install_status = Some(code);
        self
    }

    pub fn with_nack(mut self, stage: &'static str) -> Self {
        self.nack_stage = Some(stage);
        self
    }

    pub fn with_hang_up(mut self) -> Self {
        self.hang_up_on_request = true;
        self
    }

    fn hangs_up_after(&self, message: &Outbound) -> bool {
        self.hang_up_on_request
            && matches!(
                message,
                Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request))
            )
    }

    fn replies_to(&self, message: &Outbound) -> Vec<Inbound> {
        if self.hangs_up_after(message) {
            return Vec::new();
        }
        match message {
            Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request)) => self
                .running_app
                .map(|app| Inbound::Watch(WatchPacket::AppRunState(AppRunState::Start(app))))
                .into_iter()
                .collect(),
            Outbound::Watch(WatchPacket::PutBytes(command)) => {
                let cookie = match command {
                    PutBytesCommand::Init { .. } => MOCK_COOKIE,
                    PutBytesCommand::Put { cookie, .. }
                    | PutBytesCommand::Commit { cookie, .. }
                    | PutBytesCommand::Install { cookie }
                    | PutBytesCommand::Abort { cookie } => *cookie,
                };
                if matches!(command, PutBytesCommand::Abort { .. }) {
                    return Vec::new();
                }
                let response = if self.nack_stage == Some(command.stage()) {
                    PutBytesResponse::nack(cookie)
                } else {
                    PutBytesResponse::ack(cookie)
                };
                vec![Inbound::Watch(WatchPacket::PutBytesResponse(response))]
            }
            Outbound::Phone(PhoneMessage::InstallBundle(_)) => self
                .install_status
                .map(|code| Inbound::Phone(PhoneMessage::InstallStatus(InstallStatus::from_code(code))))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// What a mock peer saw
#[derive(Debug, Default)]
pub struct PeerTranscript {
    pub received: Vec<Outbound>,
    /// The tool closed the connection (Close frame or end of stream)
    pub closed: bool,
}

impl PeerTranscript {
    /// PutBytes commands received, in order
    pub fn put_bytes(&self) -> Vec<&PutBytesCommand> {
        self.received
            .iter()
            .filter_map(|message| match message {
                Outbound::Watch(WatchPacket::PutBytes(command)) => Some(command),
                _ => None,
            })
            .collect()
    }
}

/// A stream transport wired to a mock watch speaking raw frames.
pub fn stream_pair(peer: MockPeer) -> (StreamTransport, JoinHandle<PeerTranscript>) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let transport = StreamTransport::from_io(ours, StreamFraming::Raw);
    (transport, tokio::spawn(run_stream_peer(theirs, peer)))
}

/// A message transport wired to a mock phone.
pub async fn message_pair(peer: MockPeer) -> (MessageTransport, JoinHandle<PeerTranscript>) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let client = WebSocketStream::from_raw_socket(ours, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(theirs, Role::Server, None).await;
    (
        MessageTransport::from_stream(client),
        tokio::spawn(run_message_peer(server, peer)),
    )
}

/// [`stream_pair`] wrapped in a [`Connection`].
pub fn stream_connection(peer: MockPeer) -> (Connection, JoinHandle<PeerTranscript>) {
    let (transport, handle) = stream_pair(peer);
    let endpoint = Endpoint::Qemu("mock-watch:0".into());
    (
        Connection::from_transport(endpoint, Transport::Stream(transport)),
        handle,
    )
}

/// [`message_pair`] wrapped in a [`Connection`] to `ws://localhost:<port>/`.
pub async fn message_connection(peer: MockPeer, port: u16) -> (Connection, JoinHandle<PeerTranscript>) {
    let (transport, handle) = message_pair(peer).await;
    (
        Connection::from_transport(Endpoint::localhost(port), Transport::Message(transport)),
        handle,
    )
}

async fn run_stream_peer(mut io: DuplexStream, peer: MockPeer) -> PeerTranscript {
    let mut transcript = PeerTranscript::default();
    let mut frames = FrameAssembler::new(Direction::ToWatch);
    let mut buf = vec![0u8; 4096];

    loop {
        let n = match io.read(&mut buf).await {
            Ok(0) | Err(_) => {
                transcript.closed = true;
                break;
            }
            Ok(n) => n,
        };
        frames.push(&buf[..n]);

        while let Some(Ok(packet)) = frames.next_packet() {
            let message = Outbound::Watch(packet);
            if peer.hangs_up_after(&message) {
                transcript.received.push(message);
                return transcript;
            }
            for reply in peer.replies_to(&message) {
                if let Inbound::Watch(packet) = reply {
                    if io.write_all(&packet.to_frame()).await.is_err() {
                        return transcript;
                    }
                }
            }
            transcript.received.push(message);
        }
    }
    transcript
}

async fn run_message_peer(mut ws: WebSocketStream<DuplexStream>, peer: MockPeer) -> PeerTranscript {
    let mut transcript = PeerTranscript::default();

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Binary(data)) => {
                let Ok(message) = Outbound::from_ws_frame(&data) else {
                    continue;
                };
                if peer.hangs_up_after(&message) {
                    transcript.received.push(message);
                    return transcript;
                }
                for reply in peer.replies_to(&message) {
                    if ws.send(WsMessage::Binary(reply.to_ws_frame().into())).await.is_err() {
                        return transcript;
                    }
                }
                transcript.received.push(message);
            }
            Ok(WsMessage::Close(_)) => {
                transcript.closed = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    transcript
}
