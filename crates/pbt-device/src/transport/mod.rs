//! Connections to a watch, phone, or emulator.
//!
//! A [`Connection`] owns exactly one [`Transport`], chosen from the
//! [`Endpoint`] when the connection is opened:
//!
//! - [`StreamTransport`] - a byte stream (serial device or QEMU socket)
//!   carrying Pebble Protocol frames, with PutBytes chunked transfer.
//! - [`MessageTransport`] - a websocket to a phone or pypkjs, carrying
//!   discrete opcode-tagged messages.
//!
//! Both transports run a background reader that decodes inbound traffic into
//! a channel, so a caller can wait for a specific reply with an upper time
//! bound and still notice the peer going away during the wait. The only
//! errors a connection raises are [`Error::Connection`] and [`Error::Timeout`]
//! (plus [`Error::Transfer`] from a stream transfer).

mod stream;
mod transfer;
mod websocket;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use pbt_core::prelude::*;

use crate::protocol::{Inbound, Outbound};

pub use stream::{StreamFraming, StreamTransport};
pub use transfer::{TransferProgress, PUT_BYTES_ACK_TIMEOUT, PUT_BYTES_CHUNK_SIZE};
pub use websocket::MessageTransport;

/// Capacity of the inbound message channel. Inbound traffic beyond this
/// while nobody is reading is dropped with a warning.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Websocket URL of a phone or pypkjs (`ws://host:port/`)
    Websocket(String),
    /// Serial device node (e.g., `/dev/rfcomm0`)
    Serial(PathBuf),
    /// QEMU serial socket (`host:port`)
    Qemu(String),
}

impl Endpoint {
    /// Websocket endpoint of a runtime listening on this machine
    pub fn localhost(port: u16) -> Self {
        Endpoint::Websocket(format!("ws://localhost:{port}/"))
    }

    /// Websocket endpoint of the developer connection on a phone
    pub fn phone(host: &str, port: u16) -> Self {
        Endpoint::Websocket(format!("ws://{host}:{port}/"))
    }

    /// Transport kind this endpoint will be opened with
    pub fn kind(&self) -> TransportKind {
        match self {
            Endpoint::Websocket(_) => TransportKind::Message,
            Endpoint::Serial(_) | Endpoint::Qemu(_) => TransportKind::Stream,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Websocket(url) => write!(f, "{url}"),
            Endpoint::Serial(path) => write!(f, "serial:{}", path.display()),
            Endpoint::Qemu(addr) => write!(f, "qemu:{addr}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stream,
    Message,
}

/// The channel a [`Connection`] talks over. Fixed for the connection's lifetime.
pub enum Transport {
    Stream(StreamTransport),
    Message(MessageTransport),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Stream(_) => TransportKind::Stream,
            Transport::Message(_) => TransportKind::Message,
        }
    }
}

/// An open connection to a watch, phone or emulator
pub struct Connection {
    endpoint: Endpoint,
    transport: Transport,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("kind", &self.kind())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Connection {
    /// Open a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint is unreachable.
    pub async fn open(endpoint: Endpoint) -> Result<Self> {
        info!("Connecting to {}", endpoint);
        let transport = match &endpoint {
            Endpoint::Websocket(url) => Transport::Message(MessageTransport::connect(url).await?),
            Endpoint::Serial(path) => Transport::Stream(StreamTransport::open_serial(path).await?),
            Endpoint::Qemu(addr) => Transport::Stream(StreamTransport::connect_qemu(addr).await?),
        };
        Ok(Self {
            endpoint,
            transport,
        })
    }

    /// Wrap an already-established transport.
    pub fn from_transport(endpoint: Endpoint, transport: Transport) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Access the transport for kind-specific operations.
    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Whether the peer is still connected
    pub fn is_connected(&self) -> bool {
        match &self.transport {
            Transport::Stream(stream) => stream.is_connected(),
            Transport::Message(message) => message.is_connected(),
        }
    }

    /// Send one message to its target.
    pub async fn send_message(&mut self, message: Outbound) -> Result<()> {
        match &mut self.transport {
            Transport::Stream(stream) => stream.send(message).await,
            Transport::Message(ws) => ws.send(message).await,
        }
    }

    /// Wait up to `timeout` for an inbound message accepted by `matcher`.
    ///
    /// Messages the matcher rejects are discarded. `what` names the awaited
    /// reply in the timeout error.
    pub async fn read_message<T, F>(&mut self, what: &str, timeout: Duration, matcher: F) -> Result<T>
    where
        F: FnMut(&Inbound) -> Option<T>,
    {
        match &mut self.transport {
            Transport::Stream(stream) => stream.read_message(what, timeout, matcher).await,
            Transport::Message(ws) => ws.read_message(what, timeout, matcher).await,
        }
    }

    /// Wait for the next inbound message with no time bound. `None` means
    /// the peer has gone away.
    pub async fn next_message(&mut self) -> Option<Inbound> {
        match &mut self.transport {
            Transport::Stream(stream) => stream.next_message().await,
            Transport::Message(ws) => ws.next_message().await,
        }
    }

    /// Send `message` and wait for the matching reply.
    pub async fn send_and_read<T, F>(
        &mut self,
        message: Outbound,
        what: &str,
        timeout: Duration,
        matcher: F,
    ) -> Result<T>
    where
        F: FnMut(&Inbound) -> Option<T>,
    {
        self.send_message(message).await?;
        self.read_message(what, timeout, matcher).await
    }

    /// Close the connection and wait for its background I/O to stop.
    pub async fn close(&mut self) {
        debug!("Closing connection to {}", self.endpoint);
        match &mut self.transport {
            Transport::Stream(stream) => stream.close().await,
            Transport::Message(ws) => ws.close().await,
        }
    }
}

/// Shared receive loop: wait for a message accepted by `matcher`, skipping
/// the rest, until `timeout` elapses or the reader task goes away.
async fn recv_matching<T, F>(
    inbound_rx: &mut mpsc::Receiver<Inbound>,
    what: &str,
    timeout: Duration,
    mut matcher: F,
) -> Result<T>
where
    F: FnMut(&Inbound) -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, inbound_rx.recv()).await {
            Err(_) => {
                debug!("Gave up waiting for {} after {:?}", what, timeout);
                return Err(Error::timeout(what, timeout));
            }
            Ok(None) => {
                return Err(Error::connection(format!(
                    "connection closed while waiting for {what}"
                )))
            }
            Ok(Some(message)) => {
                if let Some(value) = matcher(&message) {
                    return Ok(value);
                }
                trace!("Skipping {:?} while waiting for {}", message, what);
            }
        }
    }
}

/// Forward a decoded message to the reader channel without blocking the
/// I/O loop. Returns `false` once the receiving side is gone.
fn forward_inbound(inbound_tx: &mpsc::Sender<Inbound>, message: Inbound) -> bool {
    match inbound_tx.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("Inbound channel full, dropping {:?}", dropped);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn inbound_channel() -> (mpsc::Sender<Inbound>, mpsc::Receiver<Inbound>) {
    mpsc::channel(INBOUND_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PhoneMessage, WatchPacket};

    #[test]
    fn test_endpoint_kind() {
        assert_eq!(Endpoint::localhost(9000).kind(), TransportKind::Message);
        assert_eq!(
            Endpoint::Serial(PathBuf::from("/dev/rfcomm0")).kind(),
            TransportKind::Stream
        );
        assert_eq!(
            Endpoint::Qemu("localhost:12344".into()).kind(),
            TransportKind::Stream
        );
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::localhost(9000).to_string(), "ws://localhost:9000/");
        assert_eq!(
            Endpoint::phone("192.168.1.20", 9000).to_string(),
            "ws://192.168.1.20:9000/"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_matching_skips_unmatched_messages() {
        let (tx, mut rx) = inbound_channel();
        tx.send(Inbound::Phone(PhoneMessage::AppLog("hello".into())))
            .await
            .unwrap();
        tx.send(Inbound::Phone(PhoneMessage::ConnectionStatus(true)))
            .await
            .unwrap();

        let connected = recv_matching(&mut rx, "status", Duration::from_secs(1), |m| match m {
            Inbound::Phone(PhoneMessage::ConnectionStatus(c)) => Some(*c),
            _ => None,
        })
        .await
        .unwrap();
        assert!(connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_matching_times_out() {
        let (_tx, mut rx) = inbound_channel();
        let err = recv_matching(&mut rx, "reply", Duration::from_secs(5), |_| Some(()))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_recv_matching_reports_closed_channel() {
        let (tx, mut rx) = inbound_channel();
        drop(tx);
        let err = recv_matching(&mut rx, "reply", Duration::from_secs(5), |_| Some(()))
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_forward_inbound_reports_closed_receiver() {
        let (tx, rx) = inbound_channel();
        drop(rx);
        let message = Inbound::Watch(WatchPacket::Unknown {
            endpoint: 1,
            payload: vec![],
        });
        assert!(!forward_inbound(&tx, message));
    }
}
