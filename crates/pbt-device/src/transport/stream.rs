//! Byte-stream transport: a serial device or an emulator's QEMU socket.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pbt_core::prelude::*;

use super::{forward_inbound, inbound_channel, recv_matching};
use crate::protocol::qemu::{self, QemuUnwrapper};
use crate::protocol::{Direction, FrameAssembler, Inbound, Outbound};

const READ_BUFFER_SIZE: usize = 4096;

/// How Pebble Protocol frames are carried on the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// Frames written as-is (Bluetooth serial)
    Raw,
    /// Frames wrapped in QEMU packets on the SPP channel
    Qemu,
}

/// A connection over a continuous byte stream.
///
/// Carries only watch packets; phone-addressed messages have nowhere to go
/// and are rejected on send.
pub struct StreamTransport {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    framing: StreamFraming,
    inbound_rx: mpsc::Receiver<Inbound>,
    reader_task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl StreamTransport {
    /// Open a serial device node for reading and writing.
    pub async fn open_serial(path: &Path) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| Error::connection(format!("cannot open {}: {e}", path.display())))?;
        debug!("Opened serial device {}", path.display());
        Ok(Self::from_io(file, StreamFraming::Raw))
    }

    /// Connect to an emulator's QEMU serial socket at `host:port`.
    pub async fn connect_qemu(addr: &str) -> Result<Self> {
        let socket = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(|e| Error::connection(format!("cannot connect to QEMU at {addr}: {e}")))?;
        debug!("Connected to QEMU at {}", addr);
        Ok(Self::from_io(socket, StreamFraming::Qemu))
    }

    /// Wrap any bidirectional byte stream and start its reader task.
    pub fn from_io<S>(io: S, framing: StreamFraming) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        let (inbound_tx, inbound_rx) = inbound_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let reader_task = tokio::spawn(run_reader(
            reader,
            framing,
            inbound_tx,
            Arc::clone(&connected),
        ));

        Self {
            writer: Box::new(writer),
            framing,
            inbound_rx,
            reader_task: Some(reader_task),
            connected,
        }
    }

    pub fn framing(&self) -> StreamFraming {
        self.framing
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Write one watch packet to the stream.
    pub async fn send(&mut self, message: Outbound) -> Result<()> {
        let packet = match message {
            Outbound::Watch(packet) => packet,
            Outbound::Phone(other) => {
                return Err(Error::protocol(format!(
                    "{other:?} cannot be sent over a serial connection"
                )))
            }
        };

        let frame = packet.to_frame();
        let bytes = match self.framing {
            StreamFraming::Raw => frame,
            StreamFraming::Qemu => qemu::wrap(qemu::PROTOCOL_SPP, &frame),
        };

        trace!("Stream: writing {} bytes", bytes.len());
        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| Error::connection(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::connection(format!("flush failed: {e}")))
    }

    pub async fn read_message<T, F>(&mut self, what: &str, timeout: Duration, matcher: F) -> Result<T>
    where
        F: FnMut(&Inbound) -> Option<T>,
    {
        recv_matching(&mut self.inbound_rx, what, timeout, matcher).await
    }

    /// Receive the next inbound message, or `None` once the peer has gone.
    pub async fn next_message(&mut self) -> Option<Inbound> {
        self.inbound_rx.recv().await
    }

    /// Shut down the write side and stop the reader task.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
        if let Some(task) = self.reader_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

async fn run_reader<R>(
    mut reader: R,
    framing: StreamFraming,
    inbound_tx: mpsc::Sender<Inbound>,
    connected: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut frames = FrameAssembler::new(Direction::FromWatch);
    let mut unwrapper = QemuUnwrapper::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Stream: peer closed the connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Stream: read error: {}", e);
                break;
            }
        };

        match framing {
            StreamFraming::Raw => frames.push(&buf[..n]),
            StreamFraming::Qemu => {
                unwrapper.push(&buf[..n]);
                while let Some((protocol, payload)) = unwrapper.next_packet() {
                    if protocol == qemu::PROTOCOL_SPP {
                        frames.push(&payload);
                    } else {
                        trace!("Stream: ignoring QEMU protocol {}", protocol);
                    }
                }
            }
        }

        if !drain_frames(&mut frames, &inbound_tx) {
            debug!("Stream: inbound receiver dropped, stopping reader");
            break;
        }
    }

    connected.store(false, Ordering::SeqCst);
}

/// Forward every complete frame. Returns `false` once nobody is listening.
fn drain_frames(frames: &mut FrameAssembler, inbound_tx: &mpsc::Sender<Inbound>) -> bool {
    while let Some(decoded) = frames.next_packet() {
        match decoded {
            Ok(packet) => {
                if !forward_inbound(inbound_tx, Inbound::Watch(packet)) {
                    return false;
                }
            }
            Err(e) => debug!("Stream: skipping undecodable frame: {}", e),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AppRunState, PhoneMessage, WatchPacket};
    use pbt_core::AppUuid;

    fn app_state(message: &Inbound) -> Option<AppRunState> {
        match message {
            Inbound::Watch(WatchPacket::AppRunState(state)) => Some(state.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_raw_frames_are_written_unwrapped() {
        let (ours, mut theirs) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Raw);

        transport
            .send(Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request)))
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x00, 0x01, 0x00, 0x34, 0x03]);
    }

    #[tokio::test]
    async fn test_qemu_frames_are_wrapped() {
        let (ours, mut theirs) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Qemu);

        transport
            .send(Outbound::Watch(WatchPacket::AppRunState(AppRunState::Request)))
            .await
            .unwrap();

        let mut buf = [0u8; 13];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..6], &[0xFE, 0xED, 0x00, 0x01, 0x00, 0x05]);
        assert_eq!(&buf[11..], &[0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_reads_frame_split_across_writes() {
        let (ours, mut theirs) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Raw);

        let uuid = AppUuid::from_u128(0x1234);
        let frame = WatchPacket::AppRunState(AppRunState::Start(uuid)).to_frame();
        theirs.write_all(&frame[..3]).await.unwrap();
        theirs.write_all(&frame[3..]).await.unwrap();

        let state = transport
            .read_message("app state", Duration::from_secs(1), app_state)
            .await
            .unwrap();
        assert_eq!(state, AppRunState::Start(uuid));
    }

    #[tokio::test]
    async fn test_qemu_reader_unwraps_spp_packets() {
        let (ours, mut theirs) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Qemu);

        let frame = WatchPacket::AppRunState(AppRunState::Start(AppUuid::nil())).to_frame();
        theirs.write_all(&qemu::wrap(9, b"noise")).await.unwrap();
        theirs
            .write_all(&qemu::wrap(qemu::PROTOCOL_SPP, &frame))
            .await
            .unwrap();

        let state = transport
            .read_message("app state", Duration::from_secs(1), app_state)
            .await
            .unwrap();
        assert_eq!(state, AppRunState::Start(AppUuid::nil()));
    }

    #[tokio::test]
    async fn test_phone_messages_are_rejected() {
        let (ours, _theirs) = tokio::io::duplex(64);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Raw);
        let err = transport
            .send(Outbound::Phone(PhoneMessage::InstallBundle(vec![1])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_peer_close_is_a_connection_error() {
        let (ours, theirs) = tokio::io::duplex(64);
        let mut transport = StreamTransport::from_io(ours, StreamFraming::Raw);
        drop(theirs);

        let err = transport
            .read_message("app state", Duration::from_secs(5), app_state)
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(!transport.is_connected());
    }
}
