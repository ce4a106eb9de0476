//! Websocket message transport to a phone or the emulator's pypkjs runtime.
//!
//! ```text
//! MessageTransport                 background task
//!   send()  ──── cmd chan ────▶  websocket write
//!   read_message() ◀─ inbound ─  websocket read → Inbound::from_ws_frame
//! ```
//!
//! The task owns the socket. Closing the transport sends a Close frame and
//! waits for the task to finish, so nothing is left holding the peer's
//! connection slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use pbt_core::prelude::*;

use super::{forward_inbound, inbound_channel, recv_matching};
use crate::protocol::{Inbound, Outbound};

/// Capacity of the command channel
const CMD_CHANNEL_CAPACITY: usize = 32;

/// Messages from the public API to the background task.
enum TransportCommand {
    /// Write one binary frame and report the outcome on `ack_tx`.
    Send {
        frame: Vec<u8>,
        ack_tx: oneshot::Sender<Result<()>>,
    },
    /// Send a Close frame and stop.
    Disconnect,
}

/// A connection that frames discrete messages over a websocket
pub struct MessageTransport {
    cmd_tx: mpsc::Sender<TransportCommand>,
    inbound_rx: mpsc::Receiver<Inbound>,
    task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl MessageTransport {
    /// Connect to the websocket at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("failed to connect to {url}: {e}")))?;
        debug!("Websocket connected to {}", url);
        Ok(Self::from_stream(ws_stream))
    }

    /// Take over an established websocket and start its I/O task.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = inbound_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(run_io_loop(
            ws_stream,
            cmd_rx,
            inbound_tx,
            Arc::clone(&connected),
        ));

        Self {
            cmd_tx,
            inbound_rx,
            task: Some(task),
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send one message and wait until it has been written to the socket.
    pub async fn send(&mut self, message: Outbound) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(TransportCommand::Send {
                frame: message.to_ws_frame(),
                ack_tx,
            })
            .await
            .map_err(|_| Error::connection("websocket is closed"))?;

        ack_rx
            .await
            .map_err(|_| Error::connection("websocket closed before the message was sent"))?
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

    /// Send a Close frame and wait for the I/O task to exit.
    pub async fn close(&mut self) {
        // The task may already be gone; that is the state we want anyway.
        let _ = self.cmd_tx.send(TransportCommand::Disconnect).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for MessageTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_io_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut cmd_rx: mpsc::Receiver<TransportCommand>,
    inbound_tx: mpsc::Sender<Inbound>,
    connected: Arc<AtomicBool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_sink, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_read.next() => {
                match frame {
                    Some(Ok(WsMessage::Binary(data))) => match Inbound::from_ws_frame(&data) {
                        Ok(message) => {
                            if !forward_inbound(&inbound_tx, message) {
                                debug!("Websocket: inbound receiver dropped");
                            }
                        }
                        Err(e) => debug!("Websocket: ignoring undecodable frame: {}", e),
                    },
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("Websocket: received Close frame");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Text/Ping/Pong carry nothing for us
                    }
                    Some(Err(e)) => {
                        warn!("Websocket: read error: {}", e);
                        break;
                    }
                    None => {
                        debug!("Websocket: stream ended");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TransportCommand::Send { frame, ack_tx }) => {
                        trace!("Websocket: sending {} byte frame", frame.len());
                        let result = ws_sink
                            .send(WsMessage::Binary(frame.into()))
                            .await
                            .map_err(|e| Error::connection(format!("websocket send failed: {e}")));
                        let _ = ack_tx.send(result);
                    }
                    Some(TransportCommand::Disconnect) | None => {
                        let _ = ws_sink.send(WsMessage::Close(None)).await;
                        let _ = ws_sink.close().await;
                        break;
                    }
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
}
