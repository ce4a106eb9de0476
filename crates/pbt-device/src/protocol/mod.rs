//! Pebble Protocol framing and the packets this tool exchanges with a watch.
//!
//! Every packet travels in a frame of `u16 BE length | u16 BE endpoint | payload`,
//! where `length` counts payload bytes only. Only the endpoints needed for
//! installation and app-state queries are decoded; anything else surfaces as
//! [`WatchPacket::Unknown`] and is skipped by readers.
//!
//! ## Modules
//!
//! - [`putbytes`] - chunked object transfer commands and acknowledgements.
//! - [`phone`] - websocket opcodes spoken to the phone/pypkjs side.
//! - [`qemu`] - packet wrapping on the emulator's QEMU serial socket.
//! - [`crc`] - STM32-compatible CRC-32 over transferred objects.

pub mod crc;
pub mod phone;
pub mod putbytes;
pub mod qemu;

use pbt_core::prelude::*;
use pbt_core::AppUuid;

pub use phone::{InstallStatus, Inbound, Outbound, PhoneMessage};
pub use putbytes::{ObjectType, PutBytesCommand, PutBytesResponse};

/// Size of the `length | endpoint` header preceding every payload
pub const FRAME_HEADER_LEN: usize = 4;

/// Pebble Protocol endpoint identifiers
pub mod endpoint {
    pub const APP_RUN_STATE: u16 = 0x0034;
    pub const APP_LOGS: u16 = 0x07D6;
    pub const PUT_BYTES: u16 = 0xBEEF;
}

/// Which way a packet is travelling. Several endpoints reuse one id for
/// commands and their replies, so decoding depends on direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToWatch,
    FromWatch,
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

/// AppRunState endpoint messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRunState {
    /// Launch the app (to watch) or "this app is running" (from watch)
    Start(AppUuid),
    /// Stop the app (to watch) or "this app stopped" (from watch)
    Stop(AppUuid),
    /// Ask which app is in the foreground
    Request,
}

impl AppRunState {
    const START: u8 = 0x01;
    const STOP: u8 = 0x02;
    const REQUEST: u8 = 0x03;

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            AppRunState::Start(uuid) => {
                out.push(Self::START);
                out.extend_from_slice(uuid.as_bytes());
            }
            AppRunState::Stop(uuid) => {
                out.push(Self::STOP);
                out.extend_from_slice(uuid.as_bytes());
            }
            AppRunState::Request => out.push(Self::REQUEST),
        }
    }

    fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(payload);
        match reader.u8()? {
            Self::START => Ok(AppRunState::Start(reader.uuid()?)),
            Self::STOP => Ok(AppRunState::Stop(reader.uuid()?)),
            Self::REQUEST => Ok(AppRunState::Request),
            other => Err(Error::protocol(format!(
                "unknown AppRunState command {other:#04x}"
            ))),
        }
    }
}

/// A log line emitted by a watch app (`APP_LOG`). Little-endian on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLogMessage {
    pub uuid: AppUuid,
    pub timestamp: u32,
    pub level: u8,
    pub line_number: u16,
    pub filename: String,
    pub message: String,
}

impl AppLogMessage {
    const FILENAME_LEN: usize = 16;

    fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(payload);
        let uuid = reader.uuid()?;
        let timestamp = reader.u32_le()?;
        let level = reader.u8()?;
        let message_length = reader.u8()? as usize;
        let line_number = reader.u16_le()?;
        let filename = fixed_string(reader.take(Self::FILENAME_LEN)?);
        let message = fixed_string(reader.take(message_length)?);
        Ok(Self {
            uuid,
            timestamp,
            level,
            line_number,
            filename,
            message,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let message = self.message.as_bytes();
        let message = &message[..message.len().min(u8::MAX as usize)];
        let mut filename = self.filename.as_bytes().to_vec();
        filename.resize(Self::FILENAME_LEN, 0);

        out.extend_from_slice(self.uuid.as_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(self.level);
        out.push(message.len() as u8);
        out.extend_from_slice(&self.line_number.to_le_bytes());
        out.extend_from_slice(&filename);
        out.extend_from_slice(message);
    }
}

impl std::fmt::Display for AppLogMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let time = chrono::DateTime::from_timestamp(i64::from(self.timestamp), 0)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());
        write!(
            f,
            "[{time}] {}:{}> {}",
            self.filename, self.line_number, self.message
        )
    }
}

/// A decoded Pebble Protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPacket {
    AppRunState(AppRunState),
    AppLog(AppLogMessage),
    PutBytes(PutBytesCommand),
    PutBytesResponse(PutBytesResponse),
    Unknown { endpoint: u16, payload: Vec<u8> },
}

impl WatchPacket {
    pub fn endpoint(&self) -> u16 {
        match self {
            WatchPacket::AppRunState(_) => endpoint::APP_RUN_STATE,
            WatchPacket::AppLog(_) => endpoint::APP_LOGS,
            WatchPacket::PutBytes(_) | WatchPacket::PutBytesResponse(_) => endpoint::PUT_BYTES,
            WatchPacket::Unknown { endpoint, .. } => *endpoint,
        }
    }

    /// Serialize into a complete frame (header included).
    pub fn to_frame(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        match self {
            WatchPacket::AppRunState(msg) => msg.encode(&mut payload),
            WatchPacket::AppLog(msg) => msg.encode(&mut payload),
            WatchPacket::PutBytes(cmd) => cmd.encode(&mut payload),
            WatchPacket::PutBytesResponse(resp) => resp.encode(&mut payload),
            WatchPacket::Unknown { payload: raw, .. } => payload.extend_from_slice(raw),
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(&self.endpoint().to_be_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    /// Decode a payload received on `endpoint`.
    pub fn decode(endpoint: u16, payload: &[u8], direction: Direction) -> Result<Self> {
        match (endpoint, direction) {
            (endpoint::APP_RUN_STATE, _) => Ok(WatchPacket::AppRunState(AppRunState::decode(
                payload,
            )?)),
            (endpoint::APP_LOGS, Direction::FromWatch) => {
                Ok(WatchPacket::AppLog(AppLogMessage::decode(payload)?))
            }
            (endpoint::PUT_BYTES, Direction::FromWatch) => Ok(WatchPacket::PutBytesResponse(
                PutBytesResponse::decode(payload)?,
            )),
            (endpoint::PUT_BYTES, Direction::ToWatch) => {
                Ok(WatchPacket::PutBytes(PutBytesCommand::decode(payload)?))
            }
            _ => Ok(WatchPacket::Unknown {
                endpoint,
                payload: payload.to_vec(),
            }),
        }
    }

    /// Decode one complete frame (header included).
    pub fn from_frame(frame: &[u8], direction: Direction) -> Result<Self> {
        let (length, endpoint) = parse_header(frame)?;
        let payload = frame
            .get(FRAME_HEADER_LEN..FRAME_HEADER_LEN + length)
            .ok_or_else(|| {
                Error::protocol(format!(
                    "frame declares {length} payload bytes but carries {}",
                    frame.len().saturating_sub(FRAME_HEADER_LEN)
                ))
            })?;
        Self::decode(endpoint, payload, direction)
    }
}

fn parse_header(buf: &[u8]) -> Result<(usize, u16)> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(Error::protocol("frame shorter than header"));
    }
    let length = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let endpoint = u16::from_be_bytes([buf[2], buf[3]]);
    Ok((length, endpoint))
}

// ---------------------------------------------------------------------------
// Frame reassembly
// ---------------------------------------------------------------------------

/// Reassembles frames from a byte stream that may split or coalesce them.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    direction: Direction,
}

impl FrameAssembler {
    pub fn new(direction: Direction) -> Self {
        Self {
            buffer: Vec::new(),
            direction,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// A frame that fails to decode is consumed and reported so the stream
    /// stays aligned on frame boundaries.
    pub fn next_packet(&mut self) -> Option<Result<WatchPacket>> {
        let (length, endpoint) = parse_header(&self.buffer).ok()?;
        let total = FRAME_HEADER_LEN + length;
        if self.buffer.len() < total {
            return None;
        }

        let frame: Vec<u8> = self.buffer.drain(..total).collect();
        Some(WatchPacket::decode(
            endpoint,
            &frame[FRAME_HEADER_LEN..],
            self.direction,
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a payload.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.buf.get(self.pos..end).ok_or_else(|| {
            Error::protocol(format!(
                "payload truncated: wanted {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len()
            ))
        })?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn uuid(&mut self) -> Result<AppUuid> {
        let b = self.take(16)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(b);
        Ok(AppUuid::from_bytes(bytes))
    }
}

/// Decode a NUL-padded fixed-width string.
fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
