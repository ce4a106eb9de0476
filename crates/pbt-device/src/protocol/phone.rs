//! Websocket messages exchanged with a phone or the emulator's pypkjs runtime.
//!
//! Each binary websocket frame starts with a one-byte opcode. Opcode `0x01`
//! relays a Pebble Protocol frame to the watch and `0x00` relays one back;
//! the rest are addressed to the phone itself.

use pbt_core::prelude::*;

use super::{ByteReader, Direction, WatchPacket};

mod opcode {
    pub const RELAY_FROM_WATCH: u8 = 0x00;
    pub const RELAY_TO_WATCH: u8 = 0x01;
    pub const PHONE_APP_LOG: u8 = 0x02;
    pub const PHONE_SERVER_LOG: u8 = 0x03;
    pub const INSTALL_BUNDLE: u8 = 0x04;
    pub const INSTALL_STATUS: u8 = 0x05;
    pub const CONNECTION_STATUS: u8 = 0x07;
}

/// Result code carried by an install-status reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Success,
    Failed(u32),
}

impl InstallStatus {
    const SUCCESS: u32 = 0x0000;

    pub fn from_code(code: u32) -> Self {
        if code == Self::SUCCESS {
            InstallStatus::Success
        } else {
            InstallStatus::Failed(code)
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            InstallStatus::Success => Self::SUCCESS,
            InstallStatus::Failed(code) => *code,
        }
    }
}

/// Messages addressed to or from the phone side of a websocket connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneMessage {
    /// Raw `.pbw` bundle to install
    InstallBundle(Vec<u8>),
    /// Terminal outcome of an [`PhoneMessage::InstallBundle`]
    InstallStatus(InstallStatus),
    /// Log line from the app's phone-side JavaScript
    AppLog(String),
    /// Log line from the phone runtime itself
    ServerLog(String),
    /// Whether the phone currently has a watch connected
    ConnectionStatus(bool),
    Unknown { opcode: u8, payload: Vec<u8> },
}

/// Anything that can arrive on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Watch(WatchPacket),
    Phone(PhoneMessage),
}

/// Anything that can be sent on a connection. The variant is the message
/// target: the watch (relayed on message transports) or the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Watch(WatchPacket),
    Phone(PhoneMessage),
}

impl Outbound {
    /// Encode as the payload of one binary websocket frame.
    pub fn to_ws_frame(&self) -> Vec<u8> {
        match self {
            Outbound::Watch(packet) => with_opcode(opcode::RELAY_TO_WATCH, &packet.to_frame()),
            Outbound::Phone(message) => encode_phone(message),
        }
    }

    /// Decode a websocket frame as sent by the tool (used by mock peers).
    pub fn from_ws_frame(frame: &[u8]) -> Result<Self> {
        let (&op, body) = frame
            .split_first()
            .ok_or_else(|| Error::protocol("empty websocket frame"))?;
        if op == opcode::RELAY_TO_WATCH {
            return Ok(Outbound::Watch(WatchPacket::from_frame(
                body,
                Direction::ToWatch,
            )?));
        }
        Ok(Outbound::Phone(decode_phone(op, body)?))
    }
}

impl Inbound {
    /// Decode one binary websocket frame received from the phone.
    pub fn from_ws_frame(frame: &[u8]) -> Result<Self> {
        let (&op, body) = frame
            .split_first()
            .ok_or_else(|| Error::protocol("empty websocket frame"))?;
        if op == opcode::RELAY_FROM_WATCH {
            return Ok(Inbound::Watch(WatchPacket::from_frame(
                body,
                Direction::FromWatch,
            )?));
        }
        Ok(Inbound::Phone(decode_phone(op, body)?))
    }

    /// Encode as the phone would send it (used by mock peers).
    pub fn to_ws_frame(&self) -> Vec<u8> {
        match self {
            Inbound::Watch(packet) => with_opcode(opcode::RELAY_FROM_WATCH, &packet.to_frame()),
            Inbound::Phone(message) => encode_phone(message),
        }
    }
}

fn with_opcode(op: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(op);
    frame.extend_from_slice(body);
    frame
}

fn encode_phone(message: &PhoneMessage) -> Vec<u8> {
    match message {
        PhoneMessage::InstallBundle(bundle) => with_opcode(opcode::INSTALL_BUNDLE, bundle),
        PhoneMessage::InstallStatus(status) => {
            with_opcode(opcode::INSTALL_STATUS, &status.code().to_be_bytes())
        }
        PhoneMessage::AppLog(line) => with_opcode(opcode::PHONE_APP_LOG, line.as_bytes()),
        PhoneMessage::ServerLog(line) => with_opcode(opcode::PHONE_SERVER_LOG, line.as_bytes()),
        PhoneMessage::ConnectionStatus(connected) => {
            with_opcode(opcode::CONNECTION_STATUS, &[if *connected { 0xFF } else { 0x00 }])
        }
        PhoneMessage::Unknown { opcode, payload } => with_opcode(*opcode, payload),
    }
}

fn decode_phone(op: u8, body: &[u8]) -> Result<PhoneMessage> {
    Ok(match op {
        opcode::INSTALL_BUNDLE => PhoneMessage::InstallBundle(body.to_vec()),
        opcode::INSTALL_STATUS => {
            PhoneMessage::InstallStatus(InstallStatus::from_code(ByteReader::new(body).u32_be()?))
        }
        opcode::PHONE_APP_LOG => PhoneMessage::AppLog(String::from_utf8_lossy(body).into_owned()),
        opcode::PHONE_SERVER_LOG => {
            PhoneMessage::ServerLog(String::from_utf8_lossy(body).into_owned())
        }
        opcode::CONNECTION_STATUS => {
            PhoneMessage::ConnectionStatus(ByteReader::new(body).u8()? != 0)
        }
        _ => PhoneMessage::Unknown {
            opcode: op,
            payload: body.to_vec(),
        },
    })
}
