//! PutBytes: the watch's chunked object transfer sub-protocol.
//!
//! A transfer is `Init` (watch replies with a cookie), one `Put` per chunk,
//! `Commit` with the object CRC, then `Install`. Every command is answered by
//! a [`PutBytesResponse`]; a NACK at any step ends the transfer.

use pbt_core::prelude::*;

use super::ByteReader;

/// Kind of object being transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Firmware = 0x01,
    Recovery = 0x02,
    SystemResources = 0x03,
    AppResources = 0x04,
    AppExecutable = 0x05,
    File = 0x06,
    Worker = 0x07,
}

impl ObjectType {
    fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x01 => ObjectType::Firmware,
            0x02 => ObjectType::Recovery,
            0x03 => ObjectType::SystemResources,
            0x04 => ObjectType::AppResources,
            0x05 => ObjectType::AppExecutable,
            0x06 => ObjectType::File,
            0x07 => ObjectType::Worker,
            other => {
                return Err(Error::protocol(format!(
                    "unknown PutBytes object type {other:#04x}"
                )))
            }
        })
    }
}

/// Commands sent to the watch on the PutBytes endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutBytesCommand {
    Init {
        object_size: u32,
        object_type: ObjectType,
        bank: u8,
        filename: String,
    },
    Put {
        cookie: u32,
        payload: Vec<u8>,
    },
    Commit {
        cookie: u32,
        object_crc: u32,
    },
    Abort {
        cookie: u32,
    },
    Install {
        cookie: u32,
    },
}

impl PutBytesCommand {
    const INIT: u8 = 0x01;
    const PUT: u8 = 0x02;
    const COMMIT: u8 = 0x03;
    const ABORT: u8 = 0x04;
    const INSTALL: u8 = 0x05;

    /// Short name for logs and error messages
    pub fn stage(&self) -> &'static str {
        match self {
            PutBytesCommand::Init { .. } => "init",
            PutBytesCommand::Put { .. } => "put",
            PutBytesCommand::Commit { .. } => "commit",
            PutBytesCommand::Abort { .. } => "abort",
            PutBytesCommand::Install { .. } => "install",
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        match self {
            PutBytesCommand::Init {
                object_size,
                object_type,
                bank,
                filename,
            } => {
                out.push(Self::INIT);
                out.extend_from_slice(&object_size.to_be_bytes());
                out.push(*object_type as u8);
                out.push(*bank);
                out.extend_from_slice(filename.as_bytes());
                out.push(0);
            }
            PutBytesCommand::Put { cookie, payload } => {
                out.push(Self::PUT);
                out.extend_from_slice(&cookie.to_be_bytes());
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
            }
            PutBytesCommand::Commit { cookie, object_crc } => {
                out.push(Self::COMMIT);
                out.extend_from_slice(&cookie.to_be_bytes());
                out.extend_from_slice(&object_crc.to_be_bytes());
            }
            PutBytesCommand::Abort { cookie } => {
                out.push(Self::ABORT);
                out.extend_from_slice(&cookie.to_be_bytes());
            }
            PutBytesCommand::Install { cookie } => {
                out.push(Self::INSTALL);
                out.extend_from_slice(&cookie.to_be_bytes());
            }
        }
    }

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(payload);
        match reader.u8()? {
            Self::INIT => {
                let object_size = reader.u32_be()?;
                let object_type = ObjectType::from_byte(reader.u8()?)?;
                let bank = reader.u8()?;
                let rest = reader.rest();
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                Ok(PutBytesCommand::Init {
                    object_size,
                    object_type,
                    bank,
                    filename: String::from_utf8_lossy(&rest[..end]).into_owned(),
                })
            }
            Self::PUT => {
                let cookie = reader.u32_be()?;
                let len = reader.u32_be()? as usize;
                Ok(PutBytesCommand::Put {
                    cookie,
                    payload: reader.take(len)?.to_vec(),
                })
            }
            Self::COMMIT => Ok(PutBytesCommand::Commit {
                cookie: reader.u32_be()?,
                object_crc: reader.u32_be()?,
            }),
            Self::ABORT => Ok(PutBytesCommand::Abort {
                cookie: reader.u32_be()?,
            }),
            Self::INSTALL => Ok(PutBytesCommand::Install {
                cookie: reader.u32_be()?,
            }),
            other => Err(Error::protocol(format!(
                "unknown PutBytes command {other:#04x}"
            ))),
        }
    }
}

/// Watch reply to any [`PutBytesCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutBytesResponse {
    pub ack: bool,
    pub cookie: u32,
}

impl PutBytesResponse {
    const ACK: u8 = 0x01;
    const NACK: u8 = 0x02;

    pub fn ack(cookie: u32) -> Self {
        Self { ack: true, cookie }
    }

    pub fn nack(cookie: u32) -> Self {
        Self { ack: false, cookie }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(if self.ack { Self::ACK } else { Self::NACK });
        out.extend_from_slice(&self.cookie.to_be_bytes());
    }

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(payload);
        let ack = match reader.u8()? {
            Self::ACK => true,
            Self::NACK => false,
            other => {
                return Err(Error::protocol(format!(
                    "unknown PutBytes result {other:#04x}"
                )))
            }
        };
        Ok(Self {
            ack,
            cookie: reader.u32_be()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Direction, WatchPacket};

    #[test]
    fn test_init_wire_layout() {
        let cmd = PutBytesCommand::Init {
            object_size: 0x0102,
            object_type: ObjectType::File,
            bank: 0,
            filename: "a.pbw".to_string(),
        };
        let mut out = Vec::new();
        cmd.encode(&mut out);
        assert_eq!(
            out,
            vec![0x01, 0x00, 0x00, 0x01, 0x02, 0x06, 0x00, b'a', b'.', b'p', b'b', b'w', 0x00]
        );
        assert_eq!(PutBytesCommand::decode(&out).unwrap(), cmd);
    }

    #[test]
    fn test_put_declares_payload_length() {
        let frame = WatchPacket::PutBytes(PutBytesCommand::Put {
            cookie: 7,
            payload: vec![1, 2, 3],
        })
        .to_frame();
        // header(4) + command(1) + cookie(4) + length(4) + payload(3)
        assert_eq!(frame.len(), 16);
        assert_eq!(&frame[9..13], &[0, 0, 0, 3]);
    }

    #[test]
    fn test_response_nack_decodes() {
        let frame = [0x00, 0x05, 0xBE, 0xEF, 0x02, 0x00, 0x00, 0x00, 0x09];
        let packet = WatchPacket::from_frame(&frame, Direction::FromWatch).unwrap();
        assert_eq!(
            packet,
            WatchPacket::PutBytesResponse(PutBytesResponse::nack(9))
        );
    }

    #[test]
    fn test_unknown_result_byte_is_rejected() {
        assert!(PutBytesResponse::decode(&[0x03, 0, 0, 0, 1]).is_err());
    }
}
