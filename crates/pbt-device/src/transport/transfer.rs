//! PutBytes object transfer over a [`StreamTransport`].

use std::time::Duration;

use pbt_core::prelude::*;

use super::StreamTransport;
use crate::protocol::crc::stm32_crc;
use crate::protocol::{Inbound, ObjectType, Outbound, PutBytesCommand, PutBytesResponse, WatchPacket};

/// Largest `Put` payload sent in one packet
pub const PUT_BYTES_CHUNK_SIZE: usize = 2000;

/// How long the watch has to acknowledge each PutBytes command
pub const PUT_BYTES_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Progress of a transfer, reported after every acknowledged chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes in the chunk just acknowledged
    pub sent: usize,
    /// Bytes acknowledged so far
    pub total_sent: usize,
    /// Size of the whole object
    pub total_size: usize,
}

impl TransferProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.total_sent as f64 / self.total_size as f64
        }
    }
}

impl StreamTransport {
    /// Transfer `payload` to the watch as a file object named `name`, then
    /// ask the watch to install it.
    ///
    /// `on_progress` runs inline after each acknowledged chunk. A NACK or a
    /// missing acknowledgement at any stage ends the transfer; once the
    /// watch has issued a cookie, an abort is sent on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] for an empty payload (nothing is sent) or
    /// any failure during the exchange.
    pub async fn transfer_bytes<F>(&mut self, name: &str, payload: &[u8], mut on_progress: F) -> Result<()>
    where
        F: FnMut(TransferProgress),
    {
        if payload.is_empty() {
            return Err(Error::transfer(format!("{name} is empty")));
        }
        let object_size = u32::try_from(payload.len())
            .map_err(|_| Error::transfer(format!("{name} is too large to transfer")))?;

        let cookie = self
            .put_bytes(PutBytesCommand::Init {
                object_size,
                object_type: ObjectType::File,
                bank: 0,
                filename: name.to_string(),
            })
            .await?;
        debug!("PutBytes: {} ({} bytes) accepted with cookie {:#x}", name, object_size, cookie);

        match self.send_object(cookie, payload, &mut on_progress).await {
            Ok(()) => {
                info!("PutBytes: transferred {} ({} bytes)", name, payload.len());
                Ok(())
            }
            Err(e) => {
                warn!("PutBytes: aborting transfer of {}: {}", name, e);
                let abort = PutBytesCommand::Abort { cookie };
                let _ = self.send(Outbound::Watch(WatchPacket::PutBytes(abort))).await;
                Err(e)
            }
        }
    }

    async fn send_object<F>(&mut self, cookie: u32, payload: &[u8], on_progress: &mut F) -> Result<()>
    where
        F: FnMut(TransferProgress),
    {
        let mut total_sent = 0;
        for chunk in payload.chunks(PUT_BYTES_CHUNK_SIZE) {
            self.put_bytes(PutBytesCommand::Put {
                cookie,
                payload: chunk.to_vec(),
            })
            .await?;
            total_sent += chunk.len();
            on_progress(TransferProgress {
                sent: chunk.len(),
                total_sent,
                total_size: payload.len(),
            });
        }

        self.put_bytes(PutBytesCommand::Commit {
            cookie,
            object_crc: stm32_crc(payload),
        })
        .await?;
        self.put_bytes(PutBytesCommand::Install { cookie }).await?;
        Ok(())
    }

    /// Send one command and wait for its acknowledgement. Returns the cookie
    /// carried by the ACK.
    async fn put_bytes(&mut self, command: PutBytesCommand) -> Result<u32> {
        let stage = command.stage();
        self.send(Outbound::Watch(WatchPacket::PutBytes(command)))
            .await
            .map_err(|e| Error::transfer(format!("sending PutBytes {stage} failed: {e}")))?;

        let response = self
            .read_message("PutBytes acknowledgement", PUT_BYTES_ACK_TIMEOUT, put_bytes_response)
            .await
            .map_err(|e| Error::transfer(format!("PutBytes {stage}: {e}")))?;

        if !response.ack {
            return Err(Error::transfer(format!("watch rejected PutBytes {stage}")));
        }
        Ok(response.cookie)
    }
}

fn put_bytes_response(message: &Inbound) -> Option<PutBytesResponse> {
    match message {
        Inbound::Watch(WatchPacket::PutBytesResponse(response)) => Some(*response),
        _ => None,
    }
}
