//! Packet wrapping used on the emulator's QEMU serial socket.
//!
//! `0xFEED | protocol u16 | length u16 | payload | 0xBEEF`, all big-endian.
//! Pebble Protocol bytes travel as protocol 1 (SPP) and may be split across
//! or share packets, so payloads are fed into a [`super::FrameAssembler`].

const HEADER: u16 = 0xFEED;
const FOOTER: u16 = 0xBEEF;
const HEADER_LEN: usize = 6;
const FOOTER_LEN: usize = 2;

/// QEMU channel carrying Pebble Protocol traffic
pub const PROTOCOL_SPP: u16 = 1;

/// Largest payload a single QEMU packet may carry
pub const MAX_PAYLOAD: usize = 2048;

/// Wrap `payload` for `protocol`. Payloads larger than [`MAX_PAYLOAD`] are
/// split across several packets.
pub fn wrap(protocol: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + HEADER_LEN + FOOTER_LEN);
    for chunk in payload.chunks(MAX_PAYLOAD) {
        out.extend_from_slice(&HEADER.to_be_bytes());
        out.extend_from_slice(&protocol.to_be_bytes());
        out.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(&FOOTER.to_be_bytes());
    }
    out
}

/// Extracts QEMU packets from a byte stream, resynchronising on the header
/// after garbage or a bad footer.
#[derive(Debug, Default)]
pub struct QemuUnwrapper {
    buffer: Vec<u8>,
}

impl QemuUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete `(protocol, payload)` packet.
    pub fn next_packet(&mut self) -> Option<(u16, Vec<u8>)> {
        loop {
            let start = self
                .buffer
                .windows(2)
                .position(|w| w == HEADER.to_be_bytes())?;
            if start > 0 {
                tracing::trace!("QEMU: discarding {} bytes before header", start);
                self.buffer.drain(..start);
            }
            if self.buffer.len() < HEADER_LEN {
                return None;
            }

            let protocol = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
            let length = u16::from_be_bytes([self.buffer[4], self.buffer[5]]) as usize;
            let total = HEADER_LEN + length + FOOTER_LEN;
            if self.buffer.len() < total {
                return None;
            }

            let footer = u16::from_be_bytes([self.buffer[total - 2], self.buffer[total - 1]]);
            if footer != FOOTER {
                tracing::debug!("QEMU: bad footer {:#06x}, resynchronising", footer);
                self.buffer.drain(..2);
                continue;
            }

            let packet: Vec<u8> = self.buffer.drain(..total).collect();
            return Some((protocol, packet[HEADER_LEN..HEADER_LEN + length].to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_layout() {
        let out = wrap(PROTOCOL_SPP, &[0xAB]);
        assert_eq!(out, vec![0xFE, 0xED, 0x00, 0x01, 0x00, 0x01, 0xAB, 0xBE, 0xEF]);
    }

    #[test]
    fn test_wrap_splits_large_payloads() {
        let payload = vec![0u8; MAX_PAYLOAD + 10];
        let mut unwrapper = QemuUnwrapper::new();
        unwrapper.push(&wrap(PROTOCOL_SPP, &payload));

        assert_eq!(unwrapper.next_packet().unwrap().1.len(), MAX_PAYLOAD);
        assert_eq!(unwrapper.next_packet().unwrap().1.len(), 10);
        assert!(unwrapper.next_packet().is_none());
    }

    #[test]
    fn test_unwrap_skips_leading_garbage() {
        let mut unwrapper = QemuUnwrapper::new();
        unwrapper.push(&[0x00, 0x13]);
        unwrapper.push(&wrap(3, b"hi"));
        assert_eq!(unwrapper.next_packet(), Some((3, b"hi".to_vec())));
    }

    #[test]
    fn test_unwrap_waits_for_complete_packet() {
        let packet = wrap(PROTOCOL_SPP, b"abc");
        let mut unwrapper = QemuUnwrapper::new();
        unwrapper.push(&packet[..5]);
        assert!(unwrapper.next_packet().is_none());
        unwrapper.push(&packet[5..]);
        assert_eq!(unwrapper.next_packet(), Some((PROTOCOL_SPP, b"abc".to_vec())));
    }

    #[test]
    fn test_unwrap_resyncs_after_bad_footer() {
        let mut bad = wrap(PROTOCOL_SPP, b"x");
        let last = bad.len() - 1;
        bad[last] = 0x00;
        let mut unwrapper = QemuUnwrapper::new();
        unwrapper.push(&bad);
        unwrapper.push(&wrap(PROTOCOL_SPP, b"y"));
        assert_eq!(unwrapper.next_packet(), Some((PROTOCOL_SPP, b"y".to_vec())));
    }
}
