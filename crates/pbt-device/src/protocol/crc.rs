//! CRC-32 as computed by the STM32 CRC peripheral on the watch.
//!
//! Not the zlib CRC: no reflection, no final XOR, and input is consumed as
//! little-endian 32-bit words. A trailing partial word is byte-reversed and
//! zero-padded before it is folded in.

const CRC_POLY: u32 = 0x04C1_1DB7;
const CRC_INIT: u32 = 0xFFFF_FFFF;

/// CRC of `data` as the watch firmware will compute it on commit.
pub fn stm32_crc(data: &[u8]) -> u32 {
    data.chunks(4).fold(CRC_INIT, process_word)
}

fn process_word(crc: u32, chunk: &[u8]) -> u32 {
    let word = if chunk.len() == 4 {
        u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
    } else {
        let mut padded = [0u8; 4];
        for (i, byte) in chunk.iter().rev().enumerate() {
            padded[i] = *byte;
        }
        u32::from_le_bytes(padded)
    };

    let mut crc = crc ^ word;
    for _ in 0..32 {
        crc = if crc & 0x8000_0000 != 0 {
            (crc << 1) ^ CRC_POLY
        } else {
            crc << 1
        };
    }
    crc
}
