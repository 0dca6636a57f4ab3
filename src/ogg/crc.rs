//! CRC-32 used by the Ogg page header.
//!
//! Ogg uses polynomial 0x04C11DB7 with no bit reflection, zero initial value
//! and zero final XOR, which rules out the common zlib CRC.

const POLYNOMIAL: u32 = 0x04C1_1DB7;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 0x8000_0000 != 0 {
                (value << 1) ^ POLYNOMIAL
            } else {
                value << 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Computes the Ogg page checksum over `data`.
///
/// The caller must zero the four checksum bytes in the page header before
/// computing, then patch the result back in.
pub(crate) fn checksum(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc = (crc << 8) ^ TABLE[(((crc >> 24) as u8) ^ byte) as usize];
    }
    crc
}
