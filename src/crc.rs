//! CRC-16/XMODEM (polynomial 0x1021, no reflection, no final XOR).
//!
//! NuFX uses the same polynomial everywhere with two seeds:
//!   - `0x0000` for the master header and record headers,
//!   - `0xFFFF` for version-3 thread data.

pub const HEADER_SEED: u16 = 0x0000;
pub const THREAD_SEED: u16 = 0xFFFF;

const POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continue a CRC over `data` starting from `seed`.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &b| {
        (crc << 8) ^ TABLE[(((crc >> 8) as u8) ^ b) as usize]
    })
}
