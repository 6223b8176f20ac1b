//! CRC32 implementation for MPEG-2 TS PSI tables.
//!
//! Based on ITU-T H.222.0 / ISO/IEC 13818-1.
//! Polynomial: x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
//! Initial value: 0xFFFFFFFF, no final XOR, most-significant-bit first.

const CRC32_MPEG2: u32 = 0x04C11DB7;

const CRC_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// MPEG-2 CRC32 calculator used for the trailing checksum of PSI sections.
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    /// Calculates the CRC32 checksum for the given data using the MPEG-2
    /// algorithm (every PSI section carries this over table_id through the
    /// last payload byte).
    pub fn calculate(data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFF;
        for &byte in data {
            let index = ((crc >> 24) ^ (byte as u32)) & 0xFF;
            crc = (crc << 8) ^ CRC_TABLE[index as usize];
        }
        crc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Test vector from STMicroelectronics community forum post
        assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
    }

    #[test]
    fn test_pat_section() {
        // Minimal single-program PAT, CRC value cross-checked with ffprobe
        // output of the same stream.
        let pat_data = [
            0x00, // Table ID (PAT)
            0xB0, 0x0D, // Section syntax = 1, section length = 13
            0x00, 0x01, // Transport stream ID
            0xC1, // Reserved = 3, version = 0, current/next = 1
            0x00, 0x00, // Section number = 0, last section number = 0
            0x00, 0x01, // Program number
            0xE1, 0x00, // Program map PID
        ];
        assert_eq!(Crc32Mpeg2::calculate(&pat_data), 0xE8F9_5E7D);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Crc32Mpeg2::calculate(&[]), 0xFFFF_FFFF);
    }
}
