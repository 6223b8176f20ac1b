use super::types::{
    ElementaryStream, Service, MAX_SECTION_LENGTH, TABLE_ID_PAT, TABLE_ID_PMT,
};
use crate::error::{MuxError, Result};
use crate::utils::{BitWriter, Crc32Mpeg2};
use bytes::{BufMut, Bytes, BytesMut};

/// The section envelope shared by every PSI table: pointer field, table id,
/// section length, versioning bytes and the trailing CRC32.
///
/// Table-specific content arrives as an opaque payload; PAT and PMT below
/// are payload builders over this single encoder (only two table variants
/// exist here, a type hierarchy would buy nothing).
#[derive(Debug, Clone)]
pub struct PsiSection {
    pub table_id: u8,
    /// Transport stream id for the PAT, program number for the PMT.
    pub table_id_ext: u16,
    /// 5-bit table version, bumped (mod 32) when the described structure
    /// changes.
    pub version: u8,
    pub private: bool,
    pub current_next: bool,
}

impl PsiSection {
    /// Frames `payload` into a complete single section, pointer field
    /// through CRC.
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes> {
        // table_id_ext + version byte + section numbers, then the CRC.
        let section_length = payload.len() + 5 + 4;
        if section_length > MAX_SECTION_LENGTH {
            return Err(MuxError::SectionTooLarge(format!(
                "section length {} exceeds {} (table id {:#04x})",
                section_length, MAX_SECTION_LENGTH, self.table_id
            )));
        }

        let mut buf = BytesMut::with_capacity(4 + section_length);

        buf.put_u8(0); // pointer field, section starts at the next byte
        buf.put_u8(self.table_id);

        // section_syntax_indicator, private bit, '11' reserved, then the
        // 12-bit length (its two top bits are '00' by the size check above).
        let mut b12 = 0x8000 | 0x3000 | section_length as u16;
        if self.private {
            b12 |= 0x4000;
        }
        buf.put_u16(b12);

        buf.put_u16(self.table_id_ext);
        buf.put_u8(0xC0 | (self.version & 0x1F) << 1 | self.current_next as u8);
        buf.put_u8(0); // section_number
        buf.put_u8(0); // last_section_number, single-section tables only

        buf.put_slice(payload);

        // CRC covers table_id through the end of the payload; the pointer
        // field stays outside.
        let crc = Crc32Mpeg2::calculate(&buf[1..]);
        buf.put_u32(crc);

        Ok(buf.freeze())
    }
}

#[derive(Debug, Clone)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Program association table: one 32-bit record per program.
#[derive(Debug, Clone, Default)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub entries: Vec<PatEntry>,
}

impl Pat {
    fn payload(&self) -> Result<Bytes> {
        let mut writer = BitWriter::with_capacity(self.entries.len() * 4);
        for entry in &self.entries {
            writer.put(entry.program_number as u64, 16)?;
            writer.put(0b111, 3)?; // reserved
            writer.put(entry.pmt_pid as u64, 13)?;
        }
        writer.finish()
    }

    pub fn encode(&self, version: u8) -> Result<Bytes> {
        PsiSection {
            table_id: TABLE_ID_PAT,
            table_id_ext: self.transport_stream_id,
            version,
            private: false,
            current_next: true,
        }
        .encode(&self.payload()?)
    }
}

/// Program map table payload builder for one service.
#[derive(Debug, Clone, Copy)]
pub struct Pmt<'a> {
    pub service: &'a Service,
    pub streams: &'a [ElementaryStream],
}

impl Pmt<'_> {
    fn payload(&self, pcr_pid: u16) -> Result<Bytes> {
        let mut writer = BitWriter::with_capacity(4 + 5 * self.streams.len());

        writer.put(0b111, 3)?; // reserved
        writer.put(pcr_pid as u64, 13)?;

        writer.put(0b1111, 4)?; // reserved
        writer.put(0, 2)?; // top bits of program_info_length shall be '00'
        writer.put(0, 10)?; // program_info_length, no descriptors

        for stream in self.streams {
            writer.put(stream.stream_type.value() as u64, 8)?;
            writer.put(0b111, 3)?; // reserved
            writer.put(stream.pid as u64, 13)?;
            writer.put(0b1111, 4)?; // reserved
            writer.put(0, 2)?; // top bits of ES_info_length shall be '00'
            writer.put(0, 10)?; // ES_info_length, no descriptors
        }

        writer.finish()
    }

    /// Encodes the table, or `None` while the service has no PCR PID yet:
    /// the service is not streamable before the clock source is known, so
    /// there is nothing valid to announce.
    pub fn encode(&self, version: u8) -> Result<Option<Bytes>> {
        let Some(pcr_pid) = self.service.pcr_pid else {
            return Ok(None);
        };

        let section = PsiSection {
            table_id: TABLE_ID_PMT,
            table_id_ext: self.service.program_number,
            version,
            private: false,
            current_next: true,
        }
        .encode(&self.payload(pcr_pid)?)?;

        Ok(Some(section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pat_section_layout() {
        let pat = Pat {
            transport_stream_id: 1,
            entries: vec![PatEntry {
                program_number: 1,
                pmt_pid: 0x100,
            }],
        };
        let section = pat.encode(0).unwrap();

        let expected_head = [
            0x00, // pointer field
            0x00, // table id (PAT)
            0xB0, 0x0D, // syntax = 1, length = 13
            0x00, 0x01, // transport stream id
            0xC1, // reserved, version 0, current
            0x00, 0x00, // section numbers
            0x00, 0x01, // program number
            0xE1, 0x00, // '111' + PMT PID 0x100
        ];
        assert_eq!(&section[..expected_head.len()], &expected_head);
        assert_eq!(section.len(), expected_head.len() + 4);

        let crc = Crc32Mpeg2::calculate(&section[1..section.len() - 4]);
        assert_eq!(&section[section.len() - 4..], &crc.to_be_bytes());
    }

    #[test]
    fn test_version_and_current_next_byte() {
        let pat = Pat {
            transport_stream_id: 0,
            entries: vec![],
        };
        let section = pat.encode(5).unwrap();
        assert_eq!(section[6], 0xC0 | 5 << 1 | 1);
    }

    #[test]
    fn test_empty_pat_still_encodes() {
        let pat = Pat::default();
        let section = pat.encode(0).unwrap();
        // header + CRC only
        assert_eq!(section.len(), 1 + 3 + 5 + 4);
    }

    #[test]
    fn test_section_too_large() {
        let section = PsiSection {
            table_id: TABLE_ID_PMT,
            table_id_ext: 1,
            version: 0,
            private: false,
            current_next: true,
        };
        let payload = vec![0u8; MAX_SECTION_LENGTH - 8];
        assert!(matches!(
            section.encode(&payload),
            Err(MuxError::SectionTooLarge(_))
        ));
        let payload = vec![0u8; MAX_SECTION_LENGTH - 9];
        assert!(section.encode(&payload).is_ok());
    }

    #[test]
    fn test_pmt_gated_on_pcr_pid() {
        let mut service = Service::new(1, 0x1000);
        let streams = [ElementaryStream::new("video/avc", 0x100)];
        let pmt = Pmt {
            service: &service,
            streams: &streams,
        };
        assert!(pmt.encode(0).unwrap().is_none());

        service.pcr_pid = Some(0x100);
        let pmt = Pmt {
            service: &service,
            streams: &streams,
        };
        assert!(pmt.encode(0).unwrap().is_some());
    }

    #[test]
    fn test_pmt_stream_records() {
        let mut service = Service::new(3, 0x1000);
        service.pcr_pid = Some(0x100);
        let streams = [
            ElementaryStream::new("video/avc", 0x100),
            ElementaryStream::new("audio/mp4a-latm", 0x101),
        ];
        let section = Pmt {
            service: &service,
            streams: &streams,
        }
        .encode(2)
        .unwrap()
        .unwrap();

        assert_eq!(section[1], 0x02); // table id (PMT)
        assert_eq!(&section[4..6], &[0x00, 0x03]); // program number
        // PCR PID and empty program info loop
        assert_eq!(&section[9..13], &[0xE1, 0x00, 0xF0, 0x00]);
        // H.264 record then AAC record
        assert_eq!(&section[13..18], &[0x1B, 0xE1, 0x00, 0xF0, 0x00]);
        assert_eq!(&section[18..23], &[0x0F, 0xE1, 0x01, 0xF0, 0x00]);
    }
}
