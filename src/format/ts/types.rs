use crate::error::Result;
use bytes::{BufMut, BytesMut};
use log::warn;
use std::time::Duration;

// Packet layout
pub const SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const STUFFING_BYTE: u8 = 0xFF;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_NULL: u16 = 0x1FFF;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Longest section body a single PSI section may declare (non-PAT limit,
// applied uniformly since only single-section tables are emitted).
pub const MAX_SECTION_LENGTH: usize = 1021;

// Stream IDs (PES)
pub const STREAM_ID_VIDEO_FIRST: u8 = 0xE0;
pub const STREAM_ID_AUDIO_FIRST: u8 = 0xC0;
pub const STREAM_ID_PRIVATE_1: u8 = 0xBD;

// Clocks
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;

/// Elementary stream type codes carried in the PMT, per ISO/IEC 13818-1
/// table 2-29 plus the usual ATSC/Blu-ray registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamType {
    VideoMpeg1 = 0x01,
    VideoMpeg2 = 0x02,
    AudioMpeg1 = 0x03,
    AudioMpeg2 = 0x04,
    PrivateSection = 0x05,
    PrivateData = 0x06,
    AudioAac = 0x0F,
    VideoMpeg4 = 0x10,
    AudioAacLatm = 0x11,
    Metadata = 0x15,
    VideoH264 = 0x1B,
    VideoHevc = 0x24,
    VideoCavs = 0x42,
    AudioAc3 = 0x81,
    AudioDts = 0x82,
    AudioTrueHd = 0x83,
    AudioEac3 = 0x87,
    VideoDirac = 0xD1,
    VideoVc1 = 0xEA,
}

impl StreamType {
    /// Maps an encoder MIME type to its PMT stream type.
    ///
    /// Unrecognized types (Opus included, which has no 13818-1 registration)
    /// fall back to private data rather than failing: the payload still
    /// muxes, downstream players decide compatibility.
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "video/mpeg2" => StreamType::VideoMpeg2,
            "audio/mpeg" => StreamType::AudioMpeg1,
            "audio/mp4a-latm" => StreamType::AudioAac,
            "video/mp4v-es" => StreamType::VideoMpeg4,
            "video/avc" => StreamType::VideoH264,
            "video/hevc" => StreamType::VideoHevc,
            "audio/ac3" => StreamType::AudioAc3,
            "audio/eac3" => StreamType::AudioEac3,
            _ => {
                warn!(
                    "no stream type registered for {:?}, muxing as private data",
                    mime_type
                );
                StreamType::PrivateData
            }
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_video(self) -> bool {
        matches!(
            self,
            StreamType::VideoMpeg1
                | StreamType::VideoMpeg2
                | StreamType::VideoMpeg4
                | StreamType::VideoH264
                | StreamType::VideoHevc
                | StreamType::VideoCavs
                | StreamType::VideoDirac
                | StreamType::VideoVc1
        )
    }

    pub fn is_audio(self) -> bool {
        matches!(
            self,
            StreamType::AudioMpeg1
                | StreamType::AudioMpeg2
                | StreamType::AudioAac
                | StreamType::AudioAacLatm
                | StreamType::AudioAc3
                | StreamType::AudioDts
                | StreamType::AudioTrueHd
                | StreamType::AudioEac3
        )
    }

    /// PES stream_id for this payload type (video range, audio range, or
    /// private_stream_1 for everything else).
    pub fn stream_id(self) -> u8 {
        if self.is_video() {
            STREAM_ID_VIDEO_FIRST
        } else if self.is_audio() {
            STREAM_ID_AUDIO_FIRST
        } else {
            STREAM_ID_PRIVATE_1
        }
    }
}

/// One program of the transport stream.
///
/// `pcr_pid` stays unset until the encode pipeline has picked its clock
/// source; the PMT is not streamable before that.
#[derive(Debug, Clone)]
pub struct Service {
    pub program_number: u16,
    pub pmt_pid: u16,
    pub pcr_pid: Option<u16>,
}

impl Service {
    pub fn new(program_number: u16, pmt_pid: u16) -> Self {
        Self {
            program_number,
            pmt_pid,
            pcr_pid: None,
        }
    }
}

/// One audio/video track of a service.
#[derive(Debug, Clone)]
pub struct ElementaryStream {
    pub pid: u16,
    pub mime_type: String,
    pub stream_type: StreamType,
}

impl ElementaryStream {
    pub fn new(mime_type: impl Into<String>, pid: u16) -> Self {
        let mime_type = mime_type.into();
        let stream_type = StreamType::from_mime_type(&mime_type);
        Self {
            pid,
            mime_type,
            stream_type,
        }
    }
}

/// The 4-byte transport packet header.
#[derive(Debug)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub has_adaptation_field: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TsHeader {
    fn default() -> Self {
        Self {
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: PID_NULL,
            scrambling_control: 0,
            has_adaptation_field: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TsHeader {
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(SYNC_BYTE);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1F) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xFF) as u8);

        let mut b3 = self.scrambling_control << 6;
        if self.has_adaptation_field {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0F;
        buf.put_u8(b3);

        Ok(())
    }
}

// Time conversion utilities. PCR values are packed 33-bit base (90 kHz) +
// 6 reserved bits + 9-bit extension (27 MHz remainder).
// The intermediate products exceed 64 bits well within a live session
// (27 MHz * nanoseconds), so all conversions go through u128.
pub fn time_to_pcr(time: Duration) -> u64 {
    let ts = (time.as_nanos() * PCR_HZ as u128 / 1_000_000_000) as u64;
    let base = (ts / 300) & 0x1_FFFF_FFFF;
    let ext = ts % 300;
    base << 15 | 0x3F << 9 | ext
}

pub fn pcr_to_time(pcr: u64) -> Duration {
    let base = pcr >> 15;
    let ext = pcr & 0x1FF;
    let ts = (base * 300 + ext) as u128;
    Duration::from_nanos((ts * 1_000_000_000 / PCR_HZ as u128) as u64)
}

pub fn time_to_pts(time: Duration) -> u64 {
    (time.as_nanos() * PTS_HZ as u128 / 1_000_000_000) as u64 & 0x1_FFFF_FFFF
}

pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos((pts as u128 * 1_000_000_000 / PTS_HZ as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mime_mapping() {
        assert_eq!(StreamType::from_mime_type("video/avc"), StreamType::VideoH264);
        assert_eq!(StreamType::from_mime_type("video/hevc"), StreamType::VideoHevc);
        assert_eq!(
            StreamType::from_mime_type("audio/mp4a-latm"),
            StreamType::AudioAac
        );
        assert_eq!(StreamType::from_mime_type("audio/ac3"), StreamType::AudioAc3);
        assert_eq!(StreamType::from_mime_type("audio/eac3"), StreamType::AudioEac3);
    }

    #[test]
    fn test_unknown_mime_falls_back_to_private_data() {
        assert_eq!(
            StreamType::from_mime_type("audio/opus"),
            StreamType::PrivateData
        );
        assert_eq!(
            StreamType::from_mime_type("application/x-nonsense"),
            StreamType::PrivateData
        );
        assert_eq!(StreamType::PrivateData.value(), 0x06);
    }

    #[test]
    fn test_stream_ids() {
        assert_eq!(StreamType::VideoH264.stream_id(), 0xE0);
        assert_eq!(StreamType::AudioAac.stream_id(), 0xC0);
        assert_eq!(StreamType::PrivateData.stream_id(), 0xBD);
    }

    #[test]
    fn test_header_layout() {
        let header = TsHeader {
            payload_unit_start: true,
            pid: 0x100,
            continuity_counter: 7,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x47, 0x41, 0x00, 0x17]);
    }

    #[test]
    fn test_pcr_round_trip() {
        let time = Duration::from_millis(41_237);
        let pcr = time_to_pcr(time);
        // Reserved bits between base and extension are all ones.
        assert_eq!(pcr >> 9 & 0x3F, 0x3F);
        let back = pcr_to_time(pcr);
        let diff = if back > time { back - time } else { time - back };
        assert!(diff < Duration::from_micros(1));
    }

    #[test]
    fn test_pcr_hour_scale() {
        // 27 MHz * nanoseconds leaves u64 range within minutes; the
        // conversions must stay exact over a full live session.
        let time = Duration::from_secs(3600);
        let pcr = time_to_pcr(time);
        assert_eq!(pcr >> 15, 3600 * 90_000);
        assert_eq!(pcr & 0x1FF, 0);
        assert_eq!(pcr_to_time(pcr), time);
        assert_eq!(time_to_pts(time), 3600 * 90_000);
        assert_eq!(pts_to_time(3600 * 90_000), time);
    }

    #[test]
    fn test_pts_wraps_at_33_bits() {
        let pts = time_to_pts(Duration::from_secs(2u64.pow(33) / 90_000 + 10));
        assert!(pts < 1 << 33);
    }
}
