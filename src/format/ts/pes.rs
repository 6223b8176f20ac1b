use super::types::time_to_pts;
use crate::error::{MuxError, Result};
use crate::utils::BitWriter;
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

/// Packetized Elementary Stream header.
///
/// Framing around one access unit before TS packetization: start code,
/// stream id, packet length and the optional PTS/DTS fields with their
/// mandated marker-bit layout.
#[derive(Debug, Clone)]
pub struct PesHeader {
    /// Stream identifier (0xE0.. video range, 0xC0.. audio range).
    pub stream_id: u8,
    /// Payloads of known length carry it; video streams use the unbounded
    /// convention (0).
    pub bounded_length: bool,
    pub data_alignment: bool,
    /// Presentation timestamp, 33-bit 90 kHz ticks.
    pub pts: Option<u64>,
    /// Decoding timestamp. Only valid together with a PTS.
    pub dts: Option<u64>,
}

impl PesHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            bounded_length: false,
            data_alignment: true,
            pts: None,
            dts: None,
        }
    }

    fn header_data_length(&self) -> Result<u8> {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => Ok(10),
            (Some(_), None) => Ok(5),
            (None, None) => Ok(0),
            (None, Some(_)) => Err(MuxError::InvalidData(
                "PES DTS without PTS".into(),
            )),
        }
    }

    fn write_to(&self, buf: &mut BytesMut, payload_len: usize) -> Result<()> {
        let header_data_length = self.header_data_length()?;

        // Start code prefix
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(0x01);

        buf.put_u8(self.stream_id);

        // PES_packet_length counts everything after this field. 0 means
        // unbounded, also the fallback when the payload cannot be expressed
        // in 16 bits.
        let total = 3 + header_data_length as usize + payload_len;
        let packet_length = if self.bounded_length && total <= u16::MAX as usize {
            total as u16
        } else {
            0
        };
        buf.put_u16(packet_length);

        // '10' marker, scrambling '00', priority, alignment, copyright,
        // original.
        let mut flags = 0x80;
        if self.data_alignment {
            flags |= 0x04;
        }
        buf.put_u8(flags);

        let pts_dts_flags = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0b11,
            (Some(_), None) => 0b10,
            _ => 0b00,
        };
        buf.put_u8(pts_dts_flags << 6);

        buf.put_u8(header_data_length);

        if let Some(pts) = self.pts {
            let marker = if self.dts.is_some() { 0b0011 } else { 0b0010 };
            buf.put_slice(&encode_timestamp(marker, pts)?);
        }
        if let Some(dts) = self.dts {
            buf.put_slice(&encode_timestamp(0b0001, dts)?);
        }

        Ok(())
    }
}

/// One framed access unit: PES header plus payload.
#[derive(Debug, Clone)]
pub struct PesPacket {
    pub header: PesHeader,
    pub payload: Bytes,
}

impl PesPacket {
    pub fn new(stream_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            header: PesHeader::new(stream_id),
            payload: payload.into(),
        }
    }

    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.header.pts = Some(time_to_pts(pts));
        self
    }

    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.header.dts = Some(time_to_pts(dts));
        self
    }

    /// Marks the packet length as known up front (audio streams).
    pub fn bounded(mut self) -> Self {
        self.header.bounded_length = true;
        self
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        self.header.write_to(buf, self.payload.len())?;
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Total framed length in bytes.
    pub fn len(&self) -> usize {
        9 + (if self.header.pts.is_some() { 5 } else { 0 })
            + (if self.header.dts.is_some() { 5 } else { 0 })
            + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the 9-byte header is always present
    }

    /// Encodes the complete framed packet.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.len());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// 5-byte timestamp field: 4-bit marker, then the 33-bit value in groups of
/// 3, 15 and 15 bits, each group followed by a marker bit.
fn encode_timestamp(marker: u8, ts: u64) -> Result<Bytes> {
    let ts = ts & 0x1_FFFF_FFFF;

    let mut writer = BitWriter::with_capacity(5);
    writer.put(marker as u64, 4)?;
    writer.put(ts >> 30, 3)?;
    writer.put_bit(true)?;
    writer.put(ts >> 15, 15)?;
    writer.put_bit(true)?;
    writer.put(ts, 15)?;
    writer.put_bit(true)?;
    writer.finish()
}
