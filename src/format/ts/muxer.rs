use super::adaptation::AdaptationField;
use super::pes::PesPacket;
use super::psi::{Pat, PatEntry, Pmt};
use super::types::{
    ElementaryStream, Service, TsHeader, PID_NULL, PID_PAT, TS_PACKET_SIZE, TS_PAYLOAD_SIZE,
};
use crate::av::Packet;
use crate::error::{MuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};
use std::collections::HashMap;
use std::time::Duration;

/// Consumer of completed 188-byte packets.
///
/// Packets arrive in emission order and must reach the wire in that order;
/// the muxer keeps no copy after delivery. Implemented for `Vec<Bytes>`
/// (in-memory collection) and for closures through [`SinkFn`].
pub trait MuxOutputSink {
    fn on_packet(&mut self, packet: Bytes) -> Result<()>;
}

/// Adapter turning a closure (or channel-sender wrapper) into a sink.
pub struct SinkFn<F>(pub F);

impl<F> MuxOutputSink for SinkFn<F>
where
    F: FnMut(Bytes) -> Result<()>,
{
    fn on_packet(&mut self, packet: Bytes) -> Result<()> {
        (self.0)(packet)
    }
}

impl MuxOutputSink for Vec<Bytes> {
    fn on_packet(&mut self, packet: Bytes) -> Result<()> {
        self.push(packet);
        Ok(())
    }
}

/// Muxer configuration, consumed from the streaming pipeline setup.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    pub transport_stream_id: u16,
    pub program_number: u16,
    pub pmt_pid: u16,
    /// PID handed to the first added stream; later streams count up from it.
    pub first_elementary_pid: u16,
    /// How often the PCR PID carries a clock reference.
    pub pcr_interval: Duration,
    /// PSI re-announcement interval, so demuxers can join mid-stream.
    pub psi_interval: Duration,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            transport_stream_id: 0,
            program_number: 1,
            pmt_pid: 0x1000,
            first_elementary_pid: 0x100,
            pcr_interval: Duration::from_millis(40),
            psi_interval: Duration::from_millis(100),
        }
    }
}

/// MPEG-TS multiplexer: converts framed payloads (PES packets, PSI
/// sections) into 188-byte transport packets pushed to a [`MuxOutputSink`].
///
/// The encode path is synchronous and single-producer; each call performs
/// one in-memory transformation and emits zero or more packets before
/// returning. Per-PID continuity counters and table versions live here and
/// are touched only through these entry points.
pub struct TsMuxer<S: MuxOutputSink> {
    sink: S,
    config: MuxerConfig,
    service: Service,
    streams: Vec<ElementaryStream>,
    pat: Pat,
    continuity_counters: HashMap<u16, u8>,
    pat_version: u8,
    pmt_version: u8,
    psi_dirty: bool,
    last_psi: Option<Duration>,
    last_pcr_write: Option<Duration>,
    current_time: Option<Duration>,
    pending_discontinuity: bool,
}

impl<S: MuxOutputSink> TsMuxer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, MuxerConfig::default())
    }

    pub fn with_config(sink: S, config: MuxerConfig) -> Self {
        let service = Service::new(config.program_number, config.pmt_pid);
        let pat = Pat {
            transport_stream_id: config.transport_stream_id,
            entries: vec![PatEntry {
                program_number: config.program_number,
                pmt_pid: config.pmt_pid,
            }],
        };
        Self {
            sink,
            config,
            service,
            streams: Vec::new(),
            pat,
            continuity_counters: HashMap::new(),
            pat_version: 0,
            pmt_version: 0,
            psi_dirty: true,
            last_psi: None,
            last_pcr_write: None,
            current_time: None,
            pending_discontinuity: false,
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn streams(&self) -> &[ElementaryStream] {
        &self.streams
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Registers a track, allocating the next free elementary PID.
    /// Returns the PID. The PMT version is bumped; the new table goes out
    /// with the next PSI write.
    pub fn add_stream(&mut self, mime_type: &str) -> Result<u16> {
        let mut pid = self.config.first_elementary_pid + self.streams.len() as u16;
        while self.streams.iter().any(|s| s.pid == pid) {
            pid += 1;
        }
        self.add_stream_with_pid(mime_type, pid)?;
        Ok(pid)
    }

    /// Registers a track on an explicit PID.
    pub fn add_stream_with_pid(&mut self, mime_type: &str, pid: u16) -> Result<()> {
        if pid == PID_PAT || pid == self.service.pmt_pid || pid >= PID_NULL {
            return Err(MuxError::InvalidData(format!(
                "PID {:#06x} is reserved",
                pid
            )));
        }
        if self.streams.iter().any(|s| s.pid == pid) {
            return Err(MuxError::InvalidData(format!(
                "PID {:#06x} already in use",
                pid
            )));
        }
        self.streams.push(ElementaryStream::new(mime_type, pid));
        self.bump_pmt_version();
        Ok(())
    }

    /// Removes a track. The PID's continuity counter is kept in case the
    /// PID is reused.
    pub fn remove_stream(&mut self, pid: u16) -> Result<()> {
        let before = self.streams.len();
        self.streams.retain(|s| s.pid != pid);
        if self.streams.len() == before {
            return Err(MuxError::InvalidData(format!(
                "no stream on PID {:#06x}",
                pid
            )));
        }
        if self.service.pcr_pid == Some(pid) {
            self.service.pcr_pid = None;
        }
        self.bump_pmt_version();
        Ok(())
    }

    /// Assigns the program clock source. Must name a registered stream.
    pub fn set_pcr_pid(&mut self, pid: u16) -> Result<()> {
        if !self.streams.iter().any(|s| s.pid == pid) {
            return Err(MuxError::InvalidData(format!(
                "PCR PID {:#06x} is not a registered stream",
                pid
            )));
        }
        if self.service.pcr_pid != Some(pid) {
            self.service.pcr_pid = Some(pid);
            self.bump_pmt_version();
        }
        Ok(())
    }

    /// Flags the next emitted packet of the PCR PID with a discontinuity
    /// indicator (encoder restart, clock jump).
    pub fn mark_discontinuity(&mut self) {
        self.pending_discontinuity = true;
    }

    fn bump_pmt_version(&mut self) {
        self.pmt_version = (self.pmt_version + 1) & 0x1F;
        self.psi_dirty = true;
        debug!("PMT version -> {}", self.pmt_version);
    }

    /// Reads the continuity counter for `pid`, post-incrementing (mod 16)
    /// only when the packet actually carries payload bytes.
    fn continuity_counter(&mut self, pid: u16, carries_payload: bool) -> u8 {
        let counter = self.continuity_counters.entry(pid).or_insert(0);
        let current = *counter;
        if carries_payload {
            *counter = (current + 1) & 0x0F;
        }
        current
    }

    /// Segments one payload (PES packet or PSI section) into 188-byte
    /// transport packets on `pid`, pushing each to the sink in order.
    ///
    /// The first packet sets payload_unit_start and carries the requested
    /// adaptation field, if any. Short packets are padded through
    /// adaptation-field stuffing, never by padding the payload itself. An
    /// empty payload still emits one packet.
    pub fn packetize(
        &mut self,
        pid: u16,
        payload: &[u8],
        adaptation: Option<AdaptationField>,
    ) -> Result<()> {
        let mut offset = 0usize;
        let mut first = true;
        let mut emitted = 0usize;

        while first || offset < payload.len() {
            let mut field = if first {
                adaptation.clone().unwrap_or_default()
            } else {
                AdaptationField::new()
            };
            let mut field_present = first && !field.is_empty();

            let remaining = payload.len() - offset;
            let mut body = TS_PAYLOAD_SIZE - if field_present { field.size() } else { 0 };

            if remaining < body {
                // The gap between payload and packet body is absorbed by
                // adaptation-field stuffing.
                field_present = true;
                field.stuff_to(TS_PAYLOAD_SIZE - remaining);
                body = remaining;
            }

            let header = TsHeader {
                payload_unit_start: first,
                pid,
                has_adaptation_field: field_present,
                contains_payload: body > 0,
                continuity_counter: self.continuity_counter(pid, body > 0),
                ..Default::default()
            };

            let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
            header.write_to(&mut buf)?;
            if field_present {
                buf.put_slice(&field.encode()?);
            }
            buf.put_slice(&payload[offset..offset + body]);
            debug_assert_eq!(buf.len(), TS_PACKET_SIZE);

            self.sink.on_packet(buf.freeze())?;

            offset += body;
            first = false;
            emitted += 1;
        }

        trace!(
            "packetized {} bytes on PID {:#06x} into {} packets",
            payload.len(),
            pid,
            emitted
        );
        Ok(())
    }

    /// Emits the PAT on PID 0.
    pub fn write_pat(&mut self) -> Result<()> {
        let section = self.pat.encode(self.pat_version)?;
        trace!("PAT v{} ({} bytes)", self.pat_version, section.len());
        self.packetize(PID_PAT, &section, None)
    }

    /// Emits the PMT, a no-op while the PCR PID is unassigned. Returns
    /// whether a table went out.
    pub fn write_pmt(&mut self) -> Result<bool> {
        let pmt = Pmt {
            service: &self.service,
            streams: &self.streams,
        };
        let Some(section) = pmt.encode(self.pmt_version)? else {
            return Ok(false);
        };
        trace!("PMT v{} ({} bytes)", self.pmt_version, section.len());
        let pmt_pid = self.service.pmt_pid;
        self.packetize(pmt_pid, &section, None)?;
        Ok(true)
    }

    /// Emits both tables and resets the re-announcement clock.
    pub fn write_psi(&mut self) -> Result<()> {
        self.write_pat()?;
        let announced = self.write_pmt()?;
        self.last_psi = self.current_time;
        if announced {
            self.psi_dirty = false;
        }
        Ok(())
    }

    fn psi_due(&self) -> bool {
        if self.psi_dirty {
            return true;
        }
        match (self.last_psi, self.current_time) {
            (Some(last), Some(now)) => now >= last + self.config.psi_interval,
            (None, _) => true,
            _ => false,
        }
    }

    fn pcr_due(&self) -> bool {
        match (self.last_pcr_write, self.current_time) {
            (Some(last), Some(now)) => now >= last + self.config.pcr_interval,
            (None, _) => true,
            // A PCR went out but no timestamp is known yet.
            (Some(_), None) => false,
        }
    }

    /// Muxes one encoded access unit: PES framing, PCR/random-access
    /// adaptation flags, then packetization. Re-announces PSI when due.
    pub fn write_frame(&mut self, frame: Packet) -> Result<()> {
        let stream = self
            .streams
            .get(frame.stream_index)
            .cloned()
            .ok_or_else(|| {
                MuxError::InvalidData(format!("unknown stream index {}", frame.stream_index))
            })?;

        if let Some(pts) = frame.pts {
            if let Some(current) = self.current_time {
                if pts < current && self.service.pcr_pid == Some(stream.pid) {
                    debug!("PCR regression on PID {:#06x}, marking discontinuity", stream.pid);
                    self.mark_discontinuity();
                }
            }
            self.current_time = Some(pts);
        }

        if self.psi_due() {
            self.write_psi()?;
        }

        let mut pes = PesPacket::new(stream.stream_type.stream_id(), frame.data.clone());
        if let Some(pts) = frame.pts {
            pes = pes.with_pts(pts);
            if let Some(dts) = frame.dts {
                if dts != pts {
                    pes = pes.with_dts(dts);
                }
            }
        }
        if !stream.stream_type.is_video() {
            pes = pes.bounded();
        }
        let framed = pes.encode()?;

        let mut field = AdaptationField::new();
        if frame.is_key {
            field.random_access = true;
        }
        let is_pcr_pid = self.service.pcr_pid == Some(stream.pid);
        if is_pcr_pid {
            if self.pending_discontinuity {
                field.discontinuity = true;
                self.pending_discontinuity = false;
            }
            if self.pcr_due() {
                if let Some(now) = self.current_time {
                    field.pcr = Some(now);
                    self.last_pcr_write = Some(now);
                }
            }
        }

        let adaptation = if field.is_empty() { None } else { Some(field) };
        self.packetize(stream.pid, &framed, adaptation)
    }
}
