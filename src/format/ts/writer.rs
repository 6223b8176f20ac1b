use super::muxer::{MuxerConfig, TsMuxer};
use crate::av::{Muxer, Packet};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Async adapter: drives a [`TsMuxer`] and forwards every completed packet
/// to an `AsyncWrite` (file, SRT/RTMP transport socket, pipe).
///
/// The mux itself stays synchronous; only the hand-off to the writer
/// suspends. Packets are written in emission order, which is the wire
/// order contract.
pub struct TsWriter<W: AsyncWrite + Unpin + Send> {
    muxer: TsMuxer<Vec<Bytes>>,
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> TsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, MuxerConfig::default())
    }

    pub fn with_config(writer: W, config: MuxerConfig) -> Self {
        Self {
            muxer: TsMuxer::with_config(Vec::new(), config),
            writer: BufWriter::new(writer),
        }
    }

    pub fn add_stream(&mut self, mime_type: &str) -> Result<u16> {
        self.muxer.add_stream(mime_type)
    }

    pub fn set_pcr_pid(&mut self, pid: u16) -> Result<()> {
        self.muxer.set_pcr_pid(pid)
    }

    pub fn mark_discontinuity(&mut self) {
        self.muxer.mark_discontinuity()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn flush_packets(&mut self) -> Result<()> {
        let packets = std::mem::take(self.muxer.sink_mut());
        for packet in packets {
            self.writer.write_all(&packet).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Muxer for TsWriter<W> {
    async fn write_header(&mut self) -> Result<()> {
        self.muxer.write_psi()?;
        self.flush_packets().await
    }

    async fn write_packet(&mut self, packet: Packet) -> Result<()> {
        self.muxer.write_frame(packet)?;
        self.flush_packets().await
    }

    async fn write_trailer(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::types::TS_PACKET_SIZE;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio_test::block_on;

    #[test]
    fn test_writer_output_is_packet_aligned() {
        block_on(async {
            let mut writer = TsWriter::new(Cursor::new(Vec::new()));
            let pid = writer.add_stream("video/avc").unwrap();
            writer.set_pcr_pid(pid).unwrap();

            writer.write_header().await.unwrap();

            let frame = Packet::new(vec![0u8; 500])
                .with_pts(Duration::from_millis(33))
                .with_key_flag(true);
            writer.write_packet(frame).await.unwrap();
            writer.write_trailer().await.unwrap();

            let out = writer.into_inner().into_inner();
            assert!(!out.is_empty());
            assert_eq!(out.len() % TS_PACKET_SIZE, 0);
            assert!(out.chunks(TS_PACKET_SIZE).all(|p| p[0] == 0x47));
        });
    }

    #[test]
    fn test_header_without_pcr_pid_emits_pat_only() {
        block_on(async {
            let mut writer = TsWriter::new(Cursor::new(Vec::new()));
            writer.add_stream("audio/mp4a-latm").unwrap();
            writer.write_header().await.unwrap();

            let out = writer.into_inner().into_inner();
            // One PAT packet, the PMT is withheld until a PCR PID exists.
            assert_eq!(out.len(), TS_PACKET_SIZE);
        });
    }
}
