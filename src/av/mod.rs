use async_trait::async_trait;

/// Common trait for container muxers driven by an encode pipeline.
///
/// The capture/encode side calls `write_header` once the stream layout is
/// known, then `write_packet` once per encoded access unit, in decode order.
#[async_trait]
pub trait Muxer: Send {
    /// Write stream layout information (for TS: the PSI tables).
    async fn write_header(&mut self) -> crate::Result<()>;

    /// Write one encoded access unit.
    async fn write_packet(&mut self, packet: Packet) -> crate::Result<()>;

    /// Flush anything buffered at end of stream.
    async fn write_trailer(&mut self) -> crate::Result<()>;
}

mod packet;
pub use packet::*;
