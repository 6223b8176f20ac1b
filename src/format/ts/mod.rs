//! # MPEG Transport Stream (TS) multiplexing
//!
//! Converts timestamped encoded access units into 188-byte transport
//! packets per ITU-T H.222.0 / ISO/IEC 13818-1:
//!
//! - PSI tables (PAT, PMT) with versioning and CRC32
//! - PES framing with PTS/DTS timestamp fields
//! - Adaptation fields: PCR insertion, event flags, stuffing
//! - Per-PID continuity counters
//!
//! ## Example
//!
//! ```rust
//! use tspack::format::ts::{TsMuxer, TS_PACKET_SIZE};
//! use tspack::av::Packet;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut muxer = TsMuxer::new(Vec::new());
//!
//! let video_pid = muxer.add_stream("video/avc")?;
//! muxer.add_stream("audio/mp4a-latm")?;
//! muxer.set_pcr_pid(video_pid)?;
//!
//! let frame = Packet::new(vec![0u8; 1024])
//!     .with_pts(Duration::from_millis(33))
//!     .with_key_flag(true);
//! muxer.write_frame(frame)?;
//!
//! for packet in muxer.into_sink() {
//!     assert_eq!(packet.len(), TS_PACKET_SIZE);
//! }
//! # Ok(())
//! # }
//! ```

/// Adaptation field encoding (PCR, flags, stuffing)
pub mod adaptation;

/// TS muxer core: segmentation, continuity counters, output sink
pub mod muxer;

/// PES packet framing
pub mod pes;

/// PSI tables: section envelope, PAT and PMT
pub mod psi;

/// Core TS types and constants
pub mod types;

/// Async write adapter over the muxer
pub mod writer;

// Re-export commonly used types and constants
pub use adaptation::AdaptationField;
pub use muxer::{MuxOutputSink, MuxerConfig, SinkFn, TsMuxer};
pub use pes::{PesHeader, PesPacket};
pub use psi::{Pat, PatEntry, Pmt, PsiSection};
pub use types::{
    ElementaryStream, Service, StreamType, TsHeader, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE,
    TS_PAYLOAD_SIZE,
};
pub use writer::TsWriter;
