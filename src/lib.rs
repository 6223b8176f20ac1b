#![doc(html_root_url = "https://docs.rs/tspack/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tspack - MPEG transport-stream multiplexer
//!
//! `tspack` is the container layer of a live-streaming pipeline: it takes
//! timestamped, hardware-encoded access units (H.264/HEVC video, AAC and
//! friends for audio), frames them as PES packets, and segments everything
//! into the 188-byte transport packets that SRT and broadcast tooling
//! expect, PSI tables included.
//!
//! ## Features
//!
//! - PAT/PMT generation with automatic versioning and MPEG-2 CRC32
//! - PES framing with exact PTS/DTS marker-bit layout
//! - Adaptation fields: PCR insertion on the clock PID, random-access and
//!   discontinuity flags, 0xFF stuffing (packets are never zero-padded)
//! - Per-PID continuity counters, independent per elementary stream
//! - A synchronous core pushing to a caller-supplied sink, plus an async
//!   [`format::ts::TsWriter`] adapter for `AsyncWrite` transports
//!
//! ## Quick start
//!
//! ```rust
//! use tspack::av::Packet;
//! use tspack::format::ts::TsMuxer;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut muxer = TsMuxer::new(Vec::new());
//! let video = muxer.add_stream("video/avc")?;
//! muxer.set_pcr_pid(video)?;
//!
//! muxer.write_frame(
//!     Packet::new(vec![0u8; 4096])
//!         .with_pts(Duration::ZERO)
//!         .with_key_flag(true),
//! )?;
//!
//! // Every emitted packet is exactly 188 bytes, sync byte first.
//! assert!(muxer.into_sink().iter().all(|p| p.len() == 188 && p[0] == 0x47));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! - `av`: access-unit type and the muxer trait seam to the encode side
//! - `format`: container implementations (TS)
//! - `error`: error types and the crate `Result` alias
//! - `utils`: bit packing and CRC32/MPEG-2

/// Access-unit types and the muxer trait seam
pub mod av;

/// Error types and utilities
pub mod error;

/// Container format implementations
pub mod format;

/// Bit packing and checksum utilities
pub mod utils;

pub use error::{MuxError, Result};
