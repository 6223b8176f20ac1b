//! # Utility Functions and Types
//!
//! Low-level building blocks shared by every encoder in the crate:
//!
//! - Bit-level packing and (test-side) unpacking
//! - MPEG-2 CRC32 for PSI section checksums
//!
//! ## Bit packing
//!
//! ```rust
//! use tspack::utils::BitWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = BitWriter::with_capacity(2);
//! writer.put(0b111, 3)?;       // reserved bits
//! writer.put(0x100, 13)?;      // a 13-bit PID
//! assert_eq!(&writer.finish()?[..], &[0xE1, 0x00]);
//! # Ok(())
//! # }
//! ```

/// Bit packing and bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

// Re-export commonly used types
pub use bits::{BitReader, BitWriter};
pub use crc::Crc32Mpeg2;
