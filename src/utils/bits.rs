use crate::error::{MuxError, Result};
use bytes::Bytes;

/// A bit-level writer for assembling binary protocol structures.
///
/// Every TS structure in this crate (PSI payloads, adaptation fields, PES
/// optional headers) is byte-aligned at completion but built from fields that
/// are not byte-wide, so the writer tracks a bit cursor and packs values
/// most-significant-bit first.
///
/// Example:
/// ```
/// use tspack::utils::BitWriter;
///
/// let mut writer = BitWriter::with_capacity(2);
/// writer.put(0b101, 3).unwrap();
/// writer.put(0b10011, 5).unwrap();
/// writer.put(0xAB, 8).unwrap();
/// assert_eq!(&writer.finish().unwrap()[..], &[0b10110011, 0xAB]);
/// ```
pub struct BitWriter {
    data: Vec<u8>,
    bit_offset: usize,
}

impl BitWriter {
    /// Creates a writer with a fixed capacity of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            data: vec![0u8; capacity],
            bit_offset: 0,
        }
    }

    /// Appends the low `width` bits of `value`, most-significant-bit first.
    ///
    /// Returns `MuxError::Overflow` if the write would exceed the allocated
    /// capacity and `MuxError::InvalidData` for widths over 64.
    pub fn put(&mut self, value: u64, width: u32) -> Result<()> {
        if width > 64 {
            return Err(MuxError::InvalidData(format!(
                "bit width {} exceeds 64",
                width
            )));
        }
        if self.bit_offset + width as usize > self.data.len() * 8 {
            return Err(MuxError::Overflow(format!(
                "write of {} bits at bit {} exceeds {}-byte buffer",
                width,
                self.bit_offset,
                self.data.len()
            )));
        }

        for i in (0..width).rev() {
            if (value >> i) & 1 == 1 {
                self.data[self.bit_offset / 8] |= 1 << (7 - (self.bit_offset % 8));
            }
            self.bit_offset += 1;
        }

        Ok(())
    }

    /// Appends a single bit.
    pub fn put_bit(&mut self, bit: bool) -> Result<()> {
        self.put(bit as u64, 1)
    }

    /// Current cursor position in bits.
    pub fn bit_position(&self) -> usize {
        self.bit_offset
    }

    /// Consumes the writer and returns the written bytes.
    ///
    /// Returns `MuxError::Alignment` if the cursor is not on a byte boundary;
    /// a mid-byte cursor at completion means some field width upstream is
    /// wrong.
    pub fn finish(self) -> Result<Bytes> {
        if self.bit_offset % 8 != 0 {
            return Err(MuxError::Alignment(format!(
                "finished at bit {} ({} spare bits)",
                self.bit_offset,
                self.bit_offset % 8
            )));
        }
        let mut data = self.data;
        data.truncate(self.bit_offset / 8);
        Ok(Bytes::from(data))
    }
}

/// A bit-level reader, the decoding counterpart of [`BitWriter`].
///
/// The mux path never parses its own output; this exists so tests can decode
/// emitted packets field by field.
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(MuxError::InvalidData("reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits and returns them as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(MuxError::InvalidData("too many bits requested".into()));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }

        Ok(value)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }
}
