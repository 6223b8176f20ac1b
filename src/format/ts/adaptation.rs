use super::types::{time_to_pcr, STUFFING_BYTE};
use crate::error::Result;
use crate::utils::BitWriter;
use bytes::Bytes;
use std::time::Duration;

/// Optional per-packet metadata region: clock reference, stream event flags,
/// and the stuffing that pads short packets to 188 bytes.
///
/// A field with nothing to say still has a one-byte form (a lone zero length
/// byte), used when exactly one byte of padding is needed.
#[derive(Debug, Clone, Default)]
pub struct AdaptationField {
    pub discontinuity: bool,
    pub random_access: bool,
    pub pcr: Option<Duration>,
    pub stuffing: usize,
    // Set by `stuff_to` when padding forces the flags byte into an otherwise
    // empty field.
    padded: bool,
}

impl AdaptationField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pcr(mut self, pcr: Duration) -> Self {
        self.pcr = Some(pcr);
        self
    }

    pub fn with_discontinuity(mut self) -> Self {
        self.discontinuity = true;
        self
    }

    pub fn with_random_access(mut self) -> Self {
        self.random_access = true;
        self
    }

    /// True if the field carries no flags, no PCR and no stuffing.
    pub fn is_empty(&self) -> bool {
        !self.discontinuity && !self.random_access && self.pcr.is_none() && self.stuffing == 0
    }

    fn body_len(&self) -> usize {
        if self.is_empty() && !self.padded {
            return 0;
        }
        1 + if self.pcr.is_some() { 6 } else { 0 } + self.stuffing
    }

    /// On-wire size in bytes, length byte included.
    pub fn size(&self) -> usize {
        1 + self.body_len()
    }

    /// Grows the field with stuffing bytes so that `size()` becomes exactly
    /// `total` bytes. `total` must not shrink the field and must leave room
    /// for the flags byte unless it is the lone-length-byte form.
    pub fn stuff_to(&mut self, total: usize) {
        debug_assert!(total >= self.size());
        let grow = total - self.size();
        if grow == 0 {
            return;
        }
        if self.body_len() == 0 {
            // Growing an empty field brings the flags byte in first.
            self.padded = true;
            self.stuffing = grow - 1;
        } else {
            self.stuffing += grow;
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let body_len = self.body_len();
        let mut writer = BitWriter::with_capacity(1 + body_len);

        writer.put(body_len as u64, 8)?;
        if body_len > 0 {
            writer.put_bit(self.discontinuity)?;
            writer.put_bit(self.random_access)?;
            writer.put_bit(false)?; // elementary stream priority
            writer.put_bit(self.pcr.is_some())?;
            writer.put_bit(false)?; // OPCR
            writer.put_bit(false)?; // splicing point
            writer.put_bit(false)?; // private data
            writer.put_bit(false)?; // extension

            if let Some(pcr) = self.pcr {
                writer.put(time_to_pcr(pcr), 48)?;
            }

            for _ in 0..self.stuffing {
                writer.put(STUFFING_BYTE as u64, 8)?;
            }
        }

        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lone_length_byte() {
        let field = AdaptationField::new();
        assert!(field.is_empty());
        assert_eq!(field.size(), 1);
        assert_eq!(&field.encode().unwrap()[..], &[0x00]);
    }

    #[test]
    fn test_stuffing_only() {
        let mut field = AdaptationField::new();
        field.stuff_to(174);
        let out = field.encode().unwrap();
        assert_eq!(out.len(), 174);
        assert_eq!(out[0], 173); // declared length excludes the length byte
        assert_eq!(out[1], 0x00); // no flags set
        assert!(out[2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_stuff_to_preserves_flags() {
        let mut field = AdaptationField::new().with_random_access();
        assert_eq!(field.size(), 2);
        field.stuff_to(10);
        let out = field.encode().unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], 9);
        assert_eq!(out[1], 0x40); // random access indicator
        assert!(out[2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_stuff_empty_to_two_bytes() {
        let mut field = AdaptationField::new();
        field.stuff_to(2);
        assert_eq!(&field.encode().unwrap()[..], &[0x01, 0x00]);
    }

    #[test]
    fn test_pcr_layout() {
        let field = AdaptationField::new().with_pcr(Duration::ZERO);
        let out = field.encode().unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 7);
        assert_eq!(out[1], 0x10); // PCR flag
        // base 0, reserved bits all ones, extension 0
        assert_eq!(&out[2..], &[0x00, 0x00, 0x00, 0x00, 0x7E, 0x00]);
    }

    #[test]
    fn test_discontinuity_flag() {
        let field = AdaptationField::new().with_discontinuity();
        let out = field.encode().unwrap();
        assert_eq!(out[0], 1);
        assert_eq!(out[1], 0x80);
    }
}
