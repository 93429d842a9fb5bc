//! Bit-level packing for variable-length codes.
//!
//! Bits are written most-significant-first: `write_bits(0b101, 3)` appends a 1,
//! a 0 and a 1, in that order, and the first bit written lands in the high bit
//! of the first byte. The same order is used by every codec in the crate.

use crate::error::{Error, Result};
use bitvec::prelude::*;

/// Packed output of a [`BitWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedBits {
    /// Whole bytes, the last one zero-padded
    pub bytes: Vec<u8>,
    /// Number of zero bits appended to the final byte (0..=7)
    pub pad_bits: u8,
}

impl PackedBits {
    /// Number of meaningful bits.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 - self.pad_bits as usize
    }
}

/// Appends bit fields to a growing buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(bits),
        }
    }

    /// Appends the lowest `count` bits of `value`, high bit first.
    pub fn write_bits(&mut self, value: u64, count: usize) {
        debug_assert!(count <= 64, "at most 64 bits per write");
        for shift in (0..count).rev() {
            self.bits.push((value >> shift) & 1 == 1);
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Number of bits written so far.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Pads the final partial byte with zeros and returns the packed bytes.
    pub fn flush(mut self) -> PackedBits {
        let pad_bits = (8 - self.bits.len() % 8) % 8;
        for _ in 0..pad_bits {
            self.bits.push(false);
        }
        PackedBits {
            bytes: self.bits.into_vec(),
            pad_bits: pad_bits as u8,
        }
    }
}

/// Reads bit fields back out of a packed buffer.
#[derive(Debug)]
pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
    end: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a reader that ignores the last `pad_bits` bits of `bytes`.
    pub fn new(bytes: &'a [u8], pad_bits: u8) -> Result<Self> {
        if pad_bits > 7 {
            return Err(Error::CorruptHeader(format!(
                "pad length {} exceeds 7 bits",
                pad_bits
            )));
        }
        if bytes.is_empty() && pad_bits > 0 {
            return Err(Error::CorruptHeader(
                "padding recorded for an empty bit stream".to_string(),
            ));
        }
        let bits = bytes.view_bits::<Msb0>();
        Ok(Self {
            bits,
            pos: 0,
            end: bits.len() - pad_bits as usize,
        })
    }

    /// Reads `count` (at most 64) bits as an unsigned integer.
    pub fn read_bits(&mut self, count: usize) -> Result<u64> {
        debug_assert!(count <= 64, "at most 64 bits per read");
        if count > self.remaining() {
            return Err(Error::InsufficientData {
                requested: count,
                remaining: self.remaining(),
            });
        }
        let value = self.bits[self.pos..self.pos + count]
            .iter()
            .fold(0u64, |acc, bit| (acc << 1) | *bit as u64);
        self.pos += count;
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.end {
            return Err(Error::InsufficientData {
                requested: 1,
                remaining: 0,
            });
        }
        let bit = self.bits[self.pos];
        self.pos += 1;
        Ok(bit)
    }

    /// Bits left before the padding.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.end
    }
}

/// Number of bits needed to represent every value in `0..=max`.
pub fn bits_for(max: u64) -> usize {
    (64 - max.leading_zeros() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_msb_first_layout() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b1, 1);
        let packed = writer.flush();
        assert_eq!(packed.bytes, vec![0b1011_0000]);
        assert_eq!(packed.pad_bits, 4);
        assert_eq!(packed.bit_len(), 4);
    }

    #[test]
    fn test_write_read_mixed_widths() {
        let fields: [(u64, usize); 6] = [
            (1, 1),
            (0x1ff, 9),
            (0, 3),
            (0xdead_beef, 32),
            (42, 7),
            (u64::MAX, 64),
        ];
        let mut writer = BitWriter::new();
        for &(value, width) in &fields {
            writer.write_bits(value, width);
        }
        let packed = writer.flush();

        let mut reader = BitReader::new(&packed.bytes, packed.pad_bits).unwrap();
        for &(value, width) in &fields {
            assert_eq!(reader.read_bits(width).unwrap(), value);
        }
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_padding_is_not_readable() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b11, 2);
        let packed = writer.flush();
        let mut reader = BitReader::new(&packed.bytes, packed.pad_bits).unwrap();
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read_bits(2).unwrap(), 3);
        let err = reader.read_bit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_read_past_end() {
        let bytes = [0xff];
        let mut reader = BitReader::new(&bytes, 0).unwrap();
        assert_eq!(
            reader.read_bits(9),
            Err(Error::InsufficientData {
                requested: 9,
                remaining: 8
            })
        );
        // A failed read does not consume anything
        assert_eq!(reader.read_bits(8).unwrap(), 0xff);
    }

    #[test]
    fn test_byte_aligned_flush_has_no_padding() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xab, 8);
        let packed = writer.flush();
        assert_eq!(packed.bytes, vec![0xab]);
        assert_eq!(packed.pad_bits, 0);
    }

    #[test]
    fn test_empty_stream() {
        let packed = BitWriter::new().flush();
        assert!(packed.bytes.is_empty());
        assert_eq!(packed.pad_bits, 0);
        let reader = BitReader::new(&packed.bytes, 0).unwrap();
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_invalid_padding() {
        assert!(BitReader::new(&[0], 8).is_err());
        assert!(BitReader::new(&[], 1).is_err());
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(4095), 12);
        assert_eq!(bits_for(4096), 13);
    }
}
