//! Byte-level helpers for codec parameters: fixed-width big-endian integers and
//! LEB128 varints.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::Cursor;

pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    let start = out.len();
    out.resize(start + 2, 0);
    BigEndian::write_u16(&mut out[start..], value);
}

pub(crate) fn put_u64(out: &mut Vec<u8>, value: u64) {
    let start = out.len();
    out.resize(start + 8, 0);
    BigEndian::write_u64(&mut out[start..], value);
}

/// Appends `value` as an unsigned LEB128 varint.
pub(crate) fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Number of bytes [`put_varint`] writes for `value`.
pub(crate) fn varint_len(value: u64) -> usize {
    (64 - value.leading_zeros() as usize).div_ceil(7).max(1)
}

/// Cursor over codec parameters or payload bytes.
///
/// A reader made with [`ByteReader::new`] reads parameters, so running out of
/// bytes is a corrupt header. One made with [`ByteReader::payload`] reads
/// data, where running out means the stream was truncated.
pub(crate) struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
    section: &'static str,
    payload: bool,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], section: &'static str) -> Self {
        Self {
            cursor: Cursor::new(data),
            section,
            payload: false,
        }
    }

    pub(crate) fn payload(data: &'a [u8], section: &'static str) -> Self {
        Self {
            cursor: Cursor::new(data),
            section,
            payload: true,
        }
    }

    fn eof(&self, field: &str) -> Error {
        let msg = format!("{} ended before {}", self.section, field);
        if self.payload {
            Error::TruncatedStream(msg)
        } else {
            Error::CorruptHeader(msg)
        }
    }

    fn malformed(&self, msg: String) -> Error {
        if self.payload {
            Error::CorruptStream(msg)
        } else {
            Error::CorruptHeader(msg)
        }
    }

    pub(crate) fn u8(&mut self, field: &str) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.eof(field))
    }

    pub(crate) fn u16(&mut self, field: &str) -> Result<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.eof(field))
    }

    pub(crate) fn u64(&mut self, field: &str) -> Result<u64> {
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| self.eof(field))
    }

    pub(crate) fn varint(&mut self, field: &str) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.u8(field)?;
            let bits = (byte & 0x7f) as u64;
            if shift == 63 && bits > 1 {
                break;
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.malformed(format!(
            "{}: varint {} overflows 64 bits",
            self.section, field
        )))
    }

    /// Reads a varint that must fit in `usize` and not exceed `limit`.
    pub(crate) fn varint_usize(&mut self, field: &str, limit: usize) -> Result<usize> {
        let value = self.varint(field)?;
        match usize::try_from(value) {
            Ok(v) if v <= limit => Ok(v),
            _ => Err(self.malformed(format!(
                "{}: {} of {} exceeds limit {}",
                self.section, field, value, limit
            ))),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rest().is_empty()
    }

    /// Everything not yet consumed.
    pub(crate) fn rest(&self) -> &'a [u8] {
        let data = *self.cursor.get_ref();
        let pos = (self.cursor.position() as usize).min(data.len());
        &data[pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding() {
        let mut out = Vec::new();
        put_varint(&mut out, 0);
        put_varint(&mut out, 127);
        put_varint(&mut out, 128);
        put_varint(&mut out, 300);
        put_varint(&mut out, u64::MAX);
        assert_eq!(&out[..4], &[0x00, 0x7f, 0x80, 0x01]);

        let mut reader = ByteReader::new(&out, "test");
        assert_eq!(reader.varint("a").unwrap(), 0);
        assert_eq!(reader.varint("b").unwrap(), 127);
        assert_eq!(reader.varint("c").unwrap(), 128);
        assert_eq!(reader.varint("d").unwrap(), 300);
        assert_eq!(reader.varint("e").unwrap(), u64::MAX);
        assert!(reader.rest().is_empty());
    }

    #[test]
    fn test_overlong_varint_rejected() {
        let data = [0xffu8; 11];
        let mut reader = ByteReader::new(&data, "test");
        assert!(reader.varint("x").is_err());
    }

    #[test]
    fn test_fixed_width_and_rest() {
        let mut out = Vec::new();
        put_u16(&mut out, 0x0102);
        put_u64(&mut out, 7);
        out.extend_from_slice(b"tail");

        let mut reader = ByteReader::new(&out, "test");
        assert_eq!(reader.u16("a").unwrap(), 0x0102);
        assert_eq!(reader.u64("b").unwrap(), 7);
        assert_eq!(reader.rest(), b"tail");
    }

    #[test]
    fn test_fixed_width_appends_big_endian() {
        let mut out = vec![0xaa];
        put_u16(&mut out, 0x0102);
        put_u64(&mut out, 0x0304);
        assert_eq!(out, [0xaa, 0x01, 0x02, 0, 0, 0, 0, 0, 0, 0x03, 0x04]);
    }

    #[test]
    fn test_varint_len_matches_writer() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut out = Vec::new();
            put_varint(&mut out, value);
            assert_eq!(varint_len(value), out.len(), "{}", value);
        }
    }

    #[test]
    fn test_truncated_field() {
        let mut reader = ByteReader::new(&[1], "params");
        let err = reader.u16("width").unwrap_err();
        assert_eq!(
            err,
            Error::CorruptHeader("params ended before width".to_string())
        );
    }

    #[test]
    fn test_payload_reader_reports_truncation() {
        let mut reader = ByteReader::payload(&[0x80], "coefficients");
        let err = reader.varint("value").unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedStream("coefficients ended before value".to_string())
        );
    }

    #[test]
    fn test_varint_limit() {
        let mut out = Vec::new();
        put_varint(&mut out, 1000);
        let mut reader = ByteReader::new(&out, "test");
        assert!(reader.varint_usize("n", 999).is_err());
    }
}
