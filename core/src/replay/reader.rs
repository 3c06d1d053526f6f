use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use super::*;

/// Big-endian cursor over a replay buffer. Running off the end is [`FormatError::Truncated`].
pub(crate) struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn u8(&mut self) -> DecodeResult<u8> {
        self.cursor.read_u8().map_err(truncated)
    }

    pub fn u16(&mut self) -> DecodeResult<u16> {
        self.cursor.read_u16::<BigEndian>().map_err(truncated)
    }

    pub fn i16(&mut self) -> DecodeResult<i16> {
        self.cursor.read_i16::<BigEndian>().map_err(truncated)
    }

    pub fn u24(&mut self) -> DecodeResult<u32> {
        self.cursor.read_u24::<BigEndian>().map_err(truncated)
    }

    pub fn u32(&mut self) -> DecodeResult<u32> {
        self.cursor.read_u32::<BigEndian>().map_err(truncated)
    }

    pub fn u64(&mut self) -> DecodeResult<u64> {
        self.cursor.read_u64::<BigEndian>().map_err(truncated)
    }

    pub fn skip(&mut self, count: usize) -> DecodeResult<()> {
        self.bytes(count).map(|_| ())
    }

    pub fn bytes(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        let start = self.position();
        let end = start.checked_add(count).ok_or(FormatError::Truncated)?;
        let bytes = self
            .cursor
            .get_ref()
            .get(start..end)
            .ok_or(FormatError::Truncated)?;
        self.cursor.set_position(end as u64);
        Ok(bytes)
    }

    /// Bytes up to `delimiter`, which is consumed but not returned.
    pub fn until(&mut self, delimiter: u8) -> DecodeResult<&'a [u8]> {
        let start = self.position();
        let rest = self.cursor.get_ref().get(start..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&byte| byte == delimiter)
            .ok_or(FormatError::Truncated)?;
        self.cursor.set_position((start + len + 1) as u64);
        Ok(&rest[..len])
    }

    /// NUL-terminated string, invalid UTF-8 replaced.
    pub fn c_string(&mut self) -> DecodeResult<String> {
        self.until(0).map(lossy)
    }

    /// String prefixed by its `u8` length.
    pub fn short_string(&mut self) -> DecodeResult<String> {
        let len = self.u8()? as usize;
        self.bytes(len).map(lossy)
    }

    /// Moves past the next occurrence of `pattern`.
    pub fn seek_past(&mut self, pattern: &[u8]) -> DecodeResult<()> {
        let start = self.position();
        let rest = self.cursor.get_ref().get(start..).unwrap_or_default();
        let offset = rest
            .windows(pattern.len())
            .position(|window| window == pattern)
            .ok_or(FormatError::Truncated)?;
        self.cursor
            .set_position((start + offset + pattern.len()) as u64);
        Ok(())
    }
}

pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// ASCII digits of `bytes` as a number; anything else is `field`.
pub(crate) fn parse_digits(bytes: &[u8], field: &'static str) -> DecodeResult<usize> {
    core::str::from_utf8(bytes)
        .ok()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or(FormatError::InvalidField(field))
}

fn truncated(_: std::io::Error) -> FormatError {
    FormatError::Truncated
}
