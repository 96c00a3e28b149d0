//! Byte-level decoding utilities
//!
//! Class files are big-endian throughout. Strings in the constant pool use the
//! JVM's "modified UTF-8" encoding, which is decoded by [`decode_modified_utf8`].

use thiserror::Error;

/// Errors that can occur while decoding raw class-file bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unexpected end of the input
    #[error("Unexpected end of class file at offset {0}")]
    UnexpectedEnd(usize),

    /// Malformed modified UTF-8 string
    #[error("Invalid modified UTF-8 string at offset {0}")]
    InvalidUtf8(usize),
}

/// Cursor over a class-file buffer
///
/// Every read is bounds-checked; running off the end yields
/// [`DecodeError::UnexpectedEnd`] with the offset of the failed read.
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a new reader positioned at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 16-bit unsigned integer (big-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit unsigned integer (big-endian)
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 64-bit unsigned integer (big-endian)
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Ok((high << 32) | low)
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len)
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }

    /// Read a u16-length-prefixed modified UTF-8 string
    pub fn read_modified_utf8(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let offset = self.position;
        let bytes = self.take(len)?;
        decode_modified_utf8(bytes, offset)
    }
}

/// Decode a modified UTF-8 byte string
///
/// `offset` is only used to report where a malformed sequence starts.
pub fn decode_modified_utf8(bytes: &[u8], offset: usize) -> Result<String, DecodeError> {
    // Standard UTF-8 covers nearly every real class name
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_owned());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let start = i;
        let continuation = move |at: usize| -> Result<u16, DecodeError> {
            match bytes.get(at) {
                Some(&c) if c & 0xC0 == 0x80 => Ok((c & 0x3F) as u16),
                _ => Err(DecodeError::InvalidUtf8(offset + start)),
            }
        };
        match b {
            0x01..=0x7F => {
                units.push(b as u16);
                i += 1;
            }
            0xC0..=0xDF => {
                let low = continuation(i + 1)?;
                units.push((((b & 0x1F) as u16) << 6) | low);
                i += 2;
            }
            0xE0..=0xEF => {
                let mid = continuation(i + 1)?;
                let low = continuation(i + 2)?;
                units.push((((b & 0x0F) as u16) << 12) | (mid << 6) | low);
                i += 3;
            }
            _ => return Err(DecodeError::InvalidUtf8(offset + i)),
        }
    }

    char::decode_utf16(units.iter().copied())
        .collect::<Result<String, _>>()
        .map_err(|_| DecodeError::InvalidUtf8(offset))
}

/// Encode a string as modified UTF-8
#[cfg(feature = "writer")]
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
