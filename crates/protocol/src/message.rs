//! Network message buffer
//!
//! A `NetworkMessage` wraps the body of one inbound or outbound client frame.
//! Reads advance a cursor; writes append at the end. All multi-byte integers
//! are little-endian and strings carry a 16-bit length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use otsrv_core::{Result, ServerError};
use std::fmt;

/// Largest frame body the server accepts
pub const MAX_BODY_LENGTH: usize = 24590;

/// Inbound/outbound frame body with a read cursor
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NetworkMessage {
    buffer: BytesMut,
    position: usize,
}

impl NetworkMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes; the cursor starts at the first byte
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            buffer: BytesMut::from(data),
            position: 0,
        }
    }

    /// Total number of bytes in the message
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current read cursor
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Drop all content and rewind the cursor
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.position = 0;
    }

    /// Advance the cursor without reading
    pub fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.ensure_readable(count, "skip")?;
        self.position += count;
        Ok(())
    }

    pub fn get_byte(&mut self) -> Result<u8> {
        self.ensure_readable(1, "byte")?;
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.ensure_readable(2, "u16")?;
        let value = (&self.buffer[self.position..]).get_u16_le();
        self.position += 2;
        Ok(value)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.ensure_readable(4, "u32")?;
        let value = (&self.buffer[self.position..]).get_u32_le();
        self.position += 4;
        Ok(value)
    }

    /// Read a u16-length-prefixed string
    pub fn get_string(&mut self) -> Result<String> {
        let start = self.position;
        let length = self.get_u16()? as usize;
        if self.remaining() < length {
            self.position = start;
            return Err(ServerError::InvalidData(format!(
                "Not enough bytes for string of length {}",
                length
            )));
        }

        let raw = &self.buffer[self.position..self.position + length];
        // Clients send Latin-1; map each byte to the matching code point.
        let value = raw.iter().map(|&b| b as char).collect();
        self.position += length;
        Ok(value)
    }

    pub fn add_byte(&mut self, value: u8) -> Result<()> {
        self.ensure_writable(1)?;
        self.buffer.put_u8(value);
        Ok(())
    }

    pub fn add_u16(&mut self, value: u16) -> Result<()> {
        self.ensure_writable(2)?;
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn add_u32(&mut self, value: u32) -> Result<()> {
        self.ensure_writable(4)?;
        self.buffer.put_u32_le(value);
        Ok(())
    }

    /// Append a u16-length-prefixed string
    ///
    /// Characters outside Latin-1 are replaced with `?`.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let encoded: Vec<u8> = value
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect();
        let length = u16::try_from(encoded.len()).map_err(|_| {
            ServerError::InvalidData(format!("String too long: {} bytes", encoded.len()))
        })?;

        self.ensure_writable(2 + encoded.len())?;
        self.buffer.put_u16_le(length);
        self.buffer.put_slice(&encoded);
        Ok(())
    }

    /// Raw message bytes, independent of the cursor
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Copy the message body out for queueing
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buffer)
    }

    fn ensure_readable(&self, count: usize, what: &str) -> Result<()> {
        if self.remaining() < count {
            return Err(ServerError::InvalidData(format!(
                "Not enough bytes for {} at position {}",
                what, self.position
            )));
        }
        Ok(())
    }

    fn ensure_writable(&self, count: usize) -> Result<()> {
        if self.buffer.len() + count > MAX_BODY_LENGTH {
            return Err(ServerError::InvalidData(format!(
                "Message body would exceed {} bytes",
                MAX_BODY_LENGTH
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for NetworkMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMessage")
            .field("length", &self.buffer.len())
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_little_endian() {
        let mut msg = NetworkMessage::from_bytes(&[0x0A, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(msg.get_byte().unwrap(), 0x0A);
        assert_eq!(msg.get_u16().unwrap(), 0x1234);
        assert_eq!(msg.get_u32().unwrap(), 0x1234_5678);
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_fails_without_moving() {
        let mut msg = NetworkMessage::from_bytes(&[0x01]);
        assert!(msg.get_u16().is_err());
        assert_eq!(msg.position(), 0);
        assert_eq!(msg.get_byte().unwrap(), 0x01);
        assert!(msg.get_byte().is_err());
    }

    #[test]
    fn test_string_prefix_and_truncation() {
        let mut msg = NetworkMessage::new();
        msg.add_string("hello").unwrap();
        assert_eq!(msg.as_bytes(), &[5, 0, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(msg.get_string().unwrap(), "hello");

        // Length claims more bytes than present
        let mut short = NetworkMessage::from_bytes(&[10, 0, b'a']);
        assert!(short.get_string().is_err());
        assert_eq!(short.position(), 0);
    }

    #[test]
    fn test_non_latin1_replaced() {
        let mut msg = NetworkMessage::new();
        msg.add_string("a\u{263A}").unwrap();
        assert_eq!(msg.as_bytes(), &[2, 0, b'a', b'?']);
    }

    #[test]
    fn test_body_limit() {
        let mut msg = NetworkMessage::from_bytes(&vec![0u8; MAX_BODY_LENGTH]);
        assert!(msg.add_byte(1).is_err());
        assert_eq!(msg.len(), MAX_BODY_LENGTH);
    }

    #[test]
    fn test_reset_and_skip() {
        let mut msg = NetworkMessage::from_bytes(&[1, 2, 3]);
        msg.skip_bytes(2).unwrap();
        assert_eq!(msg.get_byte().unwrap(), 3);
        assert!(msg.skip_bytes(1).is_err());

        msg.reset();
        assert!(msg.is_empty());
        assert_eq!(msg.position(), 0);
    }
}
