use crate::codec::Envelope;
use crate::error::{EnvelopeError, Result};

/// Reads payload fields back out of an envelope, front to back.
///
/// This is the consumer-side mirror of [`EnvelopeWriter`](crate::EnvelopeWriter).
pub struct EnvelopeReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> EnvelopeReader<'a> {
    /// Read the payload of `envelope`.
    pub fn new(envelope: &'a Envelope) -> Self {
        Self::from_payload(envelope.payload())
    }

    /// Read a bare payload slice (no length prefix).
    pub fn from_payload(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.payload[self.pos..];
        self.pos = self.payload.len();
        rest
    }

    /// Parse `len` ASCII digits as an unsigned decimal.
    pub fn read_decimal(&mut self, len: usize) -> Result<u64> {
        parse_decimal(self.take(len)?)
    }

    /// Bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    /// Returns true when the whole payload was consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(EnvelopeError::UnexpectedEnd {
                needed: len,
                remaining,
            });
        }
        let slice = &self.payload[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Parse ASCII digits as an unsigned decimal. Empty input is invalid.
pub fn parse_decimal(digits: &[u8]) -> Result<u64> {
    if digits.is_empty() {
        return Err(EnvelopeError::InvalidDecimal);
    }
    digits.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err(EnvelopeError::InvalidDecimal);
        }
        acc.checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or(EnvelopeError::InvalidDecimal)
    })
}
