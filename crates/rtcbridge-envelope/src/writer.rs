use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::codec::{Envelope, EnvelopeConfig, LENGTH_PREFIX_SIZE};
use crate::error::{EnvelopeError, Result};
use crate::message::MessageId;

/// Longest decimal rendering of a `u64`.
const MAX_DECIMAL_DIGITS: usize = 20;

/// Builds exactly one envelope.
///
/// The length prefix is reserved up front and back-patched by [`finish`].
/// Every write checks the remaining capacity before copying; a write that
/// does not fit fails with [`EnvelopeError::EncodingOverflow`] and poisons
/// the writer so that `finish` fails as well.
///
/// [`finish`]: EnvelopeWriter::finish
pub struct EnvelopeWriter {
    message_id: MessageId,
    buf: BytesMut,
    capacity: usize,
    overflow: Option<EnvelopeError>,
}

impl EnvelopeWriter {
    /// Create a writer with the default 512-byte payload capacity.
    pub fn new(message_id: MessageId) -> Self {
        Self::with_config(message_id, EnvelopeConfig::default())
    }

    /// Create a writer with explicit configuration.
    pub fn with_config(message_id: MessageId, config: EnvelopeConfig) -> Self {
        let capacity = config.capacity();
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + capacity);
        buf.put_u16_le(0);
        Self {
            message_id,
            buf,
            capacity,
            overflow: None,
        }
    }

    /// Append a 32-bit unsigned integer (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    /// Append a 32-bit signed integer (little-endian).
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_i32_le(value);
        Ok(())
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    /// Append a raw byte span. No terminator is written.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Append the ASCII decimal rendering of `value`.
    pub fn write_decimal(&mut self, value: u64) -> Result<()> {
        let mut digits = [0u8; MAX_DECIMAL_DIGITS];
        let mut start = MAX_DECIMAL_DIGITS;
        let mut rest = value;
        loop {
            start -= 1;
            digits[start] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        self.write_bytes(&digits[start..])
    }

    /// Append a boolean as the digit `'1'` or `'0'`.
    pub fn write_flag_digit(&mut self, flag: bool) -> Result<()> {
        self.write_u8(if flag { b'1' } else { b'0' })
    }

    /// Payload bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len() - LENGTH_PREFIX_SIZE
    }

    /// Returns true if no payload bytes were written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.len()
    }

    /// The message id this writer encodes.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Back-patch the length prefix and seal the envelope.
    pub fn finish(mut self) -> Result<Envelope> {
        if let Some(err) = self.overflow.take() {
            return Err(err);
        }

        let total = self.buf.len() as u16;
        self.buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&total.to_le_bytes());
        Ok(Envelope::from_wire(self.message_id, self.buf.freeze()))
    }

    fn reserve(&mut self, needed: usize) -> Result<()> {
        if let Some(err) = &self.overflow {
            return Err(err.clone());
        }

        let remaining = self.remaining();
        if needed > remaining {
            let err = EnvelopeError::EncodingOverflow {
                needed,
                remaining,
                capacity: self.capacity,
            };
            warn!(message_id = self.message_id, needed, remaining, "envelope overflow");
            self.overflow = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }
}
