use bytes::Bytes;

use crate::error::{EnvelopeError, Result};
use crate::message::MessageId;

/// Length prefix: total length (2B LE) = prefix + payload.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Default payload capacity of one envelope.
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

/// Largest payload a 16-bit total length can describe.
pub const MAX_WIRE_PAYLOAD: usize = u16::MAX as usize - LENGTH_PREFIX_SIZE;

/// One encoded event, ready for delivery.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────┐
/// │ Length (2B)  │ Payload                  │
/// │ LE, incl.    │ (layout per message id)  │
/// │ prefix       │                          │
/// └──────────────┴──────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    message_id: MessageId,
    wire: Bytes,
}

impl Envelope {
    pub(crate) fn from_wire(message_id: MessageId, wire: Bytes) -> Self {
        debug_assert!(wire.len() >= LENGTH_PREFIX_SIZE);
        Self { message_id, wire }
    }

    /// The side-channel message id.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// The full wire image, length prefix included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// The payload after the length prefix.
    pub fn payload(&self) -> &[u8] {
        &self.wire[LENGTH_PREFIX_SIZE..]
    }

    /// The total length declared in the prefix.
    pub fn declared_len(&self) -> u16 {
        u16::from_le_bytes([self.wire[0], self.wire[1]])
    }

    /// The total wire size (prefix + payload).
    pub fn wire_size(&self) -> usize {
        self.wire.len()
    }

    /// Consume the envelope and return the wire image.
    pub fn into_bytes(self) -> Bytes {
        self.wire
    }
}

/// Configuration for envelope encoding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// Maximum payload size in bytes. Default: 512.
    pub max_payload_size: usize,
}

impl EnvelopeConfig {
    /// Payload capacity after clamping to what the length prefix can express.
    pub fn capacity(&self) -> usize {
        self.max_payload_size.min(MAX_WIRE_PAYLOAD)
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Validate a received wire image and wrap it as an envelope.
///
/// The prefix must be present, must equal the wire length, and the payload
/// must fit the configured capacity.
pub fn decode_envelope(
    message_id: MessageId,
    wire: &[u8],
    config: &EnvelopeConfig,
) -> Result<Envelope> {
    if wire.len() < LENGTH_PREFIX_SIZE {
        return Err(EnvelopeError::Truncated { len: wire.len() });
    }

    let declared = u16::from_le_bytes([wire[0], wire[1]]) as usize;
    if declared != wire.len() || declared < LENGTH_PREFIX_SIZE {
        return Err(EnvelopeError::LengthMismatch {
            declared,
            actual: wire.len(),
        });
    }

    let payload_len = declared - LENGTH_PREFIX_SIZE;
    if payload_len > config.capacity() {
        return Err(EnvelopeError::PayloadTooLarge {
            size: payload_len,
            max: config.capacity(),
        });
    }

    Ok(Envelope::from_wire(message_id, Bytes::copy_from_slice(wire)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::EnvelopeWriter;

    #[test]
    fn decode_accepts_writer_output() {
        let mut writer = EnvelopeWriter::new(1);
        writer.write_u32(42).unwrap();
        writer.write_bytes(b"room1").unwrap();
        let envelope = writer.finish().unwrap();

        let decoded = decode_envelope(1, envelope.as_bytes(), &EnvelopeConfig::default()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.payload().len(), 9);
        assert_eq!(decoded.declared_len(), 11);
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        let result = decode_envelope(1, &[0x02], &EnvelopeConfig::default());
        assert!(matches!(result, Err(EnvelopeError::Truncated { len: 1 })));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let result = decode_envelope(2, &[0x05, 0x00, b'4', b'2'], &EnvelopeConfig::default());
        assert!(matches!(
            result,
            Err(EnvelopeError::LengthMismatch {
                declared: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn decode_rejects_prefix_shorter_than_itself() {
        let result = decode_envelope(2, &[0x01, 0x00], &EnvelopeConfig::default());
        assert!(matches!(result, Err(EnvelopeError::LengthMismatch { .. })));
    }

    #[test]
    fn decode_rejects_payload_over_capacity() {
        let config = EnvelopeConfig {
            max_payload_size: 2,
        };
        let result = decode_envelope(2, &[0x05, 0x00, b'1', b'2', b'3'], &config);
        assert!(matches!(
            result,
            Err(EnvelopeError::PayloadTooLarge { size: 3, max: 2 })
        ));
    }

    #[test]
    fn empty_payload_is_prefix_only() {
        let envelope = EnvelopeWriter::new(6).finish().unwrap();
        assert_eq!(envelope.as_bytes(), &[0x02, 0x00]);
        assert!(envelope.payload().is_empty());
        assert_eq!(envelope.wire_size(), LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn capacity_is_clamped_to_prefix_range() {
        let config = EnvelopeConfig {
            max_payload_size: usize::MAX,
        };
        assert_eq!(config.capacity(), MAX_WIRE_PAYLOAD);
    }
}
