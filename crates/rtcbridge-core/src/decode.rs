//! Consumer-side decoding of delivered envelopes.

use rtcbridge_engine::{OfflineReason, Uid};
use rtcbridge_envelope::{
    decode_envelope, parse_decimal, EnvelopeConfig, EnvelopeError, EnvelopeReader, MessageId,
    Result, ENGINE_ERROR, JOIN_SUCCESS, LEAVE_CHANNEL, USER_JOINED, USER_MUTE_AUDIO,
    USER_MUTE_VIDEO, USER_OFFLINE,
};

use crate::config::WireSchema;

/// Owned view of one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    JoinSuccess { uid: Uid, channel: Vec<u8> },
    UserJoined { uid: Uid },
    UserOffline { uid: Uid, reason: OfflineReason },
    UserMuteVideo { uid: Uid, muted: bool },
    UserMuteAudio { uid: Uid, muted: bool },
    LeaveChannel,
    EngineError { code: i32 },
}

/// Decode a delivered wire image (length prefix included).
///
/// In the legacy schema the concatenated decimal fields of ids 3-5 are split
/// by taking the final digit as the reason or flag. An offline reason above
/// 9 is therefore misread: its leading digits end up in the uid. The binary
/// schema carries every reason exactly.
pub fn decode_event(
    message_id: MessageId,
    wire: &[u8],
    schema: WireSchema,
    config: &EnvelopeConfig,
) -> Result<DecodedEvent> {
    let envelope = decode_envelope(message_id, wire, config)?;
    let mut reader = EnvelopeReader::new(&envelope);

    let event = match message_id {
        JOIN_SUCCESS => {
            let uid = reader.read_u32()?;
            DecodedEvent::JoinSuccess {
                uid,
                channel: reader.read_rest().to_vec(),
            }
        }
        LEAVE_CHANNEL => DecodedEvent::LeaveChannel,
        ENGINE_ERROR => DecodedEvent::EngineError {
            code: reader.read_i32()?,
        },
        USER_JOINED => DecodedEvent::UserJoined {
            uid: match schema {
                WireSchema::Legacy => decimal_uid(reader.read_rest())?,
                WireSchema::Binary => reader.read_u32()?,
            },
        },
        USER_OFFLINE => {
            let (uid, reason) = match schema {
                WireSchema::Legacy => split_suffix_digit(reader.read_rest())?,
                WireSchema::Binary => (reader.read_u32()?, reader.read_u32()?),
            };
            DecodedEvent::UserOffline {
                uid,
                reason: OfflineReason::from_raw(reason),
            }
        }
        USER_MUTE_VIDEO | USER_MUTE_AUDIO => {
            let (uid, flag) = match schema {
                WireSchema::Legacy => split_suffix_digit(reader.read_rest())?,
                WireSchema::Binary => (reader.read_u32()?, u32::from(reader.read_u8()?)),
            };
            let muted = match flag {
                0 => false,
                1 => true,
                _ => return Err(EnvelopeError::InvalidDecimal),
            };
            if message_id == USER_MUTE_VIDEO {
                DecodedEvent::UserMuteVideo { uid, muted }
            } else {
                DecodedEvent::UserMuteAudio { uid, muted }
            }
        }
        other => return Err(EnvelopeError::UnknownMessage(other)),
    };

    if !reader.is_empty() {
        return Err(EnvelopeError::TrailingBytes {
            extra: reader.remaining(),
        });
    }
    Ok(event)
}

fn decimal_uid(digits: &[u8]) -> Result<Uid> {
    Uid::try_from(parse_decimal(digits)?).map_err(|_| EnvelopeError::InvalidDecimal)
}

fn split_suffix_digit(digits: &[u8]) -> Result<(Uid, u32)> {
    match digits.split_last() {
        Some((&last, head)) if last.is_ascii_digit() => {
            Ok((decimal_uid(head)?, u32::from(last - b'0')))
        }
        _ => Err(EnvelopeError::InvalidDecimal),
    }
}
