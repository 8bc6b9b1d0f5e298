//! Bounds-checked, length-prefixed event envelopes.
//!
//! Every translated engine event travels across the runtime boundary as one
//! envelope:
//! - A 2-byte little-endian total length (prefix + payload)
//! - The payload fields, laid out per message id
//!
//! The message id is not part of the wire image; it is handed to the
//! delivery call as a separate argument.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_envelope, Envelope, EnvelopeConfig, DEFAULT_MAX_PAYLOAD, LENGTH_PREFIX_SIZE,
    MAX_WIRE_PAYLOAD,
};
pub use error::{EnvelopeError, Result};
pub use message::{
    is_known, message_name, MessageId, ENGINE_ERROR, JOIN_SUCCESS, LEAVE_CHANNEL, USER_JOINED,
    USER_MUTE_AUDIO, USER_MUTE_VIDEO, USER_OFFLINE,
};
pub use reader::{parse_decimal, EnvelopeReader};
pub use writer::EnvelopeWriter;
