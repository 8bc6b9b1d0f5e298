//! Engine event → envelope mapping.
//!
//! | id | event            | legacy payload                 | binary payload        |
//! |----|------------------|--------------------------------|-----------------------|
//! | 1  | join success     | uid u32 LE, channel bytes      | same                  |
//! | 2  | user joined      | uid decimal                    | uid u32 LE            |
//! | 3  | user offline     | uid decimal ++ reason decimal  | uid u32 LE, reason u32 LE |
//! | 4  | user mute video  | uid decimal ++ `0`/`1`         | uid u32 LE, flag u8   |
//! | 5  | user mute audio  | uid decimal ++ `0`/`1`         | uid u32 LE, flag u8   |
//! | 6  | leave channel    | empty                          | same                  |
//! | 7  | engine error     | code i32 LE                    | same                  |
//!
//! First-remote-frame events are not encoded; they become a request to
//! create the remote view.

use rtcbridge_engine::{EngineEvent, Uid};
use rtcbridge_envelope::{
    Envelope, EnvelopeConfig, EnvelopeWriter, MessageId, Result, ENGINE_ERROR, JOIN_SUCCESS,
    LEAVE_CHANNEL, USER_JOINED, USER_MUTE_AUDIO, USER_MUTE_VIDEO, USER_OFFLINE,
};

use crate::config::{BridgeConfig, WireSchema};

/// Outcome of translating one engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Deliver this envelope to the registered handler.
    Envelope(Envelope),
    /// Ask the managed runtime to create a view for this remote user.
    CreateRemoteView(Uid),
}

/// Pure, non-blocking event encoder. Cheap to copy into every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTranslator {
    schema: WireSchema,
    envelope: EnvelopeConfig,
}

impl EventTranslator {
    pub fn new(schema: WireSchema, envelope: EnvelopeConfig) -> Self {
        Self { schema, envelope }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.wire_schema, config.envelope_config())
    }

    pub fn schema(&self) -> WireSchema {
        self.schema
    }

    /// Translate `event`. Each call uses its own writer.
    pub fn translate(&self, event: &EngineEvent<'_>) -> Result<Translation> {
        let envelope = match *event {
            EngineEvent::JoinChannelSuccess { channel, uid, .. } => {
                let mut writer = self.writer(JOIN_SUCCESS);
                writer.write_u32(uid)?;
                writer.write_bytes(channel)?;
                writer.finish()?
            }
            EngineEvent::UserJoined { uid, .. } => {
                let mut writer = self.writer(USER_JOINED);
                self.write_uid(&mut writer, uid)?;
                writer.finish()?
            }
            EngineEvent::UserOffline { uid, reason } => {
                let mut writer = self.writer(USER_OFFLINE);
                self.write_uid(&mut writer, uid)?;
                match self.schema {
                    WireSchema::Legacy => writer.write_decimal(u64::from(reason.as_raw()))?,
                    WireSchema::Binary => writer.write_u32(reason.as_raw())?,
                }
                writer.finish()?
            }
            EngineEvent::UserMuteVideo { uid, muted } => {
                self.encode_flag(USER_MUTE_VIDEO, uid, muted)?
            }
            EngineEvent::UserMuteAudio { uid, muted } => {
                self.encode_flag(USER_MUTE_AUDIO, uid, muted)?
            }
            EngineEvent::LeaveChannel => self.writer(LEAVE_CHANNEL).finish()?,
            EngineEvent::Error { code } => {
                let mut writer = self.writer(ENGINE_ERROR);
                writer.write_i32(code)?;
                writer.finish()?
            }
            EngineEvent::FirstRemoteVideoDecoded { uid, .. } => {
                return Ok(Translation::CreateRemoteView(uid));
            }
        };
        Ok(Translation::Envelope(envelope))
    }

    fn writer(&self, message_id: MessageId) -> EnvelopeWriter {
        EnvelopeWriter::with_config(message_id, self.envelope)
    }

    fn write_uid(&self, writer: &mut EnvelopeWriter, uid: Uid) -> Result<()> {
        match self.schema {
            WireSchema::Legacy => writer.write_decimal(u64::from(uid)),
            WireSchema::Binary => writer.write_u32(uid),
        }
    }

    fn encode_flag(&self, message_id: MessageId, uid: Uid, flag: bool) -> Result<Envelope> {
        let mut writer = self.writer(message_id);
        self.write_uid(&mut writer, uid)?;
        match self.schema {
            WireSchema::Legacy => writer.write_flag_digit(flag)?,
            WireSchema::Binary => writer.write_u8(u8::from(flag))?,
        }
        writer.finish()
    }
}

impl Default for EventTranslator {
    fn default() -> Self {
        Self::new(WireSchema::Legacy, EnvelopeConfig::default())
    }
}
