use crate::types::{OfflineReason, Uid};

/// One callback fired by the engine.
///
/// Borrowed data (the channel name) is only valid for the duration of the
/// callback; the lifetime keeps handlers from retaining it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent<'a> {
    /// The local user joined `channel` as `uid`.
    JoinChannelSuccess {
        channel: &'a [u8],
        uid: Uid,
        elapsed_ms: i32,
    },
    /// The local user left the channel.
    LeaveChannel,
    /// A remote user joined.
    UserJoined { uid: Uid, elapsed_ms: i32 },
    /// A remote user went offline.
    UserOffline { uid: Uid, reason: OfflineReason },
    /// A remote user muted or unmuted its video.
    UserMuteVideo { uid: Uid, muted: bool },
    /// A remote user muted or unmuted its audio.
    UserMuteAudio { uid: Uid, muted: bool },
    /// The first frame of a remote user's video was decoded.
    FirstRemoteVideoDecoded {
        uid: Uid,
        width: i32,
        height: i32,
        elapsed_ms: i32,
    },
    /// The engine hit an error it could not recover from internally.
    Error { code: i32 },
}

impl EngineEvent<'_> {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::JoinChannelSuccess { .. } => "join_channel_success",
            EngineEvent::LeaveChannel => "leave_channel",
            EngineEvent::UserJoined { .. } => "user_joined",
            EngineEvent::UserOffline { .. } => "user_offline",
            EngineEvent::UserMuteVideo { .. } => "user_mute_video",
            EngineEvent::UserMuteAudio { .. } => "user_mute_audio",
            EngineEvent::FirstRemoteVideoDecoded { .. } => "first_remote_video_decoded",
            EngineEvent::Error { .. } => "error",
        }
    }

    /// The remote or local uid the event is about, if any.
    pub fn uid(&self) -> Option<Uid> {
        match *self {
            EngineEvent::JoinChannelSuccess { uid, .. }
            | EngineEvent::UserJoined { uid, .. }
            | EngineEvent::UserOffline { uid, .. }
            | EngineEvent::UserMuteVideo { uid, .. }
            | EngineEvent::UserMuteAudio { uid, .. }
            | EngineEvent::FirstRemoteVideoDecoded { uid, .. } => Some(uid),
            EngineEvent::LeaveChannel | EngineEvent::Error { .. } => None,
        }
    }
}
