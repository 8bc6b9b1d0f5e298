use serde::{Deserialize, Serialize};

/// Engine-assigned user id. `0` means "the local user".
pub type Uid = u32;

/// Opaque reference to a rendering surface owned by the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewHandle(usize);

impl ViewHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Opaque application context handed to the engine at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextHandle(usize);

impl ContextHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Values handed to [`RtcEngine::initialize`](crate::RtcEngine::initialize).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineContext {
    pub app_id: String,
    pub context: ContextHandle,
}

/// Capture/encode profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoProfile {
    Landscape360p,
    Landscape480p,
    Landscape720p,
    Portrait360p,
    Portrait480p,
    Portrait720p,
}

impl VideoProfile {
    pub fn as_raw(self) -> i32 {
        match self {
            VideoProfile::Landscape360p => 30,
            VideoProfile::Landscape480p => 40,
            VideoProfile::Landscape720p => 50,
            VideoProfile::Portrait360p => 1030,
            VideoProfile::Portrait480p => 1040,
            VideoProfile::Portrait720p => 1050,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelProfile {
    Communication,
    LiveBroadcasting,
    Game,
}

impl ChannelProfile {
    pub fn as_raw(self) -> i32 {
        match self {
            ChannelProfile::Communication => 0,
            ChannelProfile::LiveBroadcasting => 1,
            ChannelProfile::Game => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Broadcaster,
    Audience,
}

impl ClientRole {
    pub fn as_raw(self) -> i32 {
        match self {
            ClientRole::Broadcaster => 1,
            ClientRole::Audience => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Fill the view, cropping as needed.
    Hidden,
    /// Fit the whole frame, letterboxing as needed.
    Fit,
    Adaptive,
}

impl RenderMode {
    pub fn as_raw(self) -> i32 {
        match self {
            RenderMode::Hidden => 1,
            RenderMode::Fit => 2,
            RenderMode::Adaptive => 3,
        }
    }
}

/// Binds a video stream to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCanvas {
    pub view: ViewHandle,
    pub render_mode: RenderMode,
    pub uid: Uid,
}

impl VideoCanvas {
    /// Canvas for the local preview.
    pub fn local(view: ViewHandle) -> Self {
        Self {
            view,
            render_mode: RenderMode::Hidden,
            uid: 0,
        }
    }

    /// Canvas for a remote user's stream.
    pub fn remote(view: ViewHandle, uid: Uid) -> Self {
        Self {
            view,
            render_mode: RenderMode::Hidden,
            uid,
        }
    }
}

/// Why a remote user went offline.
///
/// Codes this crate does not know are kept as [`Other`](Self::Other) and
/// encoded exactly as the SDK reported them. Codes above 9 take more than
/// one decimal digit, which the legacy wire format cannot tell apart from
/// the uid digits before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    /// The user left the channel.
    Quit,
    /// No data was received for too long.
    Dropped,
    /// A broadcaster switched to audience.
    BecomeAudience,
    /// A code newer than this crate.
    Other(u32),
}

impl OfflineReason {
    pub fn as_raw(self) -> u32 {
        match self {
            OfflineReason::Quit => 0,
            OfflineReason::Dropped => 1,
            OfflineReason::BecomeAudience => 2,
            OfflineReason::Other(raw) => raw,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => OfflineReason::Quit,
            1 => OfflineReason::Dropped,
            2 => OfflineReason::BecomeAudience,
            other => OfflineReason::Other(other),
        }
    }
}
