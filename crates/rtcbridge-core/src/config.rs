use std::time::Duration;

use rtcbridge_engine::{ChannelProfile, ClientRole, VideoProfile};
use rtcbridge_envelope::{EnvelopeConfig, DEFAULT_MAX_PAYLOAD};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine parameters applied right after initialization.
pub const DEFAULT_ENGINE_PARAMETERS: &str = r#"{"rtc.log_filter": 65535}"#;

/// What a command does while the engine is still being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReadyPolicy {
    /// Fail immediately with `NotReady`.
    Reject,
    /// Block until initialization finishes or `timeout_ms` elapses.
    Wait { timeout_ms: u64 },
}

impl ReadyPolicy {
    pub(crate) fn wait_timeout(self) -> Option<Duration> {
        match self {
            ReadyPolicy::Reject => None,
            ReadyPolicy::Wait { timeout_ms } => Some(Duration::from_millis(timeout_ms)),
        }
    }
}

/// Payload layout of the decimal-encoded events (ids 2-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireSchema {
    /// ASCII decimal fields concatenated without separators.
    Legacy,
    /// Little-endian binary fields.
    Binary,
}

/// Bridge configuration.
///
/// Every field has a default, so `{}` is a valid JSON configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Application id handed to the engine.
    pub app_id: String,
    /// JSON parameter string applied after initialization. `None` skips it.
    pub engine_parameters: Option<String>,
    pub video_profile: VideoProfile,
    pub swap_width_and_height: bool,
    pub channel_profile: ChannelProfile,
    pub client_role: ClientRole,
    pub ready_policy: ReadyPolicy,
    pub wire_schema: WireSchema,
    /// Envelope payload capacity in bytes.
    pub max_payload_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            engine_parameters: Some(DEFAULT_ENGINE_PARAMETERS.to_string()),
            video_profile: VideoProfile::Portrait360p,
            swap_width_and_height: false,
            channel_profile: ChannelProfile::LiveBroadcasting,
            client_role: ClientRole::Broadcaster,
            ready_policy: ReadyPolicy::Reject,
            wire_schema: WireSchema::Legacy,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Envelope settings derived from this configuration.
    pub fn envelope_config(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            max_payload_size: self.max_payload_size,
        }
    }
}
