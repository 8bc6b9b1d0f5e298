use std::sync::Arc;

use crate::error::Result;
use crate::event::EngineEvent;
use crate::types::{ChannelProfile, ClientRole, EngineContext, Uid, VideoCanvas, VideoProfile};

/// Receives engine callbacks.
///
/// The engine may call this from any number of its own threads, concurrently
/// with each other and with commands. Implementations must not block
/// indefinitely and must be done with the event before returning.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &EngineEvent<'_>);
}

/// Command surface of one engine instance.
///
/// Every call maps to one SDK call; a nonzero SDK return code becomes
/// [`EngineError::Call`](crate::EngineError::Call).
pub trait RtcEngine: Send {
    /// Initialize the instance and register the callback handler.
    fn initialize(
        &mut self,
        context: &EngineContext,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()>;

    /// Apply a JSON parameter string.
    fn set_parameters(&mut self, parameters: &str) -> Result<()>;

    fn enable_video(&mut self) -> Result<()>;

    fn set_video_profile(
        &mut self,
        profile: VideoProfile,
        swap_width_and_height: bool,
    ) -> Result<()>;

    fn set_channel_profile(&mut self, profile: ChannelProfile) -> Result<()>;

    fn set_client_role(&mut self, role: ClientRole) -> Result<()>;

    fn setup_local_video(&mut self, canvas: &VideoCanvas) -> Result<()>;

    fn setup_remote_video(&mut self, canvas: &VideoCanvas) -> Result<()>;

    fn join_channel(
        &mut self,
        token: Option<&str>,
        channel: &str,
        info: Option<&str>,
        uid: Uid,
    ) -> Result<()>;

    fn leave_channel(&mut self) -> Result<()>;

    fn switch_camera(&mut self) -> Result<()>;

    fn mute_local_audio_stream(&mut self, mute: bool) -> Result<()>;

    fn mute_local_video_stream(&mut self, mute: bool) -> Result<()>;

    /// Release the instance. No callback may fire after this returns.
    fn release(&mut self);
}

/// Creates engine instances.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn RtcEngine>>;
}
