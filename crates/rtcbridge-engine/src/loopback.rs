use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{check, EngineError, Result};
use crate::event::EngineEvent;
use crate::traits::{EngineFactory, EventHandler, RtcEngine};
use crate::types::{ChannelProfile, ClientRole, EngineContext, Uid, VideoCanvas, VideoProfile};

/// A call recorded by [`LoopbackEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Initialize { app_id: String },
    SetParameters(String),
    EnableVideo,
    SetVideoProfile(VideoProfile, bool),
    SetChannelProfile(ChannelProfile),
    SetClientRole(ClientRole),
    SetupLocalVideo(VideoCanvas),
    SetupRemoteVideo(VideoCanvas),
    JoinChannel { channel: String, uid: Uid },
    LeaveChannel,
    SwitchCamera,
    MuteLocalAudioStream(bool),
    MuteLocalVideoStream(bool),
    Release,
}

#[derive(Default)]
struct Script {
    init_code: i32,
    init_delay: Duration,
    failing_op: Option<(&'static str, i32)>,
    local_uid: Option<Uid>,
    create_error: Option<String>,
}

#[derive(Default)]
struct LoopbackState {
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
    calls: Mutex<Vec<EngineCall>>,
    script: Mutex<Script>,
    created: AtomicUsize,
    released: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process engine that records every call.
///
/// Events are fired through a [`LoopbackController`], from whichever thread
/// the caller chooses, the way a real engine fires them from its own
/// threads.
pub struct LoopbackEngine {
    state: Arc<LoopbackState>,
}

/// Scripts and observes [`LoopbackEngine`] instances created by its factory.
#[derive(Clone, Default)]
pub struct LoopbackController {
    state: Arc<LoopbackState>,
}

/// [`EngineFactory`] producing engines bound to one controller.
pub struct LoopbackFactory {
    state: Arc<LoopbackState>,
}

impl LoopbackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose engines report to this controller.
    pub fn factory(&self) -> Arc<dyn EngineFactory> {
        Arc::new(LoopbackFactory {
            state: Arc::clone(&self.state),
        })
    }

    /// Make `initialize` return `code`.
    pub fn fail_initialize(&self, code: i32) {
        lock(&self.state.script).init_code = code;
    }

    /// Make the factory fail before an engine exists.
    pub fn fail_create(&self, reason: impl Into<String>) {
        lock(&self.state.script).create_error = Some(reason.into());
    }

    /// Make every call named `op` return `code`.
    pub fn fail_call(&self, op: &'static str, code: i32) {
        lock(&self.state.script).failing_op = Some((op, code));
    }

    /// Sleep inside `initialize`, simulating a slow SDK.
    pub fn set_init_delay(&self, delay: Duration) {
        lock(&self.state.script).init_delay = delay;
    }

    /// Fire join/leave events synchronously from `join_channel` and
    /// `leave_channel`, joining as `uid`.
    pub fn set_local_uid(&self, uid: Uid) {
        lock(&self.state.script).local_uid = Some(uid);
    }

    /// Fire `event` at the registered handler on the calling thread.
    ///
    /// Returns false if no handler is registered (not initialized, or
    /// already released).
    pub fn emit(&self, event: &EngineEvent<'_>) -> bool {
        let handler = lock(&self.state.handler).clone();
        match handler {
            Some(handler) => {
                trace!(event = event.name(), "loopback emit");
                handler.on_event(event);
                true
            }
            None => false,
        }
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state.calls).clone()
    }

    pub fn created_count(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Returns true while a handler is registered.
    pub fn has_handler(&self) -> bool {
        lock(&self.state.handler).is_some()
    }
}

impl EngineFactory for LoopbackFactory {
    fn create(&self) -> Result<Box<dyn RtcEngine>> {
        if let Some(reason) = lock(&self.state.script).create_error.clone() {
            return Err(EngineError::Create(reason));
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LoopbackEngine {
            state: Arc::clone(&self.state),
        }))
    }
}

impl LoopbackEngine {
    fn record(&self, op: &'static str, call: EngineCall) -> Result<()> {
        lock(&self.state.calls).push(call);
        let failing = lock(&self.state.script).failing_op;
        match failing {
            Some((failing_op, code)) if failing_op == op => check(op, code),
            _ => Ok(()),
        }
    }

    fn emit(&self, event: &EngineEvent<'_>) {
        let handler = lock(&self.state.handler).clone();
        if let Some(handler) = handler {
            handler.on_event(event);
        }
    }

    fn local_uid(&self) -> Option<Uid> {
        lock(&self.state.script).local_uid
    }
}

impl RtcEngine for LoopbackEngine {
    fn initialize(
        &mut self,
        context: &EngineContext,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        let (delay, code) = {
            let script = lock(&self.state.script);
            (script.init_delay, script.init_code)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        lock(&self.state.calls).push(EngineCall::Initialize {
            app_id: context.app_id.clone(),
        });
        check("initialize", code)?;

        *lock(&self.state.handler) = Some(handler);
        debug!("loopback engine initialized");
        Ok(())
    }

    fn set_parameters(&mut self, parameters: &str) -> Result<()> {
        self.record(
            "setParameters",
            EngineCall::SetParameters(parameters.to_string()),
        )
    }

    fn enable_video(&mut self) -> Result<()> {
        self.record("enableVideo", EngineCall::EnableVideo)
    }

    fn set_video_profile(
        &mut self,
        profile: VideoProfile,
        swap_width_and_height: bool,
    ) -> Result<()> {
        self.record(
            "setVideoProfile",
            EngineCall::SetVideoProfile(profile, swap_width_and_height),
        )
    }

    fn set_channel_profile(&mut self, profile: ChannelProfile) -> Result<()> {
        self.record("setChannelProfile", EngineCall::SetChannelProfile(profile))
    }

    fn set_client_role(&mut self, role: ClientRole) -> Result<()> {
        self.record("setClientRole", EngineCall::SetClientRole(role))
    }

    fn setup_local_video(&mut self, canvas: &VideoCanvas) -> Result<()> {
        self.record("setupLocalVideo", EngineCall::SetupLocalVideo(*canvas))
    }

    fn setup_remote_video(&mut self, canvas: &VideoCanvas) -> Result<()> {
        self.record("setupRemoteVideo", EngineCall::SetupRemoteVideo(*canvas))
    }

    fn join_channel(
        &mut self,
        _token: Option<&str>,
        channel: &str,
        _info: Option<&str>,
        uid: Uid,
    ) -> Result<()> {
        self.record(
            "joinChannel",
            EngineCall::JoinChannel {
                channel: channel.to_string(),
                uid,
            },
        )?;

        if let Some(local_uid) = self.local_uid() {
            self.emit(&EngineEvent::JoinChannelSuccess {
                channel: channel.as_bytes(),
                uid: if uid == 0 { local_uid } else { uid },
                elapsed_ms: 0,
            });
        }
        Ok(())
    }

    fn leave_channel(&mut self) -> Result<()> {
        self.record("leaveChannel", EngineCall::LeaveChannel)?;
        if self.local_uid().is_some() {
            self.emit(&EngineEvent::LeaveChannel);
        }
        Ok(())
    }

    fn switch_camera(&mut self) -> Result<()> {
        self.record("switchCamera", EngineCall::SwitchCamera)
    }

    fn mute_local_audio_stream(&mut self, mute: bool) -> Result<()> {
        self.record(
            "muteLocalAudioStream",
            EngineCall::MuteLocalAudioStream(mute),
        )
    }

    fn mute_local_video_stream(&mut self, mute: bool) -> Result<()> {
        self.record(
            "muteLocalVideoStream",
            EngineCall::MuteLocalVideoStream(mute),
        )
    }

    fn release(&mut self) {
        lock(&self.state.handler).take();
        lock(&self.state.calls).push(EngineCall::Release);
        self.state.released.fetch_add(1, Ordering::SeqCst);
        debug!("loopback engine released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextHandle;

    #[derive(Default)]
    struct Collect {
        names: Mutex<Vec<&'static str>>,
    }

    impl EventHandler for Collect {
        fn on_event(&self, event: &EngineEvent<'_>) {
            self.names.lock().unwrap().push(event.name());
        }
    }

    fn context() -> EngineContext {
        EngineContext {
            app_id: "app".to_string(),
            context: ContextHandle::from_raw(1),
        }
    }

    #[test]
    fn records_calls_and_emits_after_initialize() {
        let controller = LoopbackController::new();
        let mut engine = controller.factory().create().unwrap();
        let handler = Arc::new(Collect::default());

        assert!(!controller.emit(&EngineEvent::LeaveChannel));
        engine.initialize(&context(), handler.clone()).unwrap();
        engine.enable_video().unwrap();
        assert!(controller.emit(&EngineEvent::UserJoined {
            uid: 9,
            elapsed_ms: 0
        }));

        assert_eq!(
            controller.calls(),
            vec![
                EngineCall::Initialize {
                    app_id: "app".to_string()
                },
                EngineCall::EnableVideo
            ]
        );
        assert_eq!(*handler.names.lock().unwrap(), vec!["user_joined"]);
    }

    #[test]
    fn scripted_failures() {
        let controller = LoopbackController::new();
        controller.fail_call("switchCamera", 4);
        let mut engine = controller.factory().create().unwrap();

        assert_eq!(engine.switch_camera().unwrap_err().code(), 4);
        assert!(engine.enable_video().is_ok());

        controller.fail_initialize(101);
        let err = engine
            .initialize(&context(), Arc::new(Collect::default()))
            .unwrap_err();
        assert_eq!(err.code(), 101);
        assert!(!controller.has_handler());

        controller.fail_create("missing sdk");
        assert!(matches!(
            controller.factory().create(),
            Err(EngineError::Create(_))
        ));
        assert_eq!(controller.created_count(), 1);
    }

    #[test]
    fn release_stops_callbacks() {
        let controller = LoopbackController::new();
        let mut engine = controller.factory().create().unwrap();
        engine
            .initialize(&context(), Arc::new(Collect::default()))
            .unwrap();

        engine.release();
        assert!(!controller.emit(&EngineEvent::LeaveChannel));
        assert_eq!(controller.release_count(), 1);
    }

    #[test]
    fn local_uid_fires_join_success() {
        let controller = LoopbackController::new();
        controller.set_local_uid(42);
        let mut engine = controller.factory().create().unwrap();
        let handler = Arc::new(Collect::default());
        engine.initialize(&context(), handler.clone()).unwrap();

        engine.join_channel(None, "room1", None, 0).unwrap();
        engine.leave_channel().unwrap();

        assert_eq!(
            *handler.names.lock().unwrap(),
            vec!["join_channel_success", "leave_channel"]
        );
    }
}
