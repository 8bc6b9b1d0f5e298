use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use rtcbridge_engine::{
    check, ChannelProfile, ClientRole, EngineContext, EngineError, EngineEvent, EngineFactory,
    EventHandler, OfflineReason, RtcEngine, Uid, VideoCanvas, VideoProfile, ERR_INVALID_ARGUMENT,
};
use tracing::debug;

use crate::args;
use crate::error;
use crate::types::{
    EventSink, RtcEngineApi, RtcEngineEvent, RtcEventSinkHandle, RtcStatus, RTC_EVENT_ERROR,
    RTC_EVENT_FIRST_REMOTE_VIDEO_DECODED, RTC_EVENT_JOIN_CHANNEL_SUCCESS, RTC_EVENT_LEAVE_CHANNEL,
    RTC_EVENT_USER_JOINED, RTC_EVENT_USER_MUTE_AUDIO, RTC_EVENT_USER_MUTE_VIDEO,
    RTC_EVENT_USER_OFFLINE,
};

type EngineFn = unsafe extern "C" fn(*mut c_void) -> i32;
type EngineIntFn = unsafe extern "C" fn(*mut c_void, i32) -> i32;
type EngineBoolFn = unsafe extern "C" fn(*mut c_void, bool) -> i32;
type CanvasFn = unsafe extern "C" fn(*mut c_void, *mut c_void, i32, u32) -> i32;
type InitializeFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_void, RtcEventSinkHandle) -> i32;
type JoinFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *const c_char, u32) -> i32;

/// Validated copy of an [`RtcEngineApi`].
#[derive(Clone, Copy)]
struct EngineVtable {
    create: unsafe extern "C" fn(*mut c_void) -> *mut c_void,
    initialize: InitializeFn,
    set_parameters: unsafe extern "C" fn(*mut c_void, *const c_char) -> i32,
    enable_video: EngineFn,
    set_video_profile: unsafe extern "C" fn(*mut c_void, i32, bool) -> i32,
    set_channel_profile: EngineIntFn,
    set_client_role: EngineIntFn,
    setup_local_video: CanvasFn,
    setup_remote_video: CanvasFn,
    join_channel: JoinFn,
    leave_channel: EngineFn,
    switch_camera: EngineFn,
    mute_local_audio_stream: EngineBoolFn,
    mute_local_video_stream: EngineBoolFn,
    release: unsafe extern "C" fn(*mut c_void),
}

impl EngineVtable {
    fn from_api(api: &RtcEngineApi) -> Option<Self> {
        Some(Self {
            create: api.create?,
            initialize: api.initialize?,
            set_parameters: api.set_parameters?,
            enable_video: api.enable_video?,
            set_video_profile: api.set_video_profile?,
            set_channel_profile: api.set_channel_profile?,
            set_client_role: api.set_client_role?,
            setup_local_video: api.setup_local_video?,
            setup_remote_video: api.setup_remote_video?,
            join_channel: api.join_channel?,
            leave_channel: api.leave_channel?,
            switch_camera: api.switch_camera?,
            mute_local_audio_stream: api.mute_local_audio_stream?,
            mute_local_video_stream: api.mute_local_video_stream?,
            release: api.release?,
        })
    }
}

/// [`EngineFactory`] backed by a caller-supplied [`RtcEngineApi`].
pub(crate) struct ForeignEngineFactory {
    user_data: *mut c_void,
    vtable: EngineVtable,
}

// SAFETY: The engine shim contract allows `create` from any thread;
// `user_data` is only passed back to it.
unsafe impl Send for ForeignEngineFactory {}
// SAFETY: See above; no Rust-side mutable state.
unsafe impl Sync for ForeignEngineFactory {}

impl ForeignEngineFactory {
    /// Copy the table, or `None` if any entry is missing.
    pub(crate) fn from_api(api: &RtcEngineApi) -> Option<Self> {
        Some(Self {
            user_data: api.user_data,
            vtable: EngineVtable::from_api(api)?,
        })
    }
}

impl EngineFactory for ForeignEngineFactory {
    fn create(&self) -> rtcbridge_engine::Result<Box<dyn RtcEngine>> {
        // SAFETY: Entry point validated in `from_api`.
        let engine = unsafe { (self.vtable.create)(self.user_data) };
        if engine.is_null() {
            return Err(EngineError::Create("engine shim returned null".to_string()));
        }
        Ok(Box::new(ForeignEngine {
            engine,
            vtable: self.vtable,
            sink: std::ptr::null_mut(),
            released: false,
        }))
    }
}

/// One engine instance created through the shim.
struct ForeignEngine {
    engine: *mut c_void,
    vtable: EngineVtable,
    /// Boxed [`EventSink`] handed to the shim; freed after `release`.
    sink: *mut EventSink,
    released: bool,
}

// SAFETY: The engine owner serializes every call on this instance behind
// its lock; the shim accepts calls from any thread.
unsafe impl Send for ForeignEngine {}

fn c_string(op: &'static str, value: &str) -> rtcbridge_engine::Result<CString> {
    CString::new(value).map_err(|_| EngineError::Call {
        op,
        code: ERR_INVALID_ARGUMENT,
    })
}

fn optional_c_string(
    op: &'static str,
    value: Option<&str>,
) -> rtcbridge_engine::Result<Option<CString>> {
    value.map(|value| c_string(op, value)).transpose()
}

fn opt_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(std::ptr::null(), |value| value.as_ptr())
}

impl ForeignEngine {
    fn canvas(
        &self,
        op: &'static str,
        setup: CanvasFn,
        canvas: &VideoCanvas,
    ) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer; the view is the caller's opaque handle.
        let code = unsafe {
            setup(
                self.engine,
                canvas.view.as_raw() as *mut c_void,
                canvas.render_mode.as_raw(),
                canvas.uid,
            )
        };
        check(op, code)
    }
}

impl RtcEngine for ForeignEngine {
    fn initialize(
        &mut self,
        context: &EngineContext,
        handler: Arc<dyn EventHandler>,
    ) -> rtcbridge_engine::Result<()> {
        let app_id = c_string("initialize", &context.app_id)?;
        if self.sink.is_null() {
            self.sink = Box::into_raw(Box::new(EventSink { handler }));
        }
        // SAFETY: Live engine pointer; `app_id` outlives the call; the sink
        // stays allocated until after `release`.
        let code = unsafe {
            (self.vtable.initialize)(
                self.engine,
                app_id.as_ptr(),
                context.context.as_raw() as *mut c_void,
                self.sink as RtcEventSinkHandle,
            )
        };
        check("initialize", code)
    }

    fn set_parameters(&mut self, parameters: &str) -> rtcbridge_engine::Result<()> {
        let parameters = c_string("setParameters", parameters)?;
        // SAFETY: Live engine pointer; the string outlives the call.
        let code = unsafe { (self.vtable.set_parameters)(self.engine, parameters.as_ptr()) };
        check("setParameters", code)
    }

    fn enable_video(&mut self) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        check("enableVideo", unsafe { (self.vtable.enable_video)(self.engine) })
    }

    fn set_video_profile(
        &mut self,
        profile: VideoProfile,
        swap_width_and_height: bool,
    ) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        let code = unsafe {
            (self.vtable.set_video_profile)(self.engine, profile.as_raw(), swap_width_and_height)
        };
        check("setVideoProfile", code)
    }

    fn set_channel_profile(&mut self, profile: ChannelProfile) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        let code = unsafe { (self.vtable.set_channel_profile)(self.engine, profile.as_raw()) };
        check("setChannelProfile", code)
    }

    fn set_client_role(&mut self, role: ClientRole) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        let code = unsafe { (self.vtable.set_client_role)(self.engine, role.as_raw()) };
        check("setClientRole", code)
    }

    fn setup_local_video(&mut self, canvas: &VideoCanvas) -> rtcbridge_engine::Result<()> {
        self.canvas("setupLocalVideo", self.vtable.setup_local_video, canvas)
    }

    fn setup_remote_video(&mut self, canvas: &VideoCanvas) -> rtcbridge_engine::Result<()> {
        self.canvas("setupRemoteVideo", self.vtable.setup_remote_video, canvas)
    }

    fn join_channel(
        &mut self,
        token: Option<&str>,
        channel: &str,
        info: Option<&str>,
        uid: Uid,
    ) -> rtcbridge_engine::Result<()> {
        let token = optional_c_string("joinChannel", token)?;
        let channel = c_string("joinChannel", channel)?;
        let info = optional_c_string("joinChannel", info)?;
        // SAFETY: Live engine pointer; all strings outlive the call.
        let code = unsafe {
            (self.vtable.join_channel)(
                self.engine,
                opt_ptr(&token),
                channel.as_ptr(),
                opt_ptr(&info),
                uid,
            )
        };
        check("joinChannel", code)
    }

    fn leave_channel(&mut self) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        check("leaveChannel", unsafe { (self.vtable.leave_channel)(self.engine) })
    }

    fn switch_camera(&mut self) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        check("switchCamera", unsafe { (self.vtable.switch_camera)(self.engine) })
    }

    fn mute_local_audio_stream(&mut self, mute: bool) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        let code = unsafe { (self.vtable.mute_local_audio_stream)(self.engine, mute) };
        check("muteLocalAudioStream", code)
    }

    fn mute_local_video_stream(&mut self, mute: bool) -> rtcbridge_engine::Result<()> {
        // SAFETY: Live engine pointer.
        let code = unsafe { (self.vtable.mute_local_video_stream)(self.engine, mute) };
        check("muteLocalVideoStream", code)
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        // SAFETY: Live engine pointer, released exactly once.
        unsafe { (self.vtable.release)(self.engine) };
        if !self.sink.is_null() {
            // SAFETY: Allocated in `initialize`; the shim no longer uses it
            // once `release` has returned.
            unsafe { drop(Box::from_raw(self.sink)) };
            self.sink = std::ptr::null_mut();
        }
        debug!("engine shim released");
    }
}

impl Drop for ForeignEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Convert a C event into an [`EngineEvent`] borrowing from it.
///
/// # Safety
/// If `raw.channel_len > 0`, `raw.channel` must be readable for that many
/// bytes for `'a`.
unsafe fn engine_event<'a>(raw: &'a RtcEngineEvent) -> Option<EngineEvent<'a>> {
    let event = match raw.kind {
        RTC_EVENT_JOIN_CHANNEL_SUCCESS => EngineEvent::JoinChannelSuccess {
            // SAFETY: Pointer/length pairing is the caller's contract.
            channel: unsafe { args::bytes_arg(raw.channel, raw.channel_len, "channel") }?,
            uid: raw.uid,
            elapsed_ms: raw.elapsed_ms,
        },
        RTC_EVENT_LEAVE_CHANNEL => EngineEvent::LeaveChannel,
        RTC_EVENT_USER_JOINED => EngineEvent::UserJoined {
            uid: raw.uid,
            elapsed_ms: raw.elapsed_ms,
        },
        RTC_EVENT_USER_OFFLINE => EngineEvent::UserOffline {
            uid: raw.uid,
            reason: OfflineReason::from_raw(raw.reason),
        },
        RTC_EVENT_USER_MUTE_VIDEO => EngineEvent::UserMuteVideo {
            uid: raw.uid,
            muted: raw.muted,
        },
        RTC_EVENT_USER_MUTE_AUDIO => EngineEvent::UserMuteAudio {
            uid: raw.uid,
            muted: raw.muted,
        },
        RTC_EVENT_FIRST_REMOTE_VIDEO_DECODED => EngineEvent::FirstRemoteVideoDecoded {
            uid: raw.uid,
            width: raw.width,
            height: raw.height,
            elapsed_ms: raw.elapsed_ms,
        },
        RTC_EVENT_ERROR => EngineEvent::Error { code: raw.code },
        other => {
            let _ = error::set_invalid_argument(format!("unknown event kind {other}"));
            return None;
        }
    };
    Some(event)
}

/// Report one engine callback. Call from the engine thread that received
/// it; delivery to the managed runtime happens before this returns.
///
/// # Safety
/// `sink` must be the sink passed to the shim's `initialize`, and the
/// engine must not have been released. `event` must be null or point to a
/// valid `RtcEngineEvent` whose `channel` is readable for `channel_len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn rtc_event_sink_emit(
    sink: RtcEventSinkHandle,
    event: *const RtcEngineEvent,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        if sink.is_null() {
            return error::set_invalid_argument("event sink cannot be null");
        }
        if event.is_null() {
            return error::set_invalid_argument("event cannot be null");
        }

        let (sink, raw) = {
            // SAFETY: Pointer validity is guaranteed by the caller.
            unsafe { (&*(sink as *const EventSink), &*event) }
        };
        // SAFETY: Channel pointer/length pairing is guaranteed by the caller.
        match unsafe { engine_event(raw) } {
            Some(event) => {
                let handler = Arc::clone(&sink.handler);
                handler.on_event(&event);
                RtcStatus::Ok.code()
            }
            None => RtcStatus::InvalidArgument.code(),
        }
    })
}
