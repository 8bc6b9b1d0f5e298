use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::Arc;

use rtcbridge_core::Bridge;
use rtcbridge_engine::EventHandler;

/// Bridge status codes. Engine codes are returned as positive values, so
/// they never collide with these.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcStatus {
    Ok = 0,
    InvalidArgument = -1,
    NotReady = -2,
    AlreadyClosed = -3,
    AttachFailed = -4,
    EncodingOverflow = -5,
    RuntimeNotInstalled = -6,
    Timeout = -7,
    DeliveryFailed = -8,
    ConstructionFailed = -9,
    AlreadyInstalled = -10,
    DetachFailed = -11,
    Reentrant = -12,
    Internal = -99,
}

impl RtcStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub const RTC_OK: i32 = RtcStatus::Ok as i32;
pub const RTC_ERR_INVALID_ARGUMENT: i32 = RtcStatus::InvalidArgument as i32;
pub const RTC_ERR_NOT_READY: i32 = RtcStatus::NotReady as i32;
pub const RTC_ERR_ALREADY_CLOSED: i32 = RtcStatus::AlreadyClosed as i32;
pub const RTC_ERR_ATTACH_FAILED: i32 = RtcStatus::AttachFailed as i32;
pub const RTC_ERR_ENCODING_OVERFLOW: i32 = RtcStatus::EncodingOverflow as i32;
pub const RTC_ERR_RUNTIME_NOT_INSTALLED: i32 = RtcStatus::RuntimeNotInstalled as i32;
pub const RTC_ERR_TIMEOUT: i32 = RtcStatus::Timeout as i32;
pub const RTC_ERR_DELIVERY_FAILED: i32 = RtcStatus::DeliveryFailed as i32;
pub const RTC_ERR_CONSTRUCTION_FAILED: i32 = RtcStatus::ConstructionFailed as i32;
pub const RTC_ERR_ALREADY_INSTALLED: i32 = RtcStatus::AlreadyInstalled as i32;
pub const RTC_ERR_DETACH_FAILED: i32 = RtcStatus::DetachFailed as i32;
pub const RTC_ERR_REENTRANT: i32 = RtcStatus::Reentrant as i32;
pub const RTC_ERR_INTERNAL: i32 = RtcStatus::Internal as i32;

pub const RTC_EVENT_JOIN_CHANNEL_SUCCESS: u32 = 1;
pub const RTC_EVENT_LEAVE_CHANNEL: u32 = 2;
pub const RTC_EVENT_USER_JOINED: u32 = 3;
pub const RTC_EVENT_USER_OFFLINE: u32 = 4;
pub const RTC_EVENT_USER_MUTE_VIDEO: u32 = 5;
pub const RTC_EVENT_USER_MUTE_AUDIO: u32 = 6;
pub const RTC_EVENT_FIRST_REMOTE_VIDEO_DECODED: u32 = 7;
pub const RTC_EVENT_ERROR: u32 = 8;

/// One engine callback, as reported by the engine shim.
///
/// Only the fields relevant to `kind` are read. `channel` is borrowed for
/// the duration of `rtc_event_sink_emit`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtcEngineEvent {
    pub kind: u32,
    pub uid: u32,
    pub channel: *const u8,
    pub channel_len: usize,
    pub elapsed_ms: i32,
    pub reason: u32,
    pub muted: bool,
    pub width: i32,
    pub height: i32,
    pub code: i32,
}

impl Default for RtcEngineEvent {
    fn default() -> Self {
        Self {
            kind: 0,
            uid: 0,
            channel: std::ptr::null(),
            channel_len: 0,
            elapsed_ms: 0,
            reason: 0,
            muted: false,
            width: 0,
            height: 0,
            code: 0,
        }
    }
}

/// Managed-runtime entry points, installed once per process.
///
/// Every function receives `runtime` as its first argument and acts on the
/// calling thread. All entries are required.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtcRuntimeApi {
    pub runtime: *mut c_void,
    /// Nonzero if the calling thread is attached.
    pub is_attached: Option<unsafe extern "C" fn(runtime: *mut c_void) -> i32>,
    /// Zero on success.
    pub attach_current_thread: Option<unsafe extern "C" fn(runtime: *mut c_void) -> i32>,
    /// Zero on success.
    pub detach_current_thread: Option<unsafe extern "C" fn(runtime: *mut c_void) -> i32>,
    /// Promote `context` to a long-lived target. Null on failure.
    pub new_target:
        Option<unsafe extern "C" fn(runtime: *mut c_void, context: *mut c_void) -> *mut c_void>,
    pub delete_target: Option<unsafe extern "C" fn(runtime: *mut c_void, target: *mut c_void)>,
    /// Deliver `len` bytes of wire image. Zero on success.
    pub on_message: Option<
        unsafe extern "C" fn(
            runtime: *mut c_void,
            target: *mut c_void,
            message_id: u16,
            data: *const u8,
            len: usize,
        ) -> i32,
    >,
    /// Zero on success.
    pub create_remote_view:
        Option<unsafe extern "C" fn(runtime: *mut c_void, target: *mut c_void, uid: u32) -> i32>,
}

/// Engine shim entry points. `user_data` is passed to `create`; every other
/// function receives the engine pointer `create` returned.
///
/// All entries are required. Return codes are the engine's own: zero on
/// success.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtcEngineApi {
    pub user_data: *mut c_void,
    /// Null on failure.
    pub create: Option<unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void>,
    /// `sink` stays valid until `release` returns; pass it to
    /// `rtc_event_sink_emit` for every callback.
    pub initialize: Option<
        unsafe extern "C" fn(
            engine: *mut c_void,
            app_id: *const c_char,
            context: *mut c_void,
            sink: RtcEventSinkHandle,
        ) -> i32,
    >,
    pub set_parameters:
        Option<unsafe extern "C" fn(engine: *mut c_void, parameters: *const c_char) -> i32>,
    pub enable_video: Option<unsafe extern "C" fn(engine: *mut c_void) -> i32>,
    pub set_video_profile:
        Option<unsafe extern "C" fn(engine: *mut c_void, profile: i32, swap: bool) -> i32>,
    pub set_channel_profile: Option<unsafe extern "C" fn(engine: *mut c_void, profile: i32) -> i32>,
    pub set_client_role: Option<unsafe extern "C" fn(engine: *mut c_void, role: i32) -> i32>,
    pub setup_local_video: Option<
        unsafe extern "C" fn(
            engine: *mut c_void,
            view: *mut c_void,
            render_mode: i32,
            uid: u32,
        ) -> i32,
    >,
    pub setup_remote_video: Option<
        unsafe extern "C" fn(
            engine: *mut c_void,
            view: *mut c_void,
            render_mode: i32,
            uid: u32,
        ) -> i32,
    >,
    /// `token` and `info` may be null.
    pub join_channel: Option<
        unsafe extern "C" fn(
            engine: *mut c_void,
            token: *const c_char,
            channel: *const c_char,
            info: *const c_char,
            uid: u32,
        ) -> i32,
    >,
    pub leave_channel: Option<unsafe extern "C" fn(engine: *mut c_void) -> i32>,
    pub switch_camera: Option<unsafe extern "C" fn(engine: *mut c_void) -> i32>,
    pub mute_local_audio_stream:
        Option<unsafe extern "C" fn(engine: *mut c_void, mute: bool) -> i32>,
    pub mute_local_video_stream:
        Option<unsafe extern "C" fn(engine: *mut c_void, mute: bool) -> i32>,
    /// No callback may reach the sink once this returns.
    pub release: Option<unsafe extern "C" fn(engine: *mut c_void)>,
}

pub type RtcBridgeHandle = *mut c_void;
pub type RtcEventSinkHandle = *mut c_void;

pub(crate) struct BridgeHandle {
    pub(crate) bridge: Bridge,
}

pub(crate) struct EventSink {
    pub(crate) handler: Arc<dyn EventHandler>,
}
