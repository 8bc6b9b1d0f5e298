//! C-side doubles for the runtime and engine tables.

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::time::Duration;

use rtcbridge_core::{AttachState, CallbackTarget, ManagedRuntime, RecordingRuntime};
use rtcbridge_engine::ContextHandle;

use crate::engine::rtc_event_sink_emit;
use crate::runtime::rtc_runtime_attach;
use crate::types::{RtcEngineApi, RtcEngineEvent, RtcEventSinkHandle, RtcRuntimeApi};

static RECORDING: OnceLock<RecordingRuntime> = OnceLock::new();

/// The runtime behind the process-wide table.
pub(crate) fn recording() -> &'static RecordingRuntime {
    RECORDING.get_or_init(RecordingRuntime::new)
}

fn runtime_ref<'a>(runtime: *mut c_void) -> &'a RecordingRuntime {
    // SAFETY: Every table built here points at the static recording runtime.
    unsafe { &*(runtime as *const RecordingRuntime) }
}

fn code<T>(result: Result<T, rtcbridge_core::RuntimeError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.code,
    }
}

unsafe extern "C" fn is_attached(runtime: *mut c_void) -> i32 {
    i32::from(runtime_ref(runtime).attach_state() == AttachState::Attached)
}

unsafe extern "C" fn attach(runtime: *mut c_void) -> i32 {
    code(runtime_ref(runtime).attach_current_thread())
}

unsafe extern "C" fn detach(runtime: *mut c_void) -> i32 {
    code(runtime_ref(runtime).detach_current_thread())
}

unsafe extern "C" fn new_target(runtime: *mut c_void, context: *mut c_void) -> *mut c_void {
    match runtime_ref(runtime).acquire_target(ContextHandle::from_raw(context as usize)) {
        Ok(target) => target.as_raw() as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn delete_target(runtime: *mut c_void, target: *mut c_void) {
    let _ = runtime_ref(runtime).release_target(CallbackTarget::from_raw(target as usize));
}

unsafe extern "C" fn on_message(
    runtime: *mut c_void,
    target: *mut c_void,
    message_id: u16,
    data: *const u8,
    len: usize,
) -> i32 {
    // SAFETY: The bridge passes a live wire image.
    let wire = unsafe { std::slice::from_raw_parts(data, len) };
    code(runtime_ref(runtime).deliver(CallbackTarget::from_raw(target as usize), message_id, wire))
}

unsafe extern "C" fn create_remote_view(
    runtime: *mut c_void,
    target: *mut c_void,
    uid: u32,
) -> i32 {
    code(runtime_ref(runtime).create_remote_view(CallbackTarget::from_raw(target as usize), uid))
}

pub(crate) fn runtime_api() -> RtcRuntimeApi {
    RtcRuntimeApi {
        runtime: recording() as *const RecordingRuntime as *mut c_void,
        is_attached: Some(is_attached),
        attach_current_thread: Some(attach),
        detach_current_thread: Some(detach),
        new_target: Some(new_target),
        delete_target: Some(delete_target),
        on_message: Some(on_message),
        create_remote_view: Some(create_remote_view),
    }
}

/// Install the recording runtime as the process-wide runtime.
pub(crate) fn install_runtime() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let api = runtime_api();
        // SAFETY: `api` is a complete table on the stack.
        let status = unsafe { rtc_runtime_attach(&api) };
        assert_eq!(status, 0, "runtime install should succeed");
    });
}

/// Scriptable engine shim. Engines it creates point back at it.
#[derive(Default)]
pub(crate) struct FakeSdk {
    calls: Mutex<Vec<String>>,
    sink: Mutex<usize>,
    init_code: AtomicI32,
    join_code: AtomicI32,
    init_delay_ms: AtomicU64,
    fail_create: AtomicBool,
    created: AtomicUsize,
    released: AtomicUsize,
}

struct FakeEngine {
    sdk: *const FakeSdk,
}

fn sdk_of<'a>(engine: *mut c_void) -> &'a FakeSdk {
    // SAFETY: Engines are only created by `fake_create`, and the test keeps
    // the sdk alive past the engine's release.
    unsafe { &*(*(engine as *const FakeEngine)).sdk }
}

fn c_str(value: *const c_char) -> String {
    // SAFETY: The bridge passes valid C strings.
    unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
}

impl FakeSdk {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn engine_api(self: &Arc<Self>) -> RtcEngineApi {
        RtcEngineApi {
            user_data: Arc::as_ptr(self) as *mut c_void,
            create: Some(fake_create),
            initialize: Some(fake_initialize),
            set_parameters: Some(fake_set_parameters),
            enable_video: Some(fake_enable_video),
            set_video_profile: Some(fake_set_video_profile),
            set_channel_profile: Some(fake_set_channel_profile),
            set_client_role: Some(fake_set_client_role),
            setup_local_video: Some(fake_setup_local_video),
            setup_remote_video: Some(fake_setup_remote_video),
            join_channel: Some(fake_join_channel),
            leave_channel: Some(fake_leave_channel),
            switch_camera: Some(fake_switch_camera),
            mute_local_audio_stream: Some(fake_mute_local_audio_stream),
            mute_local_video_stream: Some(fake_mute_local_video_stream),
            release: Some(fake_release),
        }
    }

    pub(crate) fn set_init_code(&self, code: i32) {
        self.init_code.store(code, Ordering::SeqCst);
    }

    pub(crate) fn set_join_code(&self, code: i32) {
        self.join_code.store(code, Ordering::SeqCst);
    }

    pub(crate) fn set_init_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.init_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub(crate) fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Fire `event` through the registered sink, the way an engine thread
    /// would. Returns -100 if no sink is registered.
    pub(crate) fn emit(&self, event: &RtcEngineEvent) -> i32 {
        let sink = self.sink.lock().unwrap();
        if *sink == 0 {
            return -100;
        }
        // SAFETY: The sink stays registered, and so allocated, while the
        // lock is held; release clears it under the same lock.
        unsafe { rtc_event_sink_emit(*sink as RtcEventSinkHandle, event) }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

unsafe extern "C" fn fake_create(user_data: *mut c_void) -> *mut c_void {
    // SAFETY: `user_data` is the sdk set by `engine_api`.
    let sdk = unsafe { &*(user_data as *const FakeSdk) };
    if sdk.fail_create.load(Ordering::SeqCst) {
        return std::ptr::null_mut();
    }
    sdk.created.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(FakeEngine {
        sdk: user_data as *const FakeSdk,
    })) as *mut c_void
}

unsafe extern "C" fn fake_initialize(
    engine: *mut c_void,
    app_id: *const c_char,
    _context: *mut c_void,
    sink: RtcEventSinkHandle,
) -> i32 {
    let sdk = sdk_of(engine);
    let delay = sdk.init_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        std::thread::sleep(Duration::from_millis(delay));
    }
    sdk.record(format!("initialize:{}", c_str(app_id)));
    let code = sdk.init_code.load(Ordering::SeqCst);
    if code == 0 {
        *sdk.sink.lock().unwrap() = sink as usize;
    }
    code
}

unsafe extern "C" fn fake_set_parameters(engine: *mut c_void, parameters: *const c_char) -> i32 {
    sdk_of(engine).record(format!("setParameters:{}", c_str(parameters)));
    0
}

unsafe extern "C" fn fake_enable_video(engine: *mut c_void) -> i32 {
    sdk_of(engine).record("enableVideo".to_string());
    0
}

unsafe extern "C" fn fake_set_video_profile(engine: *mut c_void, profile: i32, swap: bool) -> i32 {
    sdk_of(engine).record(format!("setVideoProfile:{profile}:{swap}"));
    0
}

unsafe extern "C" fn fake_set_channel_profile(engine: *mut c_void, profile: i32) -> i32 {
    sdk_of(engine).record(format!("setChannelProfile:{profile}"));
    0
}

unsafe extern "C" fn fake_set_client_role(engine: *mut c_void, role: i32) -> i32 {
    sdk_of(engine).record(format!("setClientRole:{role}"));
    0
}

unsafe extern "C" fn fake_setup_local_video(
    engine: *mut c_void,
    _view: *mut c_void,
    _render_mode: i32,
    uid: u32,
) -> i32 {
    sdk_of(engine).record(format!("setupLocalVideo:{uid}"));
    0
}

unsafe extern "C" fn fake_setup_remote_video(
    engine: *mut c_void,
    _view: *mut c_void,
    _render_mode: i32,
    uid: u32,
) -> i32 {
    sdk_of(engine).record(format!("setupRemoteVideo:{uid}"));
    0
}

unsafe extern "C" fn fake_join_channel(
    engine: *mut c_void,
    _token: *const c_char,
    channel: *const c_char,
    _info: *const c_char,
    _uid: u32,
) -> i32 {
    let sdk = sdk_of(engine);
    sdk.record(format!("joinChannel:{}", c_str(channel)));
    sdk.join_code.load(Ordering::SeqCst)
}

unsafe extern "C" fn fake_leave_channel(engine: *mut c_void) -> i32 {
    sdk_of(engine).record("leaveChannel".to_string());
    0
}

unsafe extern "C" fn fake_switch_camera(engine: *mut c_void) -> i32 {
    sdk_of(engine).record("switchCamera".to_string());
    0
}

unsafe extern "C" fn fake_mute_local_audio_stream(engine: *mut c_void, mute: bool) -> i32 {
    sdk_of(engine).record(format!("muteLocalAudioStream:{mute}"));
    0
}

unsafe extern "C" fn fake_mute_local_video_stream(engine: *mut c_void, mute: bool) -> i32 {
    sdk_of(engine).record(format!("muteLocalVideoStream:{mute}"));
    0
}

unsafe extern "C" fn fake_release(engine: *mut c_void) {
    let sdk = sdk_of(engine);
    *sdk.sink.lock().unwrap() = 0;
    sdk.record("release".to_string());
    sdk.released.fetch_add(1, Ordering::SeqCst);
    // SAFETY: Allocated by `fake_create`, released once.
    unsafe { drop(Box::from_raw(engine as *mut FakeEngine)) };
}
