use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::Arc;
use std::time::Duration;

use rtcbridge_core::{Bridge, BridgeConfig, InitMode, RuntimeHandle};
use rtcbridge_engine::{ContextHandle, ViewHandle};

use crate::args;
use crate::engine::ForeignEngineFactory;
use crate::error;
use crate::types::{BridgeHandle, RtcBridgeHandle, RtcEngineApi, RtcStatus};

fn with_bridge(handle: RtcBridgeHandle, f: impl FnOnce(&Bridge) -> i32) -> i32 {
    if handle.is_null() {
        return error::set_invalid_argument("bridge handle cannot be null");
    }

    let bridge_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *const BridgeHandle) }
    };

    f(&bridge_handle.bridge)
}

fn status(result: rtcbridge_core::Result<()>) -> i32 {
    match result {
        Ok(()) => RtcStatus::Ok.code(),
        Err(err) => error::map_bridge_error(&err),
    }
}

/// Create a bridge for the managed object `context`.
///
/// Must be called on a thread the managed runtime knows about; the callback
/// target is acquired here. With `async_init` the engine is constructed on a
/// background thread and construction failures surface through
/// `rtc_bridge_wait_ready`; otherwise they are returned here, as positive
/// engine codes, and no handle is written.
///
/// # Safety
/// `api` must point to a valid engine table whose `user_data` outlives the
/// bridge. `config_json` must be null or a valid C string. `out` must be a
/// non-null writable pointer.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_create(
    api: *const RtcEngineApi,
    context: *mut c_void,
    async_init: bool,
    config_json: *const c_char,
    out: *mut RtcBridgeHandle,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        if out.is_null() {
            return error::set_invalid_argument("out cannot be null");
        }
        if api.is_null() {
            return error::set_invalid_argument("engine api cannot be null");
        }
        let api = {
            // SAFETY: Pointer validity is guaranteed by the caller.
            unsafe { &*api }
        };
        let Some(factory) = ForeignEngineFactory::from_api(api) else {
            return error::set_invalid_argument("engine api has a null entry point");
        };

        let config_json = {
            // SAFETY: We validate UTF-8 in helper; null is allowed.
            match unsafe { args::optional_str_arg(config_json, "config_json") } {
                Some(v) => v,
                None => return RtcStatus::InvalidArgument.code(),
            }
        };
        let config = match config_json.map(BridgeConfig::from_json).transpose() {
            Ok(config) => config.unwrap_or_default(),
            Err(err) => return error::map_bridge_error(&err),
        };

        let runtime = match RuntimeHandle::global() {
            Ok(runtime) => runtime,
            Err(err) => return error::map_bridge_error(&err),
        };
        let mode = if async_init {
            InitMode::Async
        } else {
            InitMode::Sync
        };

        match Bridge::create(
            Arc::new(factory),
            runtime,
            ContextHandle::from_raw(context as usize),
            config,
            mode,
        ) {
            Ok(bridge) => {
                let handle = Box::into_raw(Box::new(BridgeHandle { bridge })) as RtcBridgeHandle;
                // SAFETY: Pointer was checked for null above.
                unsafe {
                    *out = handle;
                }
                RtcStatus::Ok.code()
            }
            Err(err) => error::map_bridge_error(&err),
        }
    })
}

/// Bind the local preview to `view`.
///
/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_setup_local_video(
    handle: RtcBridgeHandle,
    view: *mut c_void,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| {
            status(bridge.setup_local_video(ViewHandle::from_raw(view as usize)))
        })
    })
}

/// Bind the stream of remote user `uid` to `view`.
///
/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_setup_remote_video(
    handle: RtcBridgeHandle,
    uid: u32,
    view: *mut c_void,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| {
            status(bridge.setup_remote_video(uid, ViewHandle::from_raw(view as usize)))
        })
    })
}

/// Join `channel` as an automatically assigned uid.
///
/// # Safety
/// `handle` must be a valid bridge handle and `channel` a valid UTF-8 C
/// string.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_join_channel(
    handle: RtcBridgeHandle,
    channel: *const c_char,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        let channel = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(channel, "channel") } {
                Some(v) => v,
                None => return RtcStatus::InvalidArgument.code(),
            }
        };

        with_bridge(handle, |bridge| status(bridge.join_channel(channel)))
    })
}

/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_leave_channel(handle: RtcBridgeHandle) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| status(bridge.leave_channel()))
    })
}

/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_switch_camera(handle: RtcBridgeHandle) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| status(bridge.switch_camera()))
    })
}

/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_mute_local_audio_stream(
    handle: RtcBridgeHandle,
    mute: bool,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| status(bridge.mute_local_audio_stream(mute)))
    })
}

/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_mute_local_video_stream(
    handle: RtcBridgeHandle,
    mute: bool,
) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| status(bridge.mute_local_video_stream(mute)))
    })
}

/// Tear the bridge down. Blocks until a background initializer finishes.
///
/// The handle stays valid for `rtc_bridge_state` and further
/// `rtc_bridge_destroy` calls, which return `RTC_ERR_ALREADY_CLOSED`, until
/// `rtc_bridge_free`.
///
/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_destroy(handle: RtcBridgeHandle) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| status(bridge.destroy()))
    })
}

/// Free a bridge handle, tearing it down first if needed.
///
/// # Safety
/// `handle` must be null or a handle returned by `rtc_bridge_create`, not
/// yet freed.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_free(handle: RtcBridgeHandle) {
    crate::ffi_boundary((), || {
        if handle.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by rtc_bridge_create.
        unsafe {
            drop(Box::from_raw(handle as *mut BridgeHandle));
        }
    });
}

/// Current lifecycle state: 0 uninitialized, 1 initializing, 2 ready,
/// 3 draining, 4 closed.
///
/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_state(handle: RtcBridgeHandle) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| bridge.state().as_raw())
    })
}

/// Wait for engine construction. A negative `timeout_ms` waits without
/// limit.
///
/// Returns 0 once ready, `RTC_ERR_TIMEOUT` if construction is still running
/// at the deadline, or the construction failure.
///
/// # Safety
/// `handle` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn rtc_bridge_wait_ready(handle: RtcBridgeHandle, timeout_ms: i64) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        with_bridge(handle, |bridge| match bridge.wait_ready(timeout) {
            Ok(()) => RtcStatus::Ok.code(),
            Err(err) => error::map_wait_error(&err),
        })
    })
}
