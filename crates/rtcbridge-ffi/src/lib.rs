//! rtcbridge-ffi: C-ABI exports for hosting an rtcbridge bridge.
//!
//! The managed runtime installs itself once with `rtc_runtime_attach`. Each
//! bridge is then created against an engine shim table with
//! `rtc_bridge_create`; engine callbacks come back in through
//! `rtc_event_sink_emit` and are delivered to the runtime's `on_message`.

mod args;
mod bridge;
mod engine;
mod error;
mod logging;
mod runtime;
#[cfg(test)]
mod testing;
mod types;

use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

pub use bridge::{
    rtc_bridge_create, rtc_bridge_destroy, rtc_bridge_free, rtc_bridge_join_channel,
    rtc_bridge_leave_channel, rtc_bridge_mute_local_audio_stream,
    rtc_bridge_mute_local_video_stream, rtc_bridge_setup_local_video,
    rtc_bridge_setup_remote_video, rtc_bridge_state, rtc_bridge_switch_camera,
    rtc_bridge_wait_ready,
};
pub use engine::rtc_event_sink_emit;
pub use logging::{init_logging, LogFormat, LogLevel};
pub use runtime::rtc_runtime_attach;
pub use types::{
    RtcBridgeHandle, RtcEngineApi, RtcEngineEvent, RtcEventSinkHandle, RtcRuntimeApi, RtcStatus,
    RTC_ERR_ALREADY_CLOSED, RTC_ERR_ALREADY_INSTALLED, RTC_ERR_ATTACH_FAILED,
    RTC_ERR_CONSTRUCTION_FAILED, RTC_ERR_DELIVERY_FAILED, RTC_ERR_DETACH_FAILED,
    RTC_ERR_ENCODING_OVERFLOW, RTC_ERR_INTERNAL, RTC_ERR_INVALID_ARGUMENT, RTC_ERR_NOT_READY,
    RTC_ERR_REENTRANT, RTC_ERR_RUNTIME_NOT_INSTALLED, RTC_ERR_TIMEOUT, RTC_EVENT_ERROR,
    RTC_EVENT_FIRST_REMOTE_VIDEO_DECODED, RTC_EVENT_JOIN_CHANNEL_SUCCESS, RTC_EVENT_LEAVE_CHANNEL,
    RTC_EVENT_USER_JOINED, RTC_EVENT_USER_MUTE_AUDIO, RTC_EVENT_USER_MUTE_VIDEO,
    RTC_EVENT_USER_OFFLINE, RTC_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Route library logs to stderr. `level` runs from 0 (error) to 4 (trace).
/// Only the first successful call installs a subscriber.
#[no_mangle]
pub extern "C" fn rtc_logging_init(level: i32, json: bool) -> i32 {
    ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        let Some(level) = LogLevel::from_raw(level) else {
            return error::set_invalid_argument(format!("invalid log level {level}"));
        };
        let format = if json { LogFormat::Json } else { LogFormat::Text };
        init_logging(format, level);
        RtcStatus::Ok.code()
    })
}

/// Message for the last failed call on this thread. Empty after a success.
/// The pointer is valid until the next call on the same thread.
#[no_mangle]
pub extern "C" fn rtc_last_error() -> *const c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
