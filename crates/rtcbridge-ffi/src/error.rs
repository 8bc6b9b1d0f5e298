use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use rtcbridge_core::{BridgeError, BridgeState};

use crate::types::RtcStatus;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::new("").expect("empty CString should be valid"));
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new("").expect("empty CString should be valid");
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized)
            .unwrap_or_else(|_| CString::new("internal error").expect("literal is valid"));
    });
}

pub(crate) fn set_status(status: RtcStatus, message: impl Into<String>) -> i32 {
    set_error_message(message);
    status.code()
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> i32 {
    set_status(RtcStatus::InvalidArgument, message)
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

/// Engine return codes cross the boundary as positive values.
pub(crate) fn engine_status(code: i32) -> i32 {
    match code.saturating_abs() {
        0 => RtcStatus::Internal.code(),
        code => code,
    }
}

pub(crate) fn map_bridge_error(err: &BridgeError) -> i32 {
    set_error_message(err.to_string());
    match err {
        BridgeError::ConstructionFailed(code) => engine_status(*code),
        BridgeError::Engine(err) => engine_status(err.code()),
        BridgeError::NotReady(_) => RtcStatus::NotReady.code(),
        BridgeError::Reentrant(_) => RtcStatus::Reentrant.code(),
        BridgeError::AlreadyClosed => RtcStatus::AlreadyClosed.code(),
        BridgeError::AttachFailed(_) => RtcStatus::AttachFailed.code(),
        BridgeError::DetachFailed(_) => RtcStatus::DetachFailed.code(),
        BridgeError::Delivery(_) | BridgeError::TargetUnavailable(_) => {
            RtcStatus::DeliveryFailed.code()
        }
        BridgeError::Encoding(_) => RtcStatus::EncodingOverflow.code(),
        BridgeError::RuntimeNotInstalled => RtcStatus::RuntimeNotInstalled.code(),
        BridgeError::RuntimeAlreadyInstalled => RtcStatus::AlreadyInstalled.code(),
        BridgeError::InitializerSpawn(_) | BridgeError::InitializerPanicked => {
            RtcStatus::ConstructionFailed.code()
        }
        BridgeError::Config(_) => RtcStatus::InvalidArgument.code(),
    }
}

/// Like [`map_bridge_error`], but a wait that ran out while the engine was
/// still initializing reports `Timeout`.
pub(crate) fn map_wait_error(err: &BridgeError) -> i32 {
    match err {
        BridgeError::NotReady(BridgeState::Initializing) => {
            set_status(RtcStatus::Timeout, "timed out waiting for engine")
        }
        other => map_bridge_error(other),
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use rtcbridge_engine::EngineError;

    use super::*;

    fn last_error() -> String {
        // SAFETY: last_error_ptr points to the thread-local CString.
        unsafe { CStr::from_ptr(last_error_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn engine_codes_are_positive() {
        assert_eq!(engine_status(-17), 17);
        assert_eq!(engine_status(3), 3);
        assert_eq!(engine_status(i32::MIN), i32::MAX);
        assert_eq!(
            map_bridge_error(&BridgeError::Engine(EngineError::Call {
                op: "joinChannel",
                code: -2
            })),
            2
        );
        assert_eq!(map_bridge_error(&BridgeError::ConstructionFailed(101)), 101);
    }

    #[test]
    fn bridge_errors_map_to_negative_status() {
        assert_eq!(
            map_bridge_error(&BridgeError::NotReady(BridgeState::Draining)),
            crate::types::RTC_ERR_NOT_READY
        );
        assert!(last_error().contains("draining"));
        assert_eq!(
            map_bridge_error(&BridgeError::AlreadyClosed),
            RtcStatus::AlreadyClosed.code()
        );
        assert_eq!(
            map_bridge_error(&BridgeError::Reentrant("switchCamera")),
            crate::types::RTC_ERR_REENTRANT
        );
        assert_eq!(
            map_wait_error(&BridgeError::NotReady(BridgeState::Initializing)),
            RtcStatus::Timeout.code()
        );
    }

    #[test]
    fn messages_with_nul_are_sanitized() {
        set_error_message("bad\0value");
        assert_eq!(last_error(), "bad?value");
        clear_error_state();
        assert!(last_error().is_empty());
    }
}
