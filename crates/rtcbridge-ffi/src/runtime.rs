use std::ffi::c_void;
use std::sync::Arc;

use rtcbridge_core::{
    AttachState, CallbackTarget, ManagedRuntime, RuntimeError, RuntimeHandle,
};
use rtcbridge_engine::{ContextHandle, Uid};
use tracing::debug;

use crate::error;
use crate::types::{RtcRuntimeApi, RtcStatus};

type RuntimeFn = unsafe extern "C" fn(*mut c_void) -> i32;
type NewTargetFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> *mut c_void;
type DeleteTargetFn = unsafe extern "C" fn(*mut c_void, *mut c_void);
type OnMessageFn = unsafe extern "C" fn(*mut c_void, *mut c_void, u16, *const u8, usize) -> i32;
type RemoteViewFn = unsafe extern "C" fn(*mut c_void, *mut c_void, u32) -> i32;

/// [`ManagedRuntime`] backed by a caller-supplied [`RtcRuntimeApi`].
pub(crate) struct ForeignRuntime {
    runtime: *mut c_void,
    is_attached: RuntimeFn,
    attach_current_thread: RuntimeFn,
    detach_current_thread: RuntimeFn,
    new_target: NewTargetFn,
    delete_target: DeleteTargetFn,
    on_message: OnMessageFn,
    create_remote_view: RemoteViewFn,
}

// SAFETY: The runtime contract requires every entry point to be callable from
// any thread, and `runtime` is only ever passed back to those entry points.
unsafe impl Send for ForeignRuntime {}
// SAFETY: See above; the struct holds no Rust-side mutable state.
unsafe impl Sync for ForeignRuntime {}

impl ForeignRuntime {
    /// Copy the table, or `None` if any entry is missing.
    pub(crate) fn from_api(api: &RtcRuntimeApi) -> Option<Self> {
        Some(Self {
            runtime: api.runtime,
            is_attached: api.is_attached?,
            attach_current_thread: api.attach_current_thread?,
            detach_current_thread: api.detach_current_thread?,
            new_target: api.new_target?,
            delete_target: api.delete_target?,
            on_message: api.on_message?,
            create_remote_view: api.create_remote_view?,
        })
    }
}

fn status(op: &str, code: i32) -> Result<(), RuntimeError> {
    if code == 0 {
        Ok(())
    } else {
        Err(RuntimeError::new(code, format!("{op} failed")))
    }
}

impl ManagedRuntime for ForeignRuntime {
    fn attach_state(&self) -> AttachState {
        // SAFETY: Entry point validated at install time.
        if unsafe { (self.is_attached)(self.runtime) } != 0 {
            AttachState::Attached
        } else {
            AttachState::Detached
        }
    }

    fn attach_current_thread(&self) -> Result<(), RuntimeError> {
        // SAFETY: Entry point validated at install time.
        status("attach", unsafe { (self.attach_current_thread)(self.runtime) })
    }

    fn detach_current_thread(&self) -> Result<(), RuntimeError> {
        // SAFETY: Entry point validated at install time.
        status("detach", unsafe { (self.detach_current_thread)(self.runtime) })
    }

    fn acquire_target(&self, context: ContextHandle) -> Result<CallbackTarget, RuntimeError> {
        // SAFETY: Entry point validated at install time; `context` is the
        // caller's pointer passed back unchanged.
        let target = unsafe { (self.new_target)(self.runtime, context.as_raw() as *mut c_void) };
        if target.is_null() {
            return Err(RuntimeError::new(-1, "runtime returned a null target"));
        }
        Ok(CallbackTarget::from_raw(target as usize))
    }

    fn release_target(&self, target: CallbackTarget) -> Result<(), RuntimeError> {
        // SAFETY: `target` came from `new_target` and is released once.
        unsafe { (self.delete_target)(self.runtime, target.as_raw() as *mut c_void) };
        Ok(())
    }

    fn deliver(
        &self,
        target: CallbackTarget,
        message_id: u16,
        wire: &[u8],
    ) -> Result<(), RuntimeError> {
        // SAFETY: `wire` outlives the call; the thread is attached.
        let code = unsafe {
            (self.on_message)(
                self.runtime,
                target.as_raw() as *mut c_void,
                message_id,
                wire.as_ptr(),
                wire.len(),
            )
        };
        status("on_message", code)
    }

    fn create_remote_view(&self, target: CallbackTarget, uid: Uid) -> Result<(), RuntimeError> {
        // SAFETY: Entry point validated at install time; the thread is attached.
        let code =
            unsafe { (self.create_remote_view)(self.runtime, target.as_raw() as *mut c_void, uid) };
        status("create_remote_view", code)
    }
}

/// Install the process-wide managed runtime. Call once, when the runtime
/// loads the library.
///
/// The table is copied; `api` need not outlive the call. `api->runtime` must
/// stay valid for the life of the process.
///
/// # Safety
/// `api` must be null or point to a valid `RtcRuntimeApi`.
#[no_mangle]
pub unsafe extern "C" fn rtc_runtime_attach(api: *const RtcRuntimeApi) -> i32 {
    crate::ffi_boundary(RtcStatus::Internal.code(), || {
        error::clear_error_state();

        if api.is_null() {
            return error::set_invalid_argument("runtime api cannot be null");
        }
        let api = {
            // SAFETY: Pointer validity is guaranteed by the caller.
            unsafe { &*api }
        };
        let Some(runtime) = ForeignRuntime::from_api(api) else {
            return error::set_invalid_argument("runtime api has a null entry point");
        };

        match RuntimeHandle::install_global(RuntimeHandle::new(Arc::new(runtime))) {
            Ok(()) => {
                debug!("managed runtime installed");
                RtcStatus::Ok.code()
            }
            Err(err) => error::map_bridge_error(&err),
        }
    })
}
