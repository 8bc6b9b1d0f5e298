//! Managed-runtime abstraction and thread attachment.
//!
//! Engine callbacks arrive on threads the managed runtime has never seen.
//! Before a delivery the thread must be attached, and it must be detached
//! afterwards only if this bridge did the attaching.

use std::fmt;
use std::sync::{Arc, OnceLock};

use rtcbridge_engine::{ContextHandle, Uid};
use rtcbridge_envelope::MessageId;
use tracing::{trace, warn};

use crate::error::{BridgeError, Result};

/// Failure reported by the managed runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code: {code})")]
pub struct RuntimeError {
    pub code: i32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Attachment of the calling thread to the managed runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Attached,
    Detached,
}

/// Long-lived reference to the managed-runtime object receiving messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackTarget(usize);

impl CallbackTarget {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Operations the bridge needs from the managed runtime.
///
/// All methods act on the calling thread. `deliver` and
/// `create_remote_view` are only called while that thread is attached.
pub trait ManagedRuntime: Send + Sync {
    fn attach_state(&self) -> AttachState;

    fn attach_current_thread(&self) -> std::result::Result<(), RuntimeError>;

    fn detach_current_thread(&self) -> std::result::Result<(), RuntimeError>;

    /// Promote the application context to a target that outlives the call.
    fn acquire_target(
        &self,
        context: ContextHandle,
    ) -> std::result::Result<CallbackTarget, RuntimeError>;

    fn release_target(&self, target: CallbackTarget) -> std::result::Result<(), RuntimeError>;

    /// Hand a complete wire image (prefix included) to the target's message
    /// handler.
    fn deliver(
        &self,
        target: CallbackTarget,
        message_id: MessageId,
        wire: &[u8],
    ) -> std::result::Result<(), RuntimeError>;

    /// Ask the target to create and bind a view for `uid`.
    fn create_remote_view(
        &self,
        target: CallbackTarget,
        uid: Uid,
    ) -> std::result::Result<(), RuntimeError>;
}

static GLOBAL_RUNTIME: OnceLock<RuntimeHandle> = OnceLock::new();

/// Shared handle to a [`ManagedRuntime`].
///
/// One handle is installed process-wide when the runtime loads the library;
/// tests and embedders may also pass explicit handles.
#[derive(Clone)]
pub struct RuntimeHandle(Arc<dyn ManagedRuntime>);

impl RuntimeHandle {
    pub fn new(runtime: Arc<dyn ManagedRuntime>) -> Self {
        Self(runtime)
    }

    /// Install the process-wide handle. Succeeds once per process.
    pub fn install_global(handle: RuntimeHandle) -> Result<()> {
        GLOBAL_RUNTIME
            .set(handle)
            .map_err(|_| BridgeError::RuntimeAlreadyInstalled)
    }

    /// The process-wide handle.
    pub fn global() -> Result<RuntimeHandle> {
        GLOBAL_RUNTIME
            .get()
            .cloned()
            .ok_or(BridgeError::RuntimeNotInstalled)
    }

    pub fn runtime(&self) -> &dyn ManagedRuntime {
        self.0.as_ref()
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}

/// Scoped attachment of the current thread.
///
/// Detaches on [`release`](Self::release) or drop, but only when
/// [`acquire`](Self::acquire) performed the attach.
pub struct AttachGuard<'a> {
    runtime: &'a dyn ManagedRuntime,
    introduced: bool,
}

impl<'a> AttachGuard<'a> {
    pub fn acquire(runtime: &'a dyn ManagedRuntime) -> Result<Self> {
        let introduced = match runtime.attach_state() {
            AttachState::Attached => false,
            AttachState::Detached => {
                runtime
                    .attach_current_thread()
                    .map_err(|err| BridgeError::AttachFailed(err.to_string()))?;
                trace!("attached callback thread");
                true
            }
        };
        Ok(Self {
            runtime,
            introduced,
        })
    }

    /// Returns true if this guard attached the thread.
    pub fn introduced_attachment(&self) -> bool {
        self.introduced
    }

    /// Detach now and report the outcome instead of logging it.
    pub fn release(mut self) -> Result<()> {
        if !std::mem::take(&mut self.introduced) {
            return Ok(());
        }
        trace!("detaching callback thread");
        self.runtime
            .detach_current_thread()
            .map_err(|err| BridgeError::DetachFailed(err.to_string()))
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if self.introduced {
            if let Err(err) = self.runtime.detach_current_thread() {
                warn!(error = %err, "failed to detach callback thread");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingRuntime;

    #[test]
    fn guard_detaches_only_what_it_attached() {
        let runtime = RecordingRuntime::new();

        let guard = AttachGuard::acquire(&runtime).expect("attach should succeed");
        assert!(guard.introduced_attachment());
        assert_eq!(runtime.attach_state(), AttachState::Attached);
        guard.release().expect("detach should succeed");
        assert_eq!(runtime.attach_state(), AttachState::Detached);

        runtime.attach_current_thread().unwrap();
        let guard = AttachGuard::acquire(&runtime).unwrap();
        assert!(!guard.introduced_attachment());
        drop(guard);
        assert_eq!(runtime.attach_state(), AttachState::Attached);
        assert_eq!(runtime.attach_count(), 2);
        assert_eq!(runtime.detach_count(), 1);
    }

    #[test]
    fn drop_detaches_on_early_exit() {
        let runtime = RecordingRuntime::new();
        let result: Result<()> = (|| {
            let _guard = AttachGuard::acquire(&runtime)?;
            Err(BridgeError::Delivery("handler threw".to_string()))
        })();

        assert!(result.is_err());
        assert_eq!(runtime.attach_count(), 1);
        assert_eq!(runtime.detach_count(), 1);
        assert_eq!(runtime.attach_state(), AttachState::Detached);
    }

    #[test]
    fn attach_and_detach_failures_surface() {
        let runtime = RecordingRuntime::new();
        runtime.fail_attach(true);
        assert!(matches!(
            AttachGuard::acquire(&runtime),
            Err(BridgeError::AttachFailed(_))
        ));
        assert_eq!(runtime.detach_count(), 0);

        runtime.fail_attach(false);
        runtime.fail_detach(true);
        let guard = AttachGuard::acquire(&runtime).unwrap();
        assert!(matches!(guard.release(), Err(BridgeError::DetachFailed(_))));
    }

    #[test]
    fn runtime_error_display() {
        let err = RuntimeError::new(-3, "no env");
        assert_eq!(err.to_string(), "no env (code: -3)");
    }
}
