use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use rtcbridge_engine::{ContextHandle, Uid};
use rtcbridge_envelope::MessageId;
use tracing::trace;

use crate::runtime::{AttachState, CallbackTarget, ManagedRuntime, RuntimeError};

/// One message handed to [`RecordingRuntime::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: CallbackTarget,
    pub message_id: MessageId,
    pub wire: Vec<u8>,
    pub thread: ThreadId,
}

type DeliveryHook = Arc<dyn Fn(&Delivery) + Send + Sync>;

/// In-process [`ManagedRuntime`] that tracks attachment per thread and
/// records everything it receives.
///
/// Deliveries on a detached thread are rejected, so a passing test also
/// proves every delivery happened while attached.
#[derive(Default)]
pub struct RecordingRuntime {
    attached: Mutex<HashSet<ThreadId>>,
    deliveries: Mutex<Vec<Delivery>>,
    remote_views: Mutex<Vec<(CallbackTarget, Uid)>>,
    live_targets: Mutex<HashSet<CallbackTarget>>,
    delivery_delay: Mutex<Duration>,
    on_deliver: Mutex<Option<DeliveryHook>>,
    next_target: AtomicUsize,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    released_targets: AtomicUsize,
    fail_attach: AtomicBool,
    fail_detach: AtomicBool,
    fail_deliver: AtomicBool,
    fail_acquire: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn fail_detach(&self, fail: bool) {
        self.fail_detach.store(fail, Ordering::SeqCst);
    }

    /// Make `deliver` and `create_remote_view` report a handler failure.
    pub fn fail_deliver(&self, fail: bool) {
        self.fail_deliver.store(fail, Ordering::SeqCst);
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Sleep inside every delivery.
    pub fn set_delivery_delay(&self, delay: Duration) {
        *lock(&self.delivery_delay) = delay;
    }

    /// Run `hook` on the delivering thread after each recorded delivery,
    /// the way a message handler would run inside `deliver`.
    pub fn on_deliver(&self, hook: impl Fn(&Delivery) + Send + Sync + 'static) {
        *lock(&self.on_deliver) = Some(Arc::new(hook));
    }

    /// Successful attaches.
    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    /// Detach calls, successful or not.
    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        lock(&self.deliveries).clone()
    }

    pub fn remote_views(&self) -> Vec<(CallbackTarget, Uid)> {
        lock(&self.remote_views).clone()
    }

    pub fn live_target_count(&self) -> usize {
        lock(&self.live_targets).len()
    }

    pub fn released_target_count(&self) -> usize {
        self.released_targets.load(Ordering::SeqCst)
    }

    fn require_attached(&self, op: &str) -> Result<(), RuntimeError> {
        if self.attach_state() == AttachState::Detached {
            return Err(RuntimeError::new(-2, format!("{op} on a detached thread")));
        }
        Ok(())
    }

    fn require_live(&self, target: CallbackTarget) -> Result<(), RuntimeError> {
        if !lock(&self.live_targets).contains(&target) {
            return Err(RuntimeError::new(-5, "stale callback target"));
        }
        Ok(())
    }
}

impl ManagedRuntime for RecordingRuntime {
    fn attach_state(&self) -> AttachState {
        if lock(&self.attached).contains(&thread::current().id()) {
            AttachState::Attached
        } else {
            AttachState::Detached
        }
    }

    fn attach_current_thread(&self) -> Result<(), RuntimeError> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(RuntimeError::new(-1, "attach refused"));
        }
        lock(&self.attached).insert(thread::current().id());
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach_current_thread(&self) -> Result<(), RuntimeError> {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        if self.fail_detach.load(Ordering::SeqCst) {
            return Err(RuntimeError::new(-1, "detach refused"));
        }
        lock(&self.attached).remove(&thread::current().id());
        Ok(())
    }

    fn acquire_target(&self, context: ContextHandle) -> Result<CallbackTarget, RuntimeError> {
        self.require_attached("acquire_target")?;
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(RuntimeError::new(-4, "context is not a callback object"));
        }
        let id = self.next_target.fetch_add(1, Ordering::SeqCst) + 1;
        let target = CallbackTarget::from_raw(id);
        lock(&self.live_targets).insert(target);
        trace!(context = context.as_raw(), target = id, "acquired target");
        Ok(target)
    }

    fn release_target(&self, target: CallbackTarget) -> Result<(), RuntimeError> {
        self.require_attached("release_target")?;
        if !lock(&self.live_targets).remove(&target) {
            return Err(RuntimeError::new(-5, "target released twice"));
        }
        self.released_targets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deliver(
        &self,
        target: CallbackTarget,
        message_id: MessageId,
        wire: &[u8],
    ) -> Result<(), RuntimeError> {
        self.require_attached("deliver")?;
        self.require_live(target)?;
        let delay = *lock(&self.delivery_delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.fail_deliver.load(Ordering::SeqCst) {
            return Err(RuntimeError::new(-3, "handler threw"));
        }
        let delivery = Delivery {
            target,
            message_id,
            wire: wire.to_vec(),
            thread: thread::current().id(),
        };
        lock(&self.deliveries).push(delivery.clone());
        let hook = lock(&self.on_deliver).clone();
        if let Some(hook) = hook {
            hook(&delivery);
        }
        Ok(())
    }

    fn create_remote_view(&self, target: CallbackTarget, uid: Uid) -> Result<(), RuntimeError> {
        self.require_attached("create_remote_view")?;
        self.require_live(target)?;
        if self.fail_deliver.load(Ordering::SeqCst) {
            return Err(RuntimeError::new(-3, "handler threw"));
        }
        lock(&self.remote_views).push((target, uid));
        Ok(())
    }
}
