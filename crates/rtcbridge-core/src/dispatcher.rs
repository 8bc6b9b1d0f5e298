use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use rtcbridge_engine::{ContextHandle, Uid};
use rtcbridge_envelope::Envelope;
use tracing::{debug, trace, warn};

use crate::error::{BridgeError, Result};
use crate::runtime::{AttachGuard, CallbackTarget, ManagedRuntime, RuntimeError, RuntimeHandle};
use crate::scope::{self, ThreadScope};

/// Delivery counters, updated from every callback thread.
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    attach_failures: AtomicU64,
    detach_failures: AtomicU64,
    remote_view_requests: AtomicU64,
    dropped_after_close: AtomicU64,
    encoding_failures: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub attach_failures: u64,
    pub detach_failures: u64,
    pub remote_view_requests: u64,
    pub dropped_after_close: u64,
    pub encoding_failures: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            attach_failures: self.attach_failures.load(Ordering::Relaxed),
            detach_failures: self.detach_failures.load(Ordering::Relaxed),
            remote_view_requests: self.remote_view_requests.load(Ordering::Relaxed),
            dropped_after_close: self.dropped_after_close.load(Ordering::Relaxed),
            encoding_failures: self.encoding_failures.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Delivers envelopes from engine threads to the managed-runtime target.
///
/// The slot lock is held only to count a delivery in or out, never across
/// the runtime call, so callbacks on different engine threads run side by
/// side and a delivery may call back into the bridge. Releasing the target
/// stops new deliveries and waits for in-flight ones; anything dispatched
/// afterwards is dropped. A release issued from inside a delivery is
/// carried out by the last delivery to finish.
pub struct Dispatcher {
    runtime: RuntimeHandle,
    slot: Mutex<Slot>,
    idle: Condvar,
    stats: DispatchStats,
}

struct Slot {
    target: Option<CallbackTarget>,
    in_flight: usize,
    closing: bool,
    release_deferred: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    pub fn new(runtime: RuntimeHandle, target: CallbackTarget) -> Self {
        Self {
            runtime,
            slot: Mutex::new(Slot {
                target: Some(target),
                in_flight: 0,
                closing: false,
                release_deferred: false,
            }),
            idle: Condvar::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Acquire a target for `context` on the calling thread, attaching it for
    /// the duration if needed.
    pub fn acquire(runtime: RuntimeHandle, context: ContextHandle) -> Result<Self> {
        let target = {
            let guard = AttachGuard::acquire(runtime.runtime())?;
            let target = runtime
                .runtime()
                .acquire_target(context)
                .map_err(|err| BridgeError::TargetUnavailable(err.to_string()))?;
            if let Err(err) = guard.release() {
                warn!(error = %err, "detach failed after acquiring target");
            }
            target
        };
        debug!(target = target.as_raw(), "callback target acquired");
        Ok(Self::new(runtime, target))
    }

    /// Deliver one envelope.
    ///
    /// Errors abort only this delivery; they are also logged and counted.
    pub fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        if self.with_target("message", |runtime, target| {
            runtime.deliver(target, envelope.message_id(), envelope.as_bytes())
        })? {
            trace!(message_id = envelope.message_id(), "delivered");
        }
        Ok(())
    }

    /// Ask the target to create a view for `uid`.
    pub fn request_remote_view(&self, uid: Uid) -> Result<()> {
        if self.with_target("remote view", |runtime, target| {
            runtime.create_remote_view(target, uid)
        })? {
            bump(&self.stats.remote_view_requests);
        }
        Ok(())
    }

    /// Release the target. Waits for in-flight deliveries; later calls are
    /// no-ops.
    ///
    /// If the calling thread cannot be attached the target is kept, so the
    /// release can be retried. From inside a delivery this only stops new
    /// deliveries and returns; the release follows once the delivery ends.
    pub fn release_target(&self) -> Result<()> {
        if scope::is_active(self) {
            let mut slot = lock(&self.slot);
            if slot.target.is_some() {
                slot.closing = true;
                slot.release_deferred = true;
                debug!("target release deferred until delivery returns");
            }
            return Ok(());
        }
        if self.target().is_none() {
            return Ok(());
        }

        let runtime = self.runtime.runtime();
        let guard = AttachGuard::acquire(runtime)?;

        let target = {
            let mut slot = lock(&self.slot);
            if slot.target.is_none() {
                return Ok(());
            }
            slot.closing = true;
            let mut slot = self
                .idle
                .wait_while(slot, |slot| slot.in_flight > 0)
                .unwrap_or_else(PoisonError::into_inner);
            slot.release_deferred = false;
            slot.target.take()
        };

        let released = match target {
            Some(target) => self.release_attached(runtime, target),
            None => Ok(()),
        };
        if let Err(err) = guard.release() {
            bump(&self.stats.detach_failures);
            warn!(error = %err, "detach failed after releasing target");
        }
        released
    }

    /// True while the target is held and no release has begun, including
    /// after a release that failed to attach.
    pub fn needs_release(&self) -> bool {
        let slot = lock(&self.slot);
        slot.target.is_some() && !slot.closing
    }

    /// The target, while it has not been released.
    pub fn target(&self) -> Option<CallbackTarget> {
        lock(&self.slot).target
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record_encoding_failure(&self) {
        bump(&self.stats.encoding_failures);
    }

    /// Caller must have the thread attached.
    fn release_attached(
        &self,
        runtime: &dyn ManagedRuntime,
        target: CallbackTarget,
    ) -> Result<()> {
        runtime
            .release_target(target)
            .map_err(|err| BridgeError::TargetUnavailable(err.to_string()))?;
        debug!(target = target.as_raw(), "callback target released");
        Ok(())
    }

    /// Count one delivery out. Hands back the target when a deferred release
    /// is now due.
    fn end_delivery(&self) -> Option<CallbackTarget> {
        let mut slot = lock(&self.slot);
        slot.in_flight -= 1;
        self.idle.notify_all();
        if slot.in_flight == 0 && slot.release_deferred {
            slot.release_deferred = false;
            slot.target.take()
        } else {
            None
        }
    }

    fn finish_deferred_release(&self, runtime: &dyn ManagedRuntime) {
        let Some(target) = self.end_delivery() else {
            return;
        };
        let guard = match AttachGuard::acquire(runtime) {
            Ok(guard) => guard,
            Err(err) => {
                lock(&self.slot).target = Some(target);
                warn!(error = %err, "deferred target release could not attach, target kept");
                return;
            }
        };
        if let Err(err) = self.release_attached(runtime, target) {
            warn!(error = %err, "deferred target release failed");
        }
        if let Err(err) = guard.release() {
            bump(&self.stats.detach_failures);
            warn!(error = %err, "detach failed after releasing target");
        }
    }

    /// Returns false when the delivery was dropped because the target is gone.
    fn with_target<F>(&self, what: &'static str, deliver: F) -> Result<bool>
    where
        F: FnOnce(&dyn ManagedRuntime, CallbackTarget) -> std::result::Result<(), RuntimeError>,
    {
        let target = {
            let mut slot = lock(&self.slot);
            match slot.target {
                Some(target) if !slot.closing => {
                    slot.in_flight += 1;
                    target
                }
                _ => {
                    bump(&self.stats.dropped_after_close);
                    debug!(what, "target released, dropping delivery");
                    return Ok(false);
                }
            }
        };

        let runtime = self.runtime.runtime();
        let outcome = {
            let _scope = ThreadScope::enter(self);
            match AttachGuard::acquire(runtime) {
                Ok(guard) => {
                    let outcome = deliver(runtime, target);
                    // Still attached here, so a deferred release reuses it.
                    self.finish_deferred_release(runtime);
                    if let Err(err) = guard.release() {
                        bump(&self.stats.detach_failures);
                        warn!(what, error = %err, "detach failed after delivery");
                    }
                    outcome
                }
                Err(err) => {
                    bump(&self.stats.attach_failures);
                    warn!(what, error = %err, "could not attach callback thread");
                    self.finish_deferred_release(runtime);
                    return Err(err);
                }
            }
        };

        match outcome {
            Ok(()) => {
                bump(&self.stats.delivered);
                Ok(true)
            }
            Err(err) => {
                bump(&self.stats.failed);
                warn!(what, error = %err, "delivery failed");
                Err(BridgeError::Delivery(err.to_string()))
            }
        }
    }
}
