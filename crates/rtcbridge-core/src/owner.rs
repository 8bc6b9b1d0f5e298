//! Engine ownership and the bridge state machine.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Draining -> Closed
//!                        |                                ^
//!                        +------------ failure -----------+
//! ```
//!
//! Commands run outside the state lock and are counted while in flight.
//! Teardown moves the state to `Draining`, so no new command can start, and
//! waits for the count to reach zero before releasing the engine.
//!
//! An engine may fire callbacks synchronously on the thread that issued a
//! command or is constructing it. A command issued from such a callback fails
//! with `Reentrant`; a teardown issued from one is deferred, and the engine is
//! released when the outer engine call returns.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rtcbridge_engine::{
    EngineContext, EngineError, EngineFactory, EventHandler, RtcEngine, Uid, VideoCanvas,
    ViewHandle, ERR_FAILED,
};
use tracing::{debug, error, trace, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::initializer::AsyncInitializer;
use crate::scope::{self, ThreadScope};

/// Lifecycle state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    Uninitialized,
    Initializing,
    Ready,
    Draining,
    Closed,
}

impl BridgeState {
    /// Stable numeric form used across the C boundary.
    pub fn as_raw(self) -> i32 {
        match self {
            BridgeState::Uninitialized => 0,
            BridgeState::Initializing => 1,
            BridgeState::Ready => 2,
            BridgeState::Draining => 3,
            BridgeState::Closed => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::Initializing => "initializing",
            BridgeState::Ready => "ready",
            BridgeState::Draining => "draining",
            BridgeState::Closed => "closed",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Code(i32),
    Panicked,
}

impl Failure {
    fn to_error(self) -> BridgeError {
        match self {
            Failure::Code(code) => BridgeError::ConstructionFailed(code),
            Failure::Panicked => BridgeError::InitializerPanicked,
        }
    }
}

struct OwnerInner {
    state: BridgeState,
    failure: Option<Failure>,
    /// Construction started and has not reported back yet.
    constructing: bool,
    /// Commands currently running against the engine.
    in_flight: usize,
    torn_down: bool,
    /// Teardown ran inside an engine call; the last one out releases.
    release_pending: bool,
}

/// Sole owner of one engine instance.
pub struct EngineOwner {
    config: BridgeConfig,
    inner: Mutex<OwnerInner>,
    ready: Condvar,
    /// Never locked while `inner` is held.
    engine: Mutex<Option<Box<dyn RtcEngine>>>,
    initializer: Mutex<Option<AsyncInitializer>>,
}

/// Counts one command as in flight and marks the owner active on this thread.
struct CommandGuard<'a> {
    owner: &'a EngineOwner,
    _scope: ThreadScope,
}

impl Drop for CommandGuard<'_> {
    fn drop(&mut self) {
        {
            let mut inner = lock(&self.owner.inner);
            inner.in_flight -= 1;
            self.owner.ready.notify_all();
        }
        self.owner.release_if_pending();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineOwner {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(OwnerInner {
                state: BridgeState::Uninitialized,
                failure: None,
                constructing: false,
                in_flight: 0,
                torn_down: false,
                release_pending: false,
            }),
            ready: Condvar::new(),
            engine: Mutex::new(None),
            initializer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        lock(&self.inner).state
    }

    /// Construct the engine on the calling thread.
    pub fn initialize(
        &self,
        factory: &dyn EngineFactory,
        context: EngineContext,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        self.begin()?;
        self.construct(factory, &context, handler);
        match self.construction_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Construct the engine on a background thread.
    ///
    /// Returns once the thread is started; the outcome is observed through
    /// [`state`](Self::state), [`wait_ready`](Self::wait_ready) and
    /// [`construction_error`](Self::construction_error).
    pub fn spawn_initialize(
        self: &Arc<Self>,
        factory: Arc<dyn EngineFactory>,
        context: EngineContext,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        self.begin()?;

        let owner = Arc::clone(self);
        let spawned = AsyncInitializer::spawn(move || {
            owner.construct(factory.as_ref(), &context, handler);
        });

        match spawned {
            Ok(initializer) => {
                *lock(&self.initializer) = Some(initializer);
                Ok(())
            }
            Err(err) => {
                self.complete(Err(Failure::Code(ERR_FAILED)));
                Err(err)
            }
        }
    }

    /// Block until construction has finished, or `timeout` elapses.
    ///
    /// `None` waits without limit. Returns the construction error if it
    /// failed, and `NotReady` if it is still running at the deadline.
    pub fn wait_ready(&self, timeout: Option<Duration>) -> Result<()> {
        let inner = lock(&self.inner);
        let inner = match timeout {
            Some(timeout) => {
                self.ready
                    .wait_timeout_while(inner, timeout, |inner| {
                        inner.state == BridgeState::Initializing
                    })
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .ready
                .wait_while(inner, |inner| inner.state == BridgeState::Initializing)
                .unwrap_or_else(PoisonError::into_inner),
        };

        match inner.state {
            BridgeState::Ready => Ok(()),
            _ if inner.torn_down => Err(BridgeError::AlreadyClosed),
            _ => match inner.failure {
                Some(failure) => Err(failure.to_error()),
                None => Err(BridgeError::NotReady(inner.state)),
            },
        }
    }

    /// Why construction failed, if it did.
    pub fn construction_error(&self) -> Option<BridgeError> {
        lock(&self.inner).failure.map(Failure::to_error)
    }

    pub fn join_channel(&self, channel: &str) -> Result<()> {
        self.with_engine("joinChannel", |engine| {
            engine.join_channel(None, channel, None, 0)
        })
    }

    pub fn leave_channel(&self) -> Result<()> {
        self.with_engine("leaveChannel", |engine| engine.leave_channel())
    }

    /// Bind the local preview to `view`, re-applying the configured video
    /// profile first.
    pub fn setup_local_video(&self, view: ViewHandle) -> Result<()> {
        let profile = self.config.video_profile;
        let swap = self.config.swap_width_and_height;
        self.with_engine("setupLocalVideo", |engine| {
            engine.set_video_profile(profile, swap)?;
            engine.setup_local_video(&VideoCanvas::local(view))
        })
    }

    pub fn setup_remote_video(&self, uid: Uid, view: ViewHandle) -> Result<()> {
        self.with_engine("setupRemoteVideo", |engine| {
            engine.setup_remote_video(&VideoCanvas::remote(view, uid))
        })
    }

    pub fn switch_camera(&self) -> Result<()> {
        self.with_engine("switchCamera", |engine| engine.switch_camera())
    }

    pub fn mute_local_audio_stream(&self, mute: bool) -> Result<()> {
        self.with_engine("muteLocalAudioStream", |engine| {
            engine.mute_local_audio_stream(mute)
        })
    }

    pub fn mute_local_video_stream(&self, mute: bool) -> Result<()> {
        self.with_engine("muteLocalVideoStream", |engine| {
            engine.mute_local_video_stream(mute)
        })
    }

    /// Tear down: stop new commands, join the initializer, wait for
    /// in-flight commands, release the engine. A second call returns
    /// `AlreadyClosed`.
    ///
    /// Called from inside an engine call on this thread, it only marks the
    /// bridge `Draining`; the release happens when that call returns.
    pub fn teardown(&self) -> Result<()> {
        let deferred = scope::is_active(self);
        {
            let mut inner = lock(&self.inner);
            if inner.torn_down {
                return Err(BridgeError::AlreadyClosed);
            }
            inner.torn_down = true;
            if inner.state != BridgeState::Closed {
                inner.state = BridgeState::Draining;
            }
            inner.release_pending = deferred;
            debug!(state = %inner.state, deferred, "teardown started");
            self.ready.notify_all();
        }
        if deferred {
            return Ok(());
        }

        let initializer = lock(&self.initializer).take();
        if let Some(initializer) = initializer {
            if let Err(err) = initializer.join() {
                error!(error = %err, "initializer did not finish cleanly");
            }
        }

        drop(
            self.ready
                .wait_while(lock(&self.inner), |inner| {
                    inner.constructing || inner.in_flight > 0
                })
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.release_engine();
        debug!("teardown complete");
        Ok(())
    }

    pub fn is_torn_down(&self) -> bool {
        lock(&self.inner).torn_down
    }

    /// Build the engine and record the outcome. A panic is recorded before
    /// it continues unwinding, so waiters and teardown never hang on it.
    fn construct(
        &self,
        factory: &dyn EngineFactory,
        context: &EngineContext,
        handler: Arc<dyn EventHandler>,
    ) {
        let built = {
            let _scope = ThreadScope::enter(self);
            panic::catch_unwind(AssertUnwindSafe(|| {
                build_engine(&self.config, factory, context, handler)
            }))
        };
        match built {
            Ok(outcome) => self.complete(outcome.map_err(|err| Failure::Code(err.code()))),
            Err(payload) => {
                self.complete(Err(Failure::Panicked));
                panic::resume_unwind(payload);
            }
        }
    }

    fn begin(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.torn_down {
            return Err(BridgeError::AlreadyClosed);
        }
        if inner.state != BridgeState::Uninitialized {
            return Err(BridgeError::NotReady(inner.state));
        }
        inner.state = BridgeState::Initializing;
        inner.constructing = true;
        debug!("engine construction started");
        Ok(())
    }

    fn complete(&self, outcome: std::result::Result<Box<dyn RtcEngine>, Failure>) {
        let failure = match outcome {
            Ok(engine) => {
                // Stored even during teardown, which then releases it.
                *lock(&self.engine) = Some(engine);
                None
            }
            Err(failure) => Some(failure),
        };

        {
            let mut inner = lock(&self.inner);
            inner.constructing = false;
            match failure {
                None => {
                    if inner.state == BridgeState::Initializing {
                        inner.state = BridgeState::Ready;
                        debug!("engine ready");
                    }
                }
                Some(failure) => {
                    inner.failure = Some(failure);
                    if inner.state == BridgeState::Initializing {
                        inner.state = BridgeState::Closed;
                    }
                    error!(?failure, "engine construction failed");
                }
            }
            self.ready.notify_all();
        }
        self.release_if_pending();
    }

    /// Finish a deferred teardown once nothing is running on the engine.
    fn release_if_pending(&self) {
        {
            let mut inner = lock(&self.inner);
            if !inner.release_pending || inner.constructing || inner.in_flight > 0 {
                return;
            }
            inner.release_pending = false;
        }
        debug!("completing deferred teardown");
        self.release_engine();
    }

    fn release_engine(&self) {
        let engine = lock(&self.engine).take();
        if let Some(mut engine) = engine {
            engine.release();
            debug!("engine released");
        }

        let mut inner = lock(&self.inner);
        inner.state = BridgeState::Closed;
        self.ready.notify_all();
    }

    fn with_engine<T, F>(&self, op: &'static str, command: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RtcEngine) -> rtcbridge_engine::Result<T>,
    {
        if scope::is_active(self) {
            debug!(op, "command issued from inside an engine call");
            return Err(BridgeError::Reentrant(op));
        }

        {
            let mut inner = lock(&self.inner);
            if inner.state == BridgeState::Initializing {
                if let Some(timeout) = self.config.ready_policy.wait_timeout() {
                    inner = self
                        .ready
                        .wait_timeout_while(inner, timeout, |inner| {
                            inner.state == BridgeState::Initializing
                        })
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
            if inner.state != BridgeState::Ready {
                debug!(op, state = %inner.state, "command rejected");
                return Err(BridgeError::NotReady(inner.state));
            }
            inner.in_flight += 1;
        }

        let _command = CommandGuard {
            owner: self,
            _scope: ThreadScope::enter(self),
        };
        let mut engine = lock(&self.engine);
        match engine.as_mut() {
            Some(engine) => {
                trace!(op, "engine command");
                Ok(command(engine.as_mut())?)
            }
            // Teardown waits for in-flight commands before taking the engine.
            None => Err(BridgeError::NotReady(BridgeState::Draining)),
        }
    }
}

fn build_engine(
    config: &BridgeConfig,
    factory: &dyn EngineFactory,
    context: &EngineContext,
    handler: Arc<dyn EventHandler>,
) -> std::result::Result<Box<dyn RtcEngine>, EngineError> {
    let mut engine = factory.create()?;
    if let Err(err) = configure(engine.as_mut(), config, context, handler) {
        engine.release();
        return Err(err);
    }
    Ok(engine)
}

fn configure(
    engine: &mut dyn RtcEngine,
    config: &BridgeConfig,
    context: &EngineContext,
    handler: Arc<dyn EventHandler>,
) -> std::result::Result<(), EngineError> {
    engine.initialize(context, handler)?;

    if let Some(parameters) = &config.engine_parameters {
        if let Err(err) = engine.set_parameters(parameters) {
            warn!(error = %err, "engine parameters not applied");
        }
    }
    engine.enable_video()?;
    engine.set_video_profile(config.video_profile, config.swap_width_and_height)?;
    engine.set_channel_profile(config.channel_profile)?;
    engine.set_client_role(config.client_role)?;
    Ok(())
}
