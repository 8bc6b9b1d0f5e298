use std::sync::Arc;
use std::time::Duration;

use rtcbridge_engine::{
    ContextHandle, EngineContext, EngineEvent, EngineFactory, EventHandler, Uid, ViewHandle,
};
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::dispatcher::{DispatchSnapshot, Dispatcher};
use crate::error::{BridgeError, Result};
use crate::owner::{BridgeState, EngineOwner};
use crate::runtime::RuntimeHandle;
use crate::translator::{EventTranslator, Translation};

/// Where engine construction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// On the creating thread; `create` reports construction failures.
    Sync,
    /// On a background thread; failures surface through `wait_ready`.
    Async,
}

/// Engine event handler: translate, then deliver on the calling thread.
struct EventRelay {
    translator: EventTranslator,
    dispatcher: Arc<Dispatcher>,
}

impl EventHandler for EventRelay {
    fn on_event(&self, event: &EngineEvent<'_>) {
        // Delivery errors are logged and counted by the dispatcher.
        match self.translator.translate(event) {
            Ok(Translation::Envelope(envelope)) => {
                let _ = self.dispatcher.dispatch(&envelope);
            }
            Ok(Translation::CreateRemoteView(uid)) => {
                let _ = self.dispatcher.request_remote_view(uid);
            }
            Err(err) => {
                self.dispatcher.record_encoding_failure();
                warn!(event = event.name(), error = %err, "event dropped");
            }
        }
    }
}

/// One engine instance wired to one managed-runtime callback target.
///
/// Dropping a bridge that was not destroyed tears it down.
pub struct Bridge {
    owner: Arc<EngineOwner>,
    dispatcher: Arc<Dispatcher>,
}

impl Bridge {
    /// Acquire the callback target for `context` on the calling thread and
    /// start engine construction.
    pub fn create(
        factory: Arc<dyn EngineFactory>,
        runtime: RuntimeHandle,
        context: ContextHandle,
        config: BridgeConfig,
        mode: InitMode,
    ) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::acquire(runtime, context)?);
        let relay = Arc::new(EventRelay {
            translator: EventTranslator::from_config(&config),
            dispatcher: Arc::clone(&dispatcher),
        });
        let engine_context = EngineContext {
            app_id: config.app_id.clone(),
            context,
        };

        let bridge = Self {
            owner: Arc::new(EngineOwner::new(config)),
            dispatcher,
        };
        debug!(?mode, "creating bridge");
        match mode {
            InitMode::Sync => bridge
                .owner
                .initialize(factory.as_ref(), engine_context, relay)?,
            InitMode::Async => bridge
                .owner
                .spawn_initialize(factory, engine_context, relay)?,
        }
        Ok(bridge)
    }

    pub fn join_channel(&self, channel: &str) -> Result<()> {
        self.owner.join_channel(channel)
    }

    pub fn leave_channel(&self) -> Result<()> {
        self.owner.leave_channel()
    }

    pub fn setup_local_video(&self, view: ViewHandle) -> Result<()> {
        self.owner.setup_local_video(view)
    }

    pub fn setup_remote_video(&self, uid: Uid, view: ViewHandle) -> Result<()> {
        self.owner.setup_remote_video(uid, view)
    }

    pub fn switch_camera(&self) -> Result<()> {
        self.owner.switch_camera()
    }

    pub fn mute_local_audio_stream(&self, mute: bool) -> Result<()> {
        self.owner.mute_local_audio_stream(mute)
    }

    pub fn mute_local_video_stream(&self, mute: bool) -> Result<()> {
        self.owner.mute_local_video_stream(mute)
    }

    /// Tear down the engine, then release the callback target.
    ///
    /// Blocks until a running background initializer finishes. Called from
    /// inside a delivery or engine call, both releases are deferred until
    /// that call returns. If the target could not be released, calling again
    /// retries it; otherwise a second call returns `AlreadyClosed`.
    pub fn destroy(&self) -> Result<()> {
        match self.owner.teardown() {
            Ok(()) => self.dispatcher.release_target(),
            Err(BridgeError::AlreadyClosed) if self.dispatcher.needs_release() => {
                self.dispatcher.release_target()
            }
            Err(err) => Err(err),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.owner.state()
    }

    /// See [`EngineOwner::wait_ready`].
    pub fn wait_ready(&self, timeout: Option<Duration>) -> Result<()> {
        self.owner.wait_ready(timeout)
    }

    pub fn construction_error(&self) -> Option<BridgeError> {
        self.owner.construction_error()
    }

    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.dispatcher.stats()
    }

    pub fn config(&self) -> &BridgeConfig {
        self.owner.config()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.owner.is_torn_down() && !self.dispatcher.needs_release() {
            return;
        }
        if let Err(err) = self.destroy() {
            warn!(error = %err, "teardown on drop failed");
        }
    }
}
