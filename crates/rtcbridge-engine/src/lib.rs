//! Engine-facing seam for rtcbridge.
//!
//! The real-time communication engine is an external SDK. This crate
//! describes what the bridge needs from it:
//! - [`RtcEngine`]: the command surface of one engine instance
//! - [`EngineFactory`]: how an instance is created
//! - [`EventHandler`] / [`EngineEvent`]: the callbacks it fires
//!
//! With the `test-util` feature, `LoopbackEngine` is an in-process
//! implementation that records calls and lets a controller fire events from
//! any thread.

pub mod error;
pub mod event;
#[cfg(any(test, feature = "test-util"))]
pub mod loopback;
pub mod traits;
pub mod types;

pub use error::{check, EngineError, Result, ERR_FAILED, ERR_INVALID_ARGUMENT};
pub use event::EngineEvent;
#[cfg(any(test, feature = "test-util"))]
pub use loopback::{EngineCall, LoopbackController, LoopbackEngine, LoopbackFactory};
pub use traits::{EngineFactory, EventHandler, RtcEngine};
pub use types::{
    ChannelProfile, ClientRole, ContextHandle, EngineContext, OfflineReason, RenderMode, Uid,
    VideoCanvas, VideoProfile, ViewHandle,
};
