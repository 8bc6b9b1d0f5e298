//! Engine ownership, event translation and cross-runtime delivery.
//!
//! This is the bridge proper. A [`Bridge`] owns one engine instance, turns
//! its callbacks into envelopes and hands them to the managed runtime from
//! whichever engine thread fired them, attaching that thread for the
//! duration of the call.

pub mod bridge;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod error;
pub mod initializer;
pub mod owner;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;
pub mod runtime;
mod scope;
pub mod translator;

pub use bridge::{Bridge, InitMode};
pub use config::{BridgeConfig, ReadyPolicy, WireSchema};
pub use decode::{decode_event, DecodedEvent};
pub use dispatcher::{DispatchSnapshot, DispatchStats, Dispatcher};
pub use error::{BridgeError, Result};
pub use initializer::{AsyncInitializer, INITIALIZER_THREAD_NAME};
pub use owner::{BridgeState, EngineOwner};
#[cfg(any(test, feature = "test-util"))]
pub use recording::{Delivery, RecordingRuntime};
pub use runtime::{
    AttachGuard, AttachState, CallbackTarget, ManagedRuntime, RuntimeError, RuntimeHandle,
};
pub use translator::{EventTranslator, Translation};
