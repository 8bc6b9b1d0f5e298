use rtcbridge_engine::EngineError;
use rtcbridge_envelope::EnvelopeError;

use crate::owner::BridgeState;

/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The engine could not be created, initialized or configured.
    #[error("engine construction failed (code: {0})")]
    ConstructionFailed(i32),

    /// A command was issued outside the `Ready` state.
    #[error("bridge not ready (state: {0})")]
    NotReady(BridgeState),

    /// A command was issued from inside an engine call on the same thread,
    /// typically from a handler reacting to a synchronous callback.
    #[error("{0} issued from inside an engine call")]
    Reentrant(&'static str),

    /// Teardown already ran.
    #[error("bridge already closed")]
    AlreadyClosed,

    /// The calling thread could not be attached to the managed runtime.
    #[error("thread attach failed: {0}")]
    AttachFailed(String),

    /// The calling thread could not be detached again. Logged, never fatal.
    #[error("thread detach failed: {0}")]
    DetachFailed(String),

    /// The managed runtime rejected a delivery.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The managed-runtime callback object could not be acquired.
    #[error("callback target unavailable: {0}")]
    TargetUnavailable(String),

    /// Envelope encoding or decoding error.
    #[error("envelope error: {0}")]
    Encoding(#[from] EnvelopeError),

    /// An engine command returned a nonzero code.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// No process-wide runtime handle has been installed.
    #[error("managed runtime not installed")]
    RuntimeNotInstalled,

    /// The process-wide runtime handle is already installed.
    #[error("managed runtime already installed")]
    RuntimeAlreadyInstalled,

    /// The background initializer could not be started.
    #[error("could not start engine initializer: {0}")]
    InitializerSpawn(std::io::Error),

    /// The background initializer panicked.
    #[error("engine initializer panicked")]
    InitializerPanicked,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
