//! Host a real-time communication engine behind a managed runtime.
//!
//! rtcbridge owns one engine instance per managed object, translates the
//! engine's callbacks into compact envelopes and delivers them to the
//! object on whatever thread the engine fired them from.
//!
//! # Crate Structure
//!
//! - [`envelope`]: length-prefixed event envelopes and their codec
//! - [`engine`]: the engine command surface and callbacks
//! - [`core`]: engine ownership, lifecycle state, translation and delivery
//!
//! The C surface lives in `rtcbridge-ffi`. The `test-util` feature exposes
//! the loopback engine and the recording runtime for downstream tests.

/// Re-export envelope types.
pub mod envelope {
    pub use rtcbridge_envelope::*;
}

/// Re-export engine types.
pub mod engine {
    pub use rtcbridge_engine::*;
}

/// Re-export bridge types.
pub mod core {
    pub use rtcbridge_core::*;
}

pub use rtcbridge_core::{Bridge, BridgeConfig, BridgeError, BridgeState, InitMode, Result};
