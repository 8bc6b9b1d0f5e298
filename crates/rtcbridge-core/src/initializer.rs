use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::{BridgeError, Result};

/// Name of the background construction thread.
pub const INITIALIZER_THREAD_NAME: &str = "rtc-engine-init";

/// Background engine construction.
///
/// Owned by the engine owner until teardown, which joins it with no
/// timeout. A stuck engine constructor therefore blocks teardown.
#[derive(Debug)]
pub struct AsyncInitializer {
    handle: JoinHandle<()>,
}

impl AsyncInitializer {
    /// Run `work` on a new named thread.
    pub fn spawn<F>(work: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(INITIALIZER_THREAD_NAME.to_string())
            .spawn(work)
            .map_err(BridgeError::InitializerSpawn)?;
        debug!("engine initializer started");
        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to finish.
    pub fn join(self) -> Result<()> {
        self.handle.join().map_err(|_| {
            error!("engine initializer panicked");
            BridgeError::InitializerPanicked
        })
    }
}
