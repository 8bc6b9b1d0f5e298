/// Generic engine failure code, used when the engine gives no better one.
pub const ERR_FAILED: i32 = 1;

/// An argument could not be handed to the engine.
pub const ERR_INVALID_ARGUMENT: i32 = 2;

/// Errors reported by the external engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// An engine call returned a nonzero code.
    #[error("{op} failed (code: {code})")]
    Call { op: &'static str, code: i32 },

    /// The engine instance could not be created at all.
    #[error("engine could not be created: {0}")]
    Create(String),
}

impl EngineError {
    /// The engine status code behind this error.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::Call { code, .. } => *code,
            EngineError::Create(_) => ERR_FAILED,
        }
    }
}

/// Map an engine return code to a result. Zero is success.
pub fn check(op: &'static str, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(EngineError::Call { op, code })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
