/// Errors that can occur while building or reading envelopes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// A field does not fit in the remaining payload capacity.
    #[error("envelope overflow: field needs {needed} bytes, {remaining} of {capacity} remaining")]
    EncodingOverflow {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    /// The wire image is shorter than the length prefix.
    #[error("envelope truncated ({len} bytes, prefix needs 2)")]
    Truncated { len: usize },

    /// The declared length does not match the wire image.
    #[error("envelope length mismatch (declared {declared}, actual {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A reader asked for more bytes than the payload holds.
    #[error("unexpected end of payload (needed {needed}, remaining {remaining})")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// Bytes were left over after the last field of the layout.
    #[error("{extra} trailing bytes after last field")]
    TrailingBytes { extra: usize },

    /// A decimal field contains non-digit bytes or overflows.
    #[error("invalid decimal field")]
    InvalidDecimal,

    /// The message id has no known payload layout.
    #[error("unknown message id {0}")]
    UnknownMessage(u16),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
