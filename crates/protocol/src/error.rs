use thiserror::Error;

/// Errors generated by the wire protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a frame declares an event type that is
    /// not part of the wire enumeration.
    #[error("unknown event type {0}")]
    UnknownEventType(u8),

    /// Error generated when a frame declares a payload tag other
    /// than none, string or bytes.
    #[error("unknown payload tag {0}")]
    UnknownPayloadTag(u8),

    /// Error generated when a string payload is not valid UTF-16LE.
    #[error("string payload is not valid UTF-16LE")]
    InvalidStringPayload,

    /// Error generated when a string payload has an odd number of
    /// bytes.
    #[error("string payload byte length {0} is odd")]
    OddStringPayload(usize),

    /// Error generated by input/output, including truncated or
    /// oversized frames.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
