//! Crate-level error types
//!
//! Errors that end a connection. Per-subscription failures never show up
//! here: those are reported to the client as `error` messages (see
//! [`crate::push::PushError`]).

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or listener I/O failure
    Io(std::io::Error),
    /// The peer violated the push protocol
    Protocol(ProtocolError),
}

/// Protocol violations by the peer
///
/// All variants are fatal for the connection they occur on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not valid JSON or misses required fields
    Malformed(String),
    /// Frame carries an `@type` tag this side does not understand
    UnsupportedMessageKind(String),
    /// A single frame exceeded the configured maximum size
    FrameTooLarge { size: usize, max: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Malformed(reason) => write!(f, "Malformed message: {}", reason),
            ProtocolError::UnsupportedMessageKind(kind) => {
                write!(f, "Unknown message type: {}", kind)
            }
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame of {} bytes exceeds limit of {} bytes", size, max)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Malformed(e.to_string())
    }
}
