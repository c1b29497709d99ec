//! Error types for the protocol crate.

use std::io;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The underlying stream failed while reading or writing.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended before a complete message was received.
    #[error("message truncated: stream closed before a complete message was read")]
    Truncated,

    /// The bytes received are not a valid message.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },

    /// The message could not be serialized.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a malformed message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the transport rather than the
    /// message content.
    pub fn is_io(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }

    /// Returns true if the underlying stream timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

impl From<ciborium::de::Error<io::Error>> for ProtocolError {
    fn from(err: ciborium::de::Error<io::Error>) -> Self {
        use ciborium::de::Error;

        match err {
            Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => ProtocolError::Truncated,
            Error::Io(e) => ProtocolError::Io(e),
            Error::Syntax(offset) => {
                ProtocolError::malformed(format!("invalid CBOR at offset {offset}"))
            }
            Error::Semantic(Some(offset), msg) => {
                ProtocolError::malformed(format!("{msg} (at offset {offset})"))
            }
            Error::Semantic(None, msg) => ProtocolError::malformed(msg),
            Error::RecursionLimitExceeded => ProtocolError::malformed("nesting too deep"),
        }
    }
}

impl From<ciborium::ser::Error<io::Error>> for ProtocolError {
    fn from(err: ciborium::ser::Error<io::Error>) -> Self {
        match err {
            ciborium::ser::Error::Io(e) => ProtocolError::Io(e),
            ciborium::ser::Error::Value(msg) => ProtocolError::encoding_failed(msg),
        }
    }
}
