//! Error types for the sync server.

use minesync_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// An archive name cannot be used as a storage key.
    #[error("invalid archive name: {0:?}")]
    InvalidName(String),

    /// A request could not be decoded or a response encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Reading or writing the archive store failed.
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a storage error.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the client sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::InvalidName(_) | ServerError::Protocol(_))
    }
}
