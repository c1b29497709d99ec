//! Error types for the sync engine.

use crate::config::Endpoint;
use minesync_protocol::ProtocolError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The save-games root could not be determined or accessed.
    #[error("cannot resolve save-games root: {0}")]
    PathResolution(String),

    /// A filesystem operation failed.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path the operation was working on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A message was malformed or truncated.
    #[error("protocol error on {endpoint} endpoint: {source}")]
    Protocol {
        /// Endpoint the message came from.
        endpoint: Endpoint,
        /// Underlying error.
        #[source]
        source: ProtocolError,
    },

    /// Dialing or talking to an endpoint failed.
    #[error("connection to {endpoint} endpoint at {address} failed: {source}")]
    Connection {
        /// Endpoint being contacted.
        endpoint: Endpoint,
        /// Address being contacted.
        address: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// An endpoint did not answer in time.
    #[error("{endpoint} endpoint timed out")]
    Timeout {
        /// Endpoint being contacted.
        endpoint: Endpoint,
    },

    /// Packing or unpacking a save failed.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// An inventory listed the same save twice.
    #[error("duplicate save name in inventory: {0}")]
    DuplicateSave(String),

    /// The remote store has no data for a requested archive.
    #[error("remote store returned no data for {0}")]
    NotFound(String),

    /// The local save changed after the inventory was taken.
    #[error("local save {0:?} was modified during the sync; not overwriting it")]
    LocalChanged(String),
}

impl SyncError {
    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Classifies a protocol error raised while talking to `endpoint`.
    ///
    /// Stream failures become connection errors or timeouts; everything
    /// else stays a protocol error.
    pub fn from_protocol(endpoint: Endpoint, address: &str, err: ProtocolError) -> Self {
        if err.is_timeout() {
            return Self::Timeout { endpoint };
        }
        match err {
            ProtocolError::Io(source) => Self::Connection {
                endpoint,
                address: address.to_string(),
                source,
            },
            source => Self::Protocol { endpoint, source },
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Connection { .. } | SyncError::Timeout { .. })
    }

    /// Returns true if this error aborts a run wherever it is raised.
    ///
    /// Other errors abort a run only when raised while building the
    /// inventories; during transfers they fail a single save.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::PathResolution(_))
    }
}

/// Errors that can occur while packing or unpacking a save.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A file or directory could not be read or written.
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The source of a pack is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The directory name cannot be stored in an archive.
    #[error("directory name is not valid UTF-8: {}", .0.display())]
    InvalidName(PathBuf),

    /// Walking the source tree failed.
    #[error("failed to walk save directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// The zip container is corrupt or could not be written.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry would be extracted outside the destination.
    #[error("archive entry escapes destination: {0}")]
    UnsafeEntry(String),

    /// The archive holds no entries.
    #[error("archive is empty")]
    Empty,

    /// The archive does not hold exactly one top-level directory.
    #[error("archive must hold a single save directory: {0}")]
    Layout(String),

    /// The archive holds a different save than the one requested.
    #[error("archive {archive} holds save {save:?}")]
    NameMismatch {
        /// Archive name that was requested.
        archive: String,
        /// Save directory found inside it.
        save: String,
    },
}

impl ArchiveError {
    /// Creates an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
