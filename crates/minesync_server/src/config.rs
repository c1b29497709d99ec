//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the manifest endpoint.
    pub manifest_addr: SocketAddr,
    /// Address of the upload endpoint.
    pub upload_addr: SocketAddr,
    /// Address of the download endpoint.
    pub download_addr: SocketAddr,
    /// Directory holding archives. Archives are kept in memory when unset.
    pub storage: Option<PathBuf>,
    /// Read/write timeout per connection.
    pub io_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(
        manifest_addr: SocketAddr,
        upload_addr: SocketAddr,
        download_addr: SocketAddr,
    ) -> Self {
        Self {
            manifest_addr,
            upload_addr,
            download_addr,
            storage: None,
            io_timeout: Some(Duration::from_secs(60)),
        }
    }

    /// Creates a configuration binding all endpoints to free loopback ports.
    pub fn ephemeral() -> Self {
        let any = SocketAddr::from(([127, 0, 0, 1], 0));
        Self::new(any, any, any)
    }

    /// Stores archives as files in `dir`.
    pub fn with_storage(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage = Some(dir.into());
        self
    }

    /// Sets the per-connection read/write timeout.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            SocketAddr::from(([127, 0, 0, 1], 9998)),
            SocketAddr::from(([127, 0, 0, 1], 9999)),
            SocketAddr::from(([127, 0, 0, 1], 9997)),
        )
    }
}
