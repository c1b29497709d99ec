//! Transport layer abstraction for sync operations.
//!
//! Every exchange uses a fresh connection to one of the three endpoints.
//! The engine writes its request (if any), reads the response (if any) and
//! drops the connection, which closes it.

use crate::config::{Endpoint, Endpoints, SyncConfig};
use crate::error::{SyncError, SyncResult};
use minesync_protocol::{Message, SaveManifest, SyncEnvelope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Opens connections to the sync endpoints.
///
/// This trait abstracts the network layer so the engine can run against
/// real sockets or an in-memory double.
pub trait SyncTransport {
    /// Connection type produced by this transport.
    type Connection: Read + Write;

    /// Opens a new connection to `endpoint`.
    fn connect(&self, endpoint: Endpoint) -> SyncResult<Self::Connection>;

    /// Returns the address of `endpoint`, for diagnostics.
    fn address(&self, endpoint: Endpoint) -> String;
}

/// Blocking TCP transport.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoints: Endpoints,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Creates a transport with default timeouts.
    pub fn new(endpoints: Endpoints) -> Self {
        let defaults = SyncConfig::default();
        Self {
            endpoints,
            connect_timeout: defaults.connect_timeout,
            io_timeout: defaults.io_timeout,
        }
    }

    /// Creates a transport from a sync configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
        }
    }

    /// Returns the configured endpoints.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn dial(&self, endpoint: Endpoint, address: &str) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(self.io_timeout)?;
                    stream.set_write_timeout(self.io_timeout)?;
                    trace!("connected to {} endpoint at {}", endpoint, addr);
                    return Ok(stream);
                }
                Err(e) => {
                    trace!("connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{address} resolved to no addresses"),
            )
        }))
    }
}

impl SyncTransport for TcpTransport {
    type Connection = TcpStream;

    fn connect(&self, endpoint: Endpoint) -> SyncResult<TcpStream> {
        let address = self.endpoints.address(endpoint);
        self.dial(endpoint, address).map_err(|source| {
            if source.kind() == io::ErrorKind::TimedOut {
                SyncError::Timeout { endpoint }
            } else {
                SyncError::Connection {
                    endpoint,
                    address: address.to_string(),
                    source,
                }
            }
        })
    }

    fn address(&self, endpoint: Endpoint) -> String {
        self.endpoints.address(endpoint).to_string()
    }
}

#[derive(Debug, Default)]
struct MockState {
    manifest: Option<Vec<u8>>,
    archives: HashMap<String, Vec<u8>>,
    failures: HashMap<Endpoint, u32>,
    connects: HashMap<Endpoint, u32>,
    uploads: Vec<SyncEnvelope>,
    requests: Vec<String>,
}

/// An in-memory transport for testing.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a mock transport serving an empty manifest.
    pub fn new() -> Self {
        let transport = Self::default();
        transport.set_manifest(SaveManifest::default());
        transport
    }

    /// Sets the manifest served on the manifest endpoint.
    pub fn set_manifest(&self, manifest: SaveManifest) {
        // Encoding a manifest of plain strings and integers does not fail.
        let bytes = manifest.encode().unwrap_or_default();
        self.state.lock().manifest = Some(bytes);
    }

    /// Serves raw bytes on the manifest endpoint.
    pub fn set_manifest_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().manifest = Some(bytes);
    }

    /// Stores an archive served on the download endpoint.
    pub fn set_archive(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.state.lock().archives.insert(name.into(), bytes);
    }

    /// Makes the next `count` connects to `endpoint` fail.
    pub fn set_failures(&self, endpoint: Endpoint, count: u32) {
        self.state.lock().failures.insert(endpoint, count);
    }

    /// Number of connections opened to `endpoint`, failed ones included.
    pub fn connect_count(&self, endpoint: Endpoint) -> u32 {
        self.state
            .lock()
            .connects
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Envelopes received on the upload endpoint, in order.
    pub fn uploaded(&self) -> Vec<SyncEnvelope> {
        self.state.lock().uploads.clone()
    }

    /// Names requested on the download endpoint, in order.
    pub fn requested(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }
}

impl SyncTransport for MockTransport {
    type Connection = MockConnection;

    fn connect(&self, endpoint: Endpoint) -> SyncResult<MockConnection> {
        let mut state = self.state.lock();
        *state.connects.entry(endpoint).or_insert(0) += 1;

        if let Some(remaining) = state.failures.get_mut(&endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SyncError::Connection {
                    endpoint,
                    address: self.address(endpoint),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                });
            }
        }

        let input = match endpoint {
            Endpoint::Manifest => {
                let manifest = state.manifest.clone().unwrap_or_default();
                Some(Cursor::new(manifest))
            }
            Endpoint::Upload => Some(Cursor::new(Vec::new())),
            Endpoint::Download => None,
        };
        debug!("mock connection to {} endpoint", endpoint);

        Ok(MockConnection {
            endpoint,
            state: Arc::clone(&self.state),
            input,
            output: Vec::new(),
        })
    }

    fn address(&self, endpoint: Endpoint) -> String {
        format!("mock:{endpoint}")
    }
}

/// A connection opened by [`MockTransport`].
///
/// Download connections answer once the request has been written; upload
/// connections record their envelope when dropped.
#[derive(Debug)]
pub struct MockConnection {
    endpoint: Endpoint,
    state: Arc<Mutex<MockState>>,
    input: Option<Cursor<Vec<u8>>>,
    output: Vec<u8>,
}

impl MockConnection {
    fn answer_download(&mut self) -> io::Result<Cursor<Vec<u8>>> {
        let request = SyncEnvelope::decode(&self.output)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let mut state = self.state.lock();
        state.requests.push(request.name.clone());
        let data = state
            .archives
            .get(&request.name)
            .cloned()
            .unwrap_or_default();
        let response = SyncEnvelope::new(request.name, data)
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Cursor::new(response))
    }
}

impl Read for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.input.is_none() {
            let response = self.answer_download()?;
            self.input = Some(response);
        }
        match self.input.as_mut() {
            Some(input) => input.read(buf),
            None => Ok(0),
        }
    }
}

impl Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if self.endpoint != Endpoint::Upload || self.output.is_empty() {
            return;
        }
        if let Ok(envelope) = SyncEnvelope::decode(&self.output) {
            self.state.lock().uploads.push(envelope);
        }
    }
}
