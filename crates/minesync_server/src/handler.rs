//! Request handlers for the three endpoints.

use crate::error::ServerResult;
use crate::store::{millis, SaveStore};
use minesync_protocol::{Message, SyncEnvelope};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// One of the services the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Writes the save listing.
    Manifest,
    /// Receives one archive.
    Upload,
    /// Answers one archive request.
    Download,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Manifest => "manifest",
            Service::Upload => "upload",
            Service::Download => "download",
        };
        f.write_str(name)
    }
}

/// Handles single connections against a shared store.
#[derive(Clone)]
pub struct RequestHandler {
    store: Arc<dyn SaveStore>,
}

impl RequestHandler {
    /// Creates a handler backed by `store`.
    pub fn new(store: Arc<dyn SaveStore>) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<dyn SaveStore> {
        &self.store
    }

    /// Serves one connection for `service`.
    pub fn handle<S>(&self, service: Service, stream: &mut S) -> ServerResult<()>
    where
        S: Read + Write + ?Sized,
    {
        match service {
            Service::Manifest => self.handle_manifest(stream),
            Service::Upload => self.handle_upload(stream),
            Service::Download => self.handle_download(stream),
        }
    }

    /// Writes the current listing.
    pub fn handle_manifest<W: Write + ?Sized>(&self, stream: &mut W) -> ServerResult<()> {
        let manifest = self.store.list()?;
        debug!("serving manifest with {} saves", manifest.len());
        manifest.write_to(stream)?;
        Ok(())
    }

    /// Reads one envelope and stores it, stamped with the receive time.
    pub fn handle_upload<R: Read + ?Sized>(&self, stream: &mut R) -> ServerResult<()> {
        let envelope = SyncEnvelope::read_from(stream)?;
        let received = millis(SystemTime::now());
        self.store.put(&envelope.name, &envelope.data, received)?;
        info!("received {} ({} bytes)", envelope.name, envelope.data.len());
        Ok(())
    }

    /// Reads one request and answers with the stored archive.
    ///
    /// Unknown archives are answered with an envelope carrying no data.
    pub fn handle_download<S: Read + Write + ?Sized>(&self, stream: &mut S) -> ServerResult<()> {
        let request = SyncEnvelope::read_from(stream)?;
        let data = match self.store.get(&request.name)? {
            Some(data) => data,
            None => {
                warn!("requested unknown archive {}", request.name);
                Vec::new()
            }
        };
        debug!("sending {} ({} bytes)", request.name, data.len());
        SyncEnvelope::new(request.name, data).write_to(stream)?;
        Ok(())
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::store::MemoryStore;
    use minesync_protocol::SaveManifest;
    use std::io::Cursor;

    /// A duplex stream: reads from `input`, writes into `output`.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn handler() -> RequestHandler {
        RequestHandler::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn upload_then_list_then_download() {
        let handler = handler();
        let before = millis(SystemTime::now());

        let upload = SyncEnvelope::new("minesync_A.zip", vec![1, 2, 3])
            .encode()
            .unwrap();
        handler
            .handle(Service::Upload, &mut Duplex::new(upload))
            .unwrap();

        let mut stream = Duplex::new(Vec::new());
        handler.handle(Service::Manifest, &mut stream).unwrap();
        let manifest = SaveManifest::decode(&stream.output).unwrap();
        assert_eq!(manifest.saves.len(), 1);
        assert_eq!(manifest.saves[0].name, "minesync_A.zip");
        assert!(manifest.saves[0].last_modified >= before);

        let request = SyncEnvelope::request("minesync_A.zip").encode().unwrap();
        let mut stream = Duplex::new(request);
        handler.handle(Service::Download, &mut stream).unwrap();
        let response = SyncEnvelope::decode(&stream.output).unwrap();
        assert_eq!(response.data, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_download_gets_empty_data() {
        let request = SyncEnvelope::request("minesync_Nope.zip").encode().unwrap();
        let mut stream = Duplex::new(request);
        handler().handle(Service::Download, &mut stream).unwrap();

        let response = SyncEnvelope::decode(&stream.output).unwrap();
        assert_eq!(response.name, "minesync_Nope.zip");
        assert!(response.is_empty());
    }

    #[test]
    fn truncated_upload_is_rejected() {
        let upload = SyncEnvelope::new("minesync_A.zip", vec![7; 64]).encode().unwrap();
        let handler = handler();
        let err = handler
            .handle(Service::Upload, &mut Duplex::new(upload[..10].to_vec()))
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(handler.store().list().unwrap().is_empty());
    }

    #[test]
    fn unsafe_upload_name_is_rejected() {
        let upload = SyncEnvelope::new("../evil.zip", vec![1]).encode().unwrap();
        let err = handler()
            .handle(Service::Upload, &mut Duplex::new(upload))
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidName(_)));
    }
}
