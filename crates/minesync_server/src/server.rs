//! Listener threads for the three endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{RequestHandler, Service};
use crate::store::{DirectoryStore, MemoryStore, SaveStore};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The sync server.
///
/// # Example
///
/// ```
/// use minesync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::ephemeral()).unwrap();
/// let handle = server.start().unwrap();
/// assert_ne!(handle.upload_addr().port(), 0);
/// handle.shutdown();
/// ```
#[derive(Debug)]
pub struct SyncServer {
    config: ServerConfig,
    handler: RequestHandler,
}

impl SyncServer {
    /// Creates a server with the store selected by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the storage directory cannot be created.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store: Arc<dyn SaveStore> = match &config.storage {
            Some(dir) => Arc::new(DirectoryStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_store(config, store))
    }

    /// Creates a server backed by an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn SaveStore>) -> Self {
        Self {
            config,
            handler: RequestHandler::new(store),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<dyn SaveStore> {
        self.handler.store()
    }

    /// Binds all three endpoints and starts serving in background threads.
    ///
    /// # Errors
    ///
    /// Fails if any address cannot be bound; nothing is left running.
    pub fn start(&self) -> ServerResult<ServerHandle> {
        let bindings = [
            (Service::Manifest, self.config.manifest_addr),
            (Service::Upload, self.config.upload_addr),
            (Service::Download, self.config.download_addr),
        ];

        let mut listeners = Vec::with_capacity(bindings.len());
        for (service, addr) in bindings {
            let listener = TcpListener::bind(addr)?;
            let local = listener.local_addr()?;
            info!("{} endpoint listening on {}", service, local);
            listeners.push((service, local, listener));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(listeners.len());
        for (service, local, listener) in listeners {
            let handler = self.handler.clone();
            let stop = Arc::clone(&stop);
            let io_timeout = self.config.io_timeout;
            let thread = thread::Builder::new()
                .name(format!("minesync-{service}"))
                .spawn(move || {
                    accept_loop(service, listener, handler, stop, io_timeout)
                })?;
            workers.push(Worker {
                service,
                addr: local,
                thread: Some(thread),
            });
        }

        Ok(ServerHandle { stop, workers })
    }
}

fn accept_loop(
    service: Service,
    listener: TcpListener,
    handler: RequestHandler,
    stop: Arc<AtomicBool>,
    io_timeout: Option<Duration>,
) {
    for stream in listener.incoming() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("{} accept failed: {}", service, e);
                continue;
            }
        };
        if let Err(e) = configure(&stream, io_timeout) {
            warn!("{} connection setup failed: {}", service, e);
            continue;
        }

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        match handler.handle(service, &mut stream) {
            Ok(()) => debug!("{} request from {} done", service, peer),
            Err(e) => warn!("{} request from {} failed: {}", service, peer, e),
        }
    }
    debug!("{} endpoint stopped", service);
}

fn configure(stream: &TcpStream, io_timeout: Option<Duration>) -> ServerResult<()> {
    stream.set_read_timeout(io_timeout)?;
    stream.set_write_timeout(io_timeout)?;
    Ok(())
}

#[derive(Debug)]
struct Worker {
    service: Service,
    addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

/// A running server. Dropping the handle stops it.
#[derive(Debug)]
pub struct ServerHandle {
    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl ServerHandle {
    /// Returns the bound address of `service`.
    pub fn addr(&self, service: Service) -> Option<SocketAddr> {
        self.workers
            .iter()
            .find(|w| w.service == service)
            .map(|w| w.addr)
    }

    /// Bound address of the manifest endpoint.
    pub fn manifest_addr(&self) -> SocketAddr {
        self.workers[0].addr
    }

    /// Bound address of the upload endpoint.
    pub fn upload_addr(&self) -> SocketAddr {
        self.workers[1].addr
    }

    /// Bound address of the download endpoint.
    pub fn download_addr(&self) -> SocketAddr {
        self.workers[2].addr
    }

    /// Blocks until every endpoint thread has exited.
    pub fn wait(mut self) -> ServerResult<()> {
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                thread.join().map_err(|_| {
                    ServerError::Io(std::io::Error::other(format!(
                        "{} thread panicked",
                        worker.service
                    )))
                })?;
            }
        }
        Ok(())
    }

    /// Stops all endpoints and waits for their threads.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            // Wake the blocked accept so the loop sees the stop flag.
            if let Err(e) = TcpStream::connect(wake_addr(worker.addr)) {
                warn!("could not wake {} endpoint: {}", worker.service, e);
                continue;
            }
            if thread.join().is_err() {
                warn!("{} thread panicked", worker.service);
            }
        }
        info!("server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.workers.iter().any(|w| w.thread.is_some()) {
            self.stop_workers();
        }
    }
}

/// Maps an unspecified bind address to loopback so it can be dialed.
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        match addr {
            SocketAddr::V4(_) => addr.set_ip([127, 0, 0, 1].into()),
            SocketAddr::V6(_) => addr.set_ip(std::net::Ipv6Addr::LOCALHOST.into()),
        }
    }
    addr
}
