//! # MineSync Server
//!
//! Reference save-game server for MineSync.
//!
//! This crate provides:
//! - The three MineSync endpoints (manifest, upload, download) over plain TCP
//! - An in-memory store and an on-disk store for archives
//! - Name validation so stored archives can never escape the store
//!
//! # Architecture
//!
//! Each endpoint has its own listener and accept thread. Connections are
//! handled one at a time on that thread: read at most one request, write at
//! most one response, close. The store is shared between the three threads.
//!
//! ```rust,ignore
//! use minesync_server::{ServerConfig, SyncServer};
//!
//! let server = SyncServer::new(ServerConfig::ephemeral())?;
//! let handle = server.start()?;
//! println!("manifest endpoint on {}", handle.manifest_addr());
//! handle.shutdown();
//! ```
//!
//! # Timestamps
//!
//! Uploaded archives are stamped with the time they were received. The
//! manifest reports that stamp as `LastModifiedDate`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{RequestHandler, Service};
pub use server::{ServerHandle, SyncServer};
pub use store::{validate_name, DirectoryStore, MemoryStore, SaveStore};
