//! # MineSync Engine
//!
//! Reconciles local save-game directories with a remote store and moves
//! the differing saves in either direction.
//!
//! This crate provides:
//! - Save-games root resolution from a per-platform table
//! - Local and remote inventories
//! - The reconciler (which saves to upload, which to download)
//! - Zip packing and unpacking of save directories
//! - A blocking TCP transport for the three MineSync endpoints
//! - `SyncEngine`, which runs one full sync cycle
//!
//! ## Sync cycle
//!
//! 1. Scan the save-games root into the local inventory
//! 2. Fetch the remote manifest into the remote inventory
//! 3. Reconcile the two (last-modified wins, ties transfer nothing)
//! 4. Upload every save in the upload list, one connection per save
//! 5. Download every save in the download list and unpack it in place
//!
//! ## Key Invariants
//!
//! - Everything runs sequentially on the calling thread
//! - One save's failure never blocks the other saves in its batch
//! - Only failures to scan the local root or read the manifest abort a run
//! - An unpacked save is never left half-written

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod archive;
mod config;
mod engine;
mod error;
mod inventory;
mod paths;
mod reconcile;
mod transport;

pub use archive::{Archiver, ZipArchiver, STAGING_PREFIX};
pub use config::{Endpoint, Endpoints, RetryConfig, SyncConfig};
pub use engine::{Direction, EntryFailure, SyncEngine, SyncReport, SyncSnapshot, TransferRecord};
pub use error::{ArchiveError, ArchiveResult, SyncError, SyncResult};
pub use inventory::{
    build_local_inventory, build_remote_inventory, modified_millis, Inventory, Origin, SaveEntry,
};
pub use paths::{
    candidate_paths, resolve_save_root, BaseDir, BaseDirs, PlatformRule, SystemDirs,
    PLATFORM_RULES,
};
pub use reconcile::{
    compute_downloads, compute_uploads, find_collisions, reconcile, NameCollision, SyncPlan,
};
pub use transport::{MockConnection, MockTransport, SyncTransport, TcpTransport};
