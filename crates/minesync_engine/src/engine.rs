//! The sync engine: one full reconcile-and-transfer cycle.

use crate::archive::{Archiver, ZipArchiver};
use crate::config::{Endpoint, SyncConfig};
use crate::error::{ArchiveError, SyncError, SyncResult};
use crate::inventory::{
    build_local_inventory, build_remote_inventory, modified_millis, Inventory, SaveEntry,
};
use crate::paths::{resolve_save_root, SystemDirs};
use crate::reconcile::{reconcile, NameCollision, SyncPlan};
use crate::transport::SyncTransport;
use minesync_protocol::{archive_name, Message, SyncEnvelope};
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local save sent to the remote store.
    Upload,
    /// Remote save fetched into the save-games root.
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Steps of a single save transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    Idle,
    Connected,
    Packed,
    Requested,
    Received,
    Sent,
    Closed,
}

/// A save that was transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    /// Inventory name of the save.
    pub name: String,
    /// Name of the archive on the remote store.
    pub archive_name: String,
    /// Archive size in bytes.
    pub bytes: usize,
}

/// A save whose transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// Inventory name of the save.
    pub name: String,
    /// Direction of the failed transfer.
    pub direction: Direction,
    /// Rendered error.
    pub error: String,
}

impl EntryFailure {
    fn new(entry: &SaveEntry, direction: Direction, error: &SyncError) -> Self {
        Self {
            name: entry.name.clone(),
            direction,
            error: error.to_string(),
        }
    }
}

/// Both inventories and the plan derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    /// Saves found in the save-games root.
    pub local: Inventory,
    /// Saves listed by the remote manifest.
    pub remote: Inventory,
    /// What a sync would transfer.
    pub plan: SyncPlan,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Saves uploaded, in plan order.
    pub uploaded: Vec<TransferRecord>,
    /// Saves downloaded, in plan order.
    pub downloaded: Vec<TransferRecord>,
    /// Saves whose transfer failed.
    pub failures: Vec<EntryFailure>,
    /// Saves skipped because their archive names collide.
    pub collisions: Vec<NameCollision>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncReport {
    /// Returns true if nothing failed or was skipped.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.collisions.is_empty()
    }

    /// Number of saves transferred in either direction.
    pub fn transferred(&self) -> usize {
        self.uploaded.len() + self.downloaded.len()
    }
}

/// Runs sync cycles between one save-games root and a remote store.
pub struct SyncEngine<T: SyncTransport, A: Archiver = ZipArchiver> {
    config: SyncConfig,
    save_root: PathBuf,
    transport: T,
    archiver: A,
}

impl<T: SyncTransport> SyncEngine<T, ZipArchiver> {
    /// Creates an engine from configuration.
    ///
    /// The save-games root is taken from the configuration or resolved for
    /// the current platform.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PathResolution`] if no root is configured and
    /// none can be found.
    pub fn from_config(config: SyncConfig, transport: T) -> SyncResult<Self> {
        let save_root = match &config.save_root {
            Some(root) => root.clone(),
            None => resolve_save_root(std::env::consts::OS, &SystemDirs)?,
        };
        let archiver = match &config.temp_dir {
            Some(dir) => ZipArchiver::with_temp_dir(dir),
            None => ZipArchiver::new(),
        };
        Ok(Self::new(config, save_root, transport, archiver))
    }
}

impl<T: SyncTransport, A: Archiver> SyncEngine<T, A> {
    /// Creates an engine for `save_root`.
    pub fn new(
        config: SyncConfig,
        save_root: impl Into<PathBuf>,
        transport: T,
        archiver: A,
    ) -> Self {
        Self {
            config,
            save_root: save_root.into(),
            transport,
            archiver,
        }
    }

    /// Returns the save-games root.
    pub fn save_root(&self) -> &Path {
        &self.save_root
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds both inventories and reconciles them without transferring.
    ///
    /// # Errors
    ///
    /// Fails if the save-games root is unusable, cannot be scanned, or the
    /// remote manifest cannot be fetched.
    pub fn plan(&self) -> SyncResult<SyncSnapshot> {
        if !self.save_root.is_dir() {
            return Err(SyncError::PathResolution(format!(
                "{} is not a directory",
                self.save_root.display()
            )));
        }

        let local = build_local_inventory(&self.save_root)?;
        let remote = self.with_retry("manifest fetch", || self.fetch_manifest())?;
        let plan = reconcile(&local, &remote);

        debug!(
            "plan: {} local, {} remote, {} to upload, {} to download",
            local.len(),
            remote.len(),
            plan.uploads.len(),
            plan.downloads.len()
        );
        Ok(SyncSnapshot {
            local,
            remote,
            plan,
        })
    }

    /// Runs one full sync cycle: uploads first, then downloads.
    ///
    /// # Errors
    ///
    /// Returns an error only if planning fails. Per-save failures are
    /// recorded in the report.
    pub fn run(&self) -> SyncResult<SyncReport> {
        let start = Instant::now();
        info!("syncing saves in {}", self.save_root.display());

        let snapshot = self.plan()?;
        let mut report = SyncReport {
            collisions: snapshot.plan.collisions.clone(),
            ..SyncReport::default()
        };
        for collision in &report.collisions {
            warn!(
                "skipping saves {:?}: all map to {}",
                collision.saves, collision.archive_name
            );
        }

        let uploads_started = modified_millis(SystemTime::now());
        for entry in &snapshot.plan.uploads {
            match self.with_retry(&entry.name, || self.upload_entry(entry)) {
                Ok(record) => {
                    info!("uploaded {} ({} bytes)", record.name, record.bytes);
                    report.uploaded.push(record);
                }
                Err(e) => {
                    warn!("upload of {} failed: {}", entry.name, e);
                    report
                        .failures
                        .push(EntryFailure::new(entry, Direction::Upload, &e));
                }
            }
        }

        if !report.uploaded.is_empty() {
            self.settle_uploads(&report.uploaded, &snapshot.local, uploads_started);
        }

        for entry in &snapshot.plan.downloads {
            let outcome =
                self.with_retry(&entry.name, || self.download_entry(entry, &snapshot.local));
            match outcome {
                Ok(record) => {
                    info!("downloaded {} ({} bytes)", record.name, record.bytes);
                    report.downloaded.push(record);
                }
                Err(e) => {
                    warn!("download of {} failed: {}", entry.name, e);
                    report
                        .failures
                        .push(EntryFailure::new(entry, Direction::Download, &e));
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            "sync finished in {:?}: {} uploaded, {} downloaded, {} failed",
            report.duration,
            report.uploaded.len(),
            report.downloaded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Runs `op`, retrying connection failures and timeouts with backoff.
    fn with_retry<R>(
        &self,
        what: &str,
        mut op: impl FnMut() -> SyncResult<R>,
    ) -> SyncResult<R> {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    attempt += 1;
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        what, attempt, retry.max_attempts, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_manifest(&self) -> SyncResult<Inventory> {
        let address = self.transport.address(Endpoint::Manifest);
        let mut conn = self.transport.connect(Endpoint::Manifest)?;
        build_remote_inventory(&mut conn, &address)
    }

    fn upload_entry(&self, entry: &SaveEntry) -> SyncResult<TransferRecord> {
        let archive_name = entry.archive_name();
        let address = self.transport.address(Endpoint::Upload);
        let source = self.save_root.join(&entry.name);
        let mut state = TransferState::Idle;

        let mut conn = self.transport.connect(Endpoint::Upload)?;
        advance(&entry.name, &mut state, TransferState::Connected);

        let bytes = self.archiver.pack(&source)?;
        let size = bytes.len();
        advance(&entry.name, &mut state, TransferState::Packed);

        SyncEnvelope::new(archive_name.clone(), bytes)
            .write_to(&mut conn)
            .map_err(|e| SyncError::from_protocol(Endpoint::Upload, &address, e))?;
        advance(&entry.name, &mut state, TransferState::Sent);

        drop(conn);
        advance(&entry.name, &mut state, TransferState::Closed);

        Ok(TransferRecord {
            name: entry.name.clone(),
            archive_name,
            bytes: size,
        })
    }

    fn download_entry(
        &self,
        entry: &SaveEntry,
        local: &Inventory,
    ) -> SyncResult<TransferRecord> {
        self.check_unchanged(entry, local)?;

        let address = self.transport.address(Endpoint::Download);
        let mut state = TransferState::Idle;

        let mut conn = self.transport.connect(Endpoint::Download)?;
        advance(&entry.name, &mut state, TransferState::Connected);

        SyncEnvelope::request(entry.name.clone())
            .write_to(&mut conn)
            .map_err(|e| SyncError::from_protocol(Endpoint::Download, &address, e))?;
        advance(&entry.name, &mut state, TransferState::Requested);

        let response = SyncEnvelope::read_from(&mut conn)
            .map_err(|e| SyncError::from_protocol(Endpoint::Download, &address, e))?;
        advance(&entry.name, &mut state, TransferState::Received);

        drop(conn);
        advance(&entry.name, &mut state, TransferState::Closed);

        if response.name != entry.name {
            warn!(
                "requested {} but the server answered with {}",
                entry.name, response.name
            );
        }
        if response.is_empty() {
            return Err(SyncError::NotFound(entry.name.clone()));
        }

        // The archive must hold the save the plan chose, and nothing else.
        let save = self.archiver.save_name(&response.data)?;
        let replaces = local.iter().find(|l| l.archive_name() == entry.name);
        if archive_name(&save) != entry.name || replaces.is_some_and(|l| l.name != save) {
            return Err(ArchiveError::NameMismatch {
                archive: entry.name.clone(),
                save,
            }
            .into());
        }

        let size = response.data.len();
        let placed = self.archiver.unpack(&response.data, &self.save_root)?;
        if let Err(e) = stamp_modified(&placed, entry.last_modified) {
            warn!("could not set modification time of {:?}: {}", placed, e);
        }

        Ok(TransferRecord {
            name: entry.name.clone(),
            archive_name: entry.name.clone(),
            bytes: size,
        })
    }

    /// Aligns uploaded saves with the stamps the remote store gave them.
    ///
    /// An unchanged save takes the remote stamp, so the next run sees both
    /// sides as equal. A save edited while its upload was in flight is
    /// stamped just past the remote copy, so the edit goes up on the next
    /// run instead of being replaced by the older upload.
    ///
    /// Remote stamps older than `started` predate this run's uploads and
    /// are left alone.
    fn settle_uploads(&self, uploaded: &[TransferRecord], local: &Inventory, started: u64) {
        let remote = match self.with_retry("manifest refresh", || self.fetch_manifest()) {
            Ok(remote) => remote,
            Err(e) => {
                warn!("could not refresh the manifest after uploading: {}", e);
                return;
            }
        };

        for record in uploaded {
            let (Some(before), Some(after)) =
                (local.get(&record.name), remote.get(&record.archive_name))
            else {
                continue;
            };
            if after.last_modified < started {
                debug!("{} not yet listed with its new stamp", record.archive_name);
                continue;
            }

            let path = self.save_root.join(&record.name);
            let current = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(time) => modified_millis(time),
                Err(e) => {
                    warn!("could not read modification time of {:?}: {}", path, e);
                    continue;
                }
            };

            let stamp = if current == before.last_modified {
                after.last_modified
            } else if current <= after.last_modified {
                warn!("{} changed while it was uploading", record.name);
                after.last_modified.saturating_add(1)
            } else {
                continue;
            };
            if stamp == current {
                continue;
            }

            debug!("stamping {} with {}", record.name, stamp);
            if let Err(e) = stamp_modified(&path, stamp) {
                warn!("could not set modification time of {:?}: {}", path, e);
            }
        }
    }

    /// Fails if the local save a download would replace changed after the
    /// inventory was taken.
    fn check_unchanged(&self, entry: &SaveEntry, local: &Inventory) -> SyncResult<()> {
        let Some(existing) = local.iter().find(|l| l.archive_name() == entry.name) else {
            return Ok(());
        };

        let path = self.save_root.join(&existing.name);
        let current = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(time) => modified_millis(time),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SyncError::filesystem(path, e)),
        };

        if current > existing.last_modified {
            return Err(SyncError::LocalChanged(existing.name.clone()));
        }
        Ok(())
    }
}

impl<T, A> fmt::Debug for SyncEngine<T, A>
where
    T: SyncTransport + fmt::Debug,
    A: Archiver + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("save_root", &self.save_root)
            .field("transport", &self.transport)
            .field("archiver", &self.archiver)
            .finish_non_exhaustive()
    }
}

fn advance(name: &str, state: &mut TransferState, next: TransferState) {
    trace!("{}: {:?} -> {:?}", name, state, next);
    *state = next;
}

/// Sets the modification time of `path` to `millis` since the Unix epoch.
fn stamp_modified(path: &Path, millis: u64) -> io::Result<()> {
    let time = UNIX_EPOCH + Duration::from_millis(millis);
    File::open(path)?.set_modified(time)
}
