//! Archive storage.

use crate::error::{ServerError, ServerResult};
use minesync_protocol::{SaveManifest, SaveRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Storage backend for uploaded archives.
pub trait SaveStore: Send + Sync {
    /// Lists every stored archive.
    fn list(&self) -> ServerResult<SaveManifest>;

    /// Stores `data` under `name`, replacing any previous archive.
    fn put(&self, name: &str, data: &[u8], last_modified: u64) -> ServerResult<()>;

    /// Returns the archive stored under `name`, if any.
    fn get(&self, name: &str) -> ServerResult<Option<Vec<u8>>>;
}

/// Checks that `name` is usable as a storage key.
///
/// Names must be non-empty, must not start with a dot and must not contain
/// path separators, NUL or `..`.
pub fn validate_name(name: &str) -> ServerResult<()> {
    let bad = name.is_empty()
        || name.contains(['/', '\\', '\0'])
        || name.contains("..")
        || name.starts_with('.');
    if bad {
        return Err(ServerError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct StoredSave {
    data: Vec<u8>,
    last_modified: u64,
}

/// Keeps archives in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saves: RwLock<BTreeMap<String, StoredSave>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored archives.
    pub fn len(&self) -> usize {
        self.saves.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.saves.read().is_empty()
    }
}

impl SaveStore for MemoryStore {
    fn list(&self) -> ServerResult<SaveManifest> {
        let saves = self
            .saves
            .read()
            .iter()
            .map(|(name, save)| SaveRecord::new(name.clone(), save.last_modified))
            .collect();
        Ok(SaveManifest::new(saves))
    }

    fn put(&self, name: &str, data: &[u8], last_modified: u64) -> ServerResult<()> {
        validate_name(name)?;
        self.saves.write().insert(
            name.to_string(),
            StoredSave {
                data: data.to_vec(),
                last_modified,
            },
        );
        Ok(())
    }

    fn get(&self, name: &str) -> ServerResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self.saves.read().get(name).map(|save| save.data.clone()))
    }
}

/// Keeps archives as files in a directory.
///
/// The file name is the archive name and the file's modification time is
/// the archive's last-modified stamp.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    // Serializes writers so a listing never sees a half-replaced archive.
    lock: RwLock<()>,
}

impl DirectoryStore {
    /// Opens a store in `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> ServerResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ServerError::storage(&root, e))?;
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    /// Returns the storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SaveStore for DirectoryStore {
    fn list(&self) -> ServerResult<SaveManifest> {
        let _guard = self.lock.read();
        let mut saves = Vec::new();
        let entries =
            fs::read_dir(&self.root).map_err(|e| ServerError::storage(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ServerError::storage(&self.root, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // Skips temp files from interrupted writes too.
            if validate_name(&name).is_err() {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|e| ServerError::storage(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| ServerError::storage(entry.path(), e))?;
            saves.push(SaveRecord::new(name, millis(modified)));
        }
        saves.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(SaveManifest::new(saves))
    }

    fn put(&self, name: &str, data: &[u8], last_modified: u64) -> ServerResult<()> {
        validate_name(name)?;
        let _guard = self.lock.write();
        let target = self.root.join(name);

        let mut temp = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.root)
            .map_err(|e| ServerError::storage(&self.root, e))?;
        temp.write_all(data)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| ServerError::storage(temp.path(), e))?;
        temp.as_file()
            .set_modified(UNIX_EPOCH + Duration::from_millis(last_modified))
            .map_err(|e| ServerError::storage(temp.path(), e))?;
        temp.persist(&target)
            .map_err(|e| ServerError::storage(&target, e.error))?;

        debug!("stored {} ({} bytes)", name, data.len());
        Ok(())
    }

    fn get(&self, name: &str) -> ServerResult<Option<Vec<u8>>> {
        validate_name(name)?;
        let _guard = self.lock.read();
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServerError::storage(path, e)),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
