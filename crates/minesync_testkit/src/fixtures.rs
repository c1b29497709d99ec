//! Test fixtures: save-games roots and an in-process server.
//!
//! These helpers panic on failure; they are meant for tests only.

use minesync_server::{MemoryStore, SaveStore, ServerConfig, ServerHandle, SyncServer};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A temporary save-games root with automatic cleanup.
pub struct SaveRoot {
    dir: TempDir,
}

impl SaveRoot {
    /// Creates an empty save-games root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the root path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path of the save called `name`.
    pub fn save_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Creates a save directory holding `files` (relative `/`-separated
    /// paths and contents) and returns its path.
    pub fn add_save(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let save = self.save_path(name);
        fs::create_dir_all(&save).expect("Failed to create save directory");
        for (relative, contents) in files {
            let path = relative
                .split('/')
                .fold(save.clone(), |path, part| path.join(part));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent directory");
            }
            fs::write(&path, contents).expect("Failed to write save file");
        }
        save
    }

    /// Creates a save and pins its modification time to `millis`.
    pub fn add_save_at(&self, name: &str, files: &[(&str, &[u8])], millis: u64) -> PathBuf {
        let save = self.add_save(name, files);
        set_mtime(&save, millis);
        save
    }

    /// Names of the directories directly below the root, sorted.
    pub fn save_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .expect("Failed to read save root")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl Default for SaveRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets the modification time of `path` to `millis` since the Unix epoch.
pub fn set_mtime(path: &Path, millis: u64) {
    File::open(path)
        .and_then(|f| f.set_modified(UNIX_EPOCH + Duration::from_millis(millis)))
        .expect("Failed to set modification time");
}

/// Reads every file below `dir` into a map of `/`-separated relative path
/// to contents.
pub fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.expect("Failed to walk tree");
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .expect("Walked outside the tree")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(entry.path()).expect("Failed to read file");
        files.insert(relative, contents);
    }
    files
}

/// A reference server on ephemeral loopback ports, stopped on drop.
pub struct TestServer {
    store: Arc<MemoryStore>,
    handle: ServerHandle,
}

impl TestServer {
    /// Starts a server with an empty in-memory store.
    pub fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn SaveStore> = store.clone();
        let server = SyncServer::with_store(ServerConfig::ephemeral(), shared);
        let handle = server.start().expect("Failed to start test server");
        Self { store, handle }
    }

    /// Returns the manifest, upload and download addresses.
    pub fn addresses(&self) -> (String, String, String) {
        (
            self.handle.manifest_addr().to_string(),
            self.handle.upload_addr().to_string(),
            self.handle.download_addr().to_string(),
        )
    }

    /// Returns the store behind the server.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Stores an archive directly, bypassing the upload endpoint.
    pub fn seed(&self, name: &str, data: &[u8], last_modified: u64) {
        self.store
            .put(name, data, last_modified)
            .expect("Failed to seed store");
    }

    /// Waits until the store holds `count` archives.
    ///
    /// Uploads are handled on the server's own thread, so a client may
    /// return before the archive is stored.
    pub fn wait_for_saves(&self, count: usize) {
        for _ in 0..500 {
            if self.store.len() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("store never reached {count} saves");
    }
}
