//! Local and remote save inventories.

use crate::archive::STAGING_PREFIX;
use crate::config::Endpoint;
use crate::error::{SyncError, SyncResult};
use minesync_protocol::{archive_name, Message, SaveManifest};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Which side of the sync a save was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Found in the local save-games root.
    Local,
    /// Listed in the remote manifest.
    Remote,
}

/// One save-game unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveEntry {
    /// Directory name (local) or archive name (remote).
    pub name: String,
    /// Last modification time, milliseconds since the Unix epoch.
    pub last_modified: u64,
    /// Side the entry was seen on.
    pub origin: Origin,
}

impl SaveEntry {
    /// Creates a local entry.
    pub fn local(name: impl Into<String>, last_modified: u64) -> Self {
        Self {
            name: name.into(),
            last_modified,
            origin: Origin::Local,
        }
    }

    /// Creates a remote entry.
    pub fn remote(name: impl Into<String>, last_modified: u64) -> Self {
        Self {
            name: name.into(),
            last_modified,
            origin: Origin::Remote,
        }
    }

    /// Returns the name this save has on the remote store.
    pub fn archive_name(&self) -> String {
        match self.origin {
            Origin::Local => archive_name(&self.name),
            Origin::Remote => self.name.clone(),
        }
    }
}

/// An ordered collection of saves with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    entries: Vec<SaveEntry>,
}

impl Inventory {
    /// Creates an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory from entries, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DuplicateSave`] if two entries share a name.
    pub fn from_entries(entries: Vec<SaveEntry>) -> SyncResult<Self> {
        {
            let mut seen = HashSet::with_capacity(entries.len());
            for entry in &entries {
                if !seen.insert(entry.name.as_str()) {
                    return Err(SyncError::DuplicateSave(entry.name.clone()));
                }
            }
        }
        Ok(Self { entries })
    }

    /// Builds the remote inventory from a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DuplicateSave`] if the manifest lists a name twice.
    pub fn from_manifest(manifest: SaveManifest) -> SyncResult<Self> {
        Self::from_entries(
            manifest
                .saves
                .into_iter()
                .map(|record| SaveEntry::remote(record.name, record.last_modified))
                .collect(),
        )
    }

    /// Returns the entries in order.
    pub fn entries(&self) -> &[SaveEntry] {
        &self.entries
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SaveEntry> {
        self.entries.iter()
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&SaveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the inventory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a SaveEntry;
    type IntoIter = std::slice::Iter<'a, SaveEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Converts a modification time to whole milliseconds since the Unix epoch.
///
/// Times before the epoch map to 0.
pub fn modified_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Scans `root` and returns one local entry per immediate subdirectory.
///
/// Plain files, symlinks, directories with non-UTF-8 names and leftover
/// staging directories are skipped. Entries are sorted by name.
///
/// # Errors
///
/// Returns [`SyncError::Filesystem`] if `root` cannot be opened or
/// enumerated, or an entry's metadata cannot be read.
pub fn build_local_inventory(root: &Path) -> SyncResult<Inventory> {
    let read_dir = fs::read_dir(root).map_err(|e| SyncError::filesystem(root, e))?;

    let mut entries = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|e| SyncError::filesystem(root, e))?;
        let path = dir_entry.path();

        let file_type = dir_entry
            .file_type()
            .map_err(|e| SyncError::filesystem(&path, e))?;
        if !file_type.is_dir() {
            continue;
        }

        let name = match dir_entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("skipping save with non UTF-8 name: {:?}", raw);
                continue;
            }
        };
        if name.starts_with(STAGING_PREFIX) {
            debug!("skipping staging directory {}", name);
            continue;
        }

        let modified = dir_entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| SyncError::filesystem(&path, e))?;

        entries.push(SaveEntry::local(name, modified_millis(modified)));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("found {} local saves in {:?}", entries.len(), root);
    Inventory::from_entries(entries)
}

/// Reads one manifest message from `reader` and returns the remote inventory.
///
/// The whole message must arrive; a stream that closes early is an error
/// and never yields an empty inventory.
///
/// # Errors
///
/// Returns [`SyncError::Protocol`] for malformed or truncated manifests and
/// [`SyncError::Connection`] or [`SyncError::Timeout`] for stream failures.
pub fn build_remote_inventory<R: Read + ?Sized>(
    reader: &mut R,
    address: &str,
) -> SyncResult<Inventory> {
    let manifest = SaveManifest::read_from(reader)
        .map_err(|e| SyncError::from_protocol(Endpoint::Manifest, address, e))?;
    debug!("manifest lists {} remote saves", manifest.len());
    Inventory::from_manifest(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minesync_protocol::{ProtocolError, SaveRecord};
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn local_inventory_lists_only_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("World 1")).unwrap();
        fs::create_dir(tmp.path().join("Alpha")).unwrap();
        fs::write(tmp.path().join("options.txt"), b"x").unwrap();

        let inventory = build_local_inventory(tmp.path()).unwrap();
        let names: Vec<_> = inventory.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["Alpha", "World 1"]);
        assert!(inventory.iter().all(|e| e.origin == Origin::Local));
        assert!(inventory.iter().all(|e| e.last_modified > 0));
    }

    #[test]
    fn local_inventory_skips_staging_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(format!("{STAGING_PREFIX}abc"))).unwrap();
        fs::create_dir(tmp.path().join("Real")).unwrap();

        let inventory = build_local_inventory(tmp.path()).unwrap();
        assert_eq!(inventory.len(), 1);
        assert!(inventory.get("Real").is_some());
    }

    #[test]
    fn missing_root_is_a_filesystem_error() {
        let tmp = TempDir::new().unwrap();
        let result = build_local_inventory(&tmp.path().join("nope"));
        assert!(matches!(result, Err(SyncError::Filesystem { .. })));
    }

    #[test]
    fn remote_inventory_from_manifest_stream() {
        let manifest = SaveManifest::new(vec![
            SaveRecord::new("minesync_World_1.zip", 50),
            SaveRecord::new("minesync_New.zip", 10),
        ]);
        let mut stream = Cursor::new(manifest.encode().unwrap());

        let inventory = build_remote_inventory(&mut stream, "test").unwrap();
        assert_eq!(
            inventory.entries(),
            &[
                SaveEntry::remote("minesync_World_1.zip", 50),
                SaveEntry::remote("minesync_New.zip", 10),
            ]
        );
    }

    #[test]
    fn truncated_manifest_is_not_an_empty_inventory() {
        let manifest = SaveManifest::new(vec![SaveRecord::new("minesync_A.zip", 1)]);
        let bytes = manifest.encode().unwrap();
        let mut stream = Cursor::new(bytes[..bytes.len() - 3].to_vec());

        let result = build_remote_inventory(&mut stream, "test");
        assert!(matches!(
            result,
            Err(SyncError::Protocol {
                endpoint: Endpoint::Manifest,
                source: ProtocolError::Truncated,
            })
        ));
    }

    #[test]
    fn closed_stream_is_not_an_empty_inventory() {
        let mut stream = Cursor::new(Vec::new());
        assert!(build_remote_inventory(&mut stream, "test").is_err());
    }

    #[test]
    fn duplicate_remote_names_are_rejected() {
        let manifest = SaveManifest::new(vec![
            SaveRecord::new("minesync_A.zip", 1),
            SaveRecord::new("minesync_A.zip", 2),
        ]);
        let result = Inventory::from_manifest(manifest);
        assert!(matches!(result, Err(SyncError::DuplicateSave(name)) if name == "minesync_A.zip"));
    }

    #[test]
    fn archive_name_depends_on_origin() {
        assert_eq!(
            SaveEntry::local("World 1", 0).archive_name(),
            "minesync_World_1.zip"
        );
        assert_eq!(
            SaveEntry::remote("minesync_World_1.zip", 0).archive_name(),
            "minesync_World_1.zip"
        );
    }

    #[test]
    fn millis_truncates_sub_millisecond_precision() {
        let t = UNIX_EPOCH + Duration::from_nanos(1_500_999_999);
        assert_eq!(modified_millis(t), 1_500);
        assert_eq!(modified_millis(UNIX_EPOCH - Duration::from_secs(1)), 0);
    }
}
