//! Packing save directories into archives and back.
//!
//! An archive holds one top-level directory named after the save, so
//! unpacking into the save-games root recreates the save under its
//! original name:
//!
//! ```text
//! World 1/
//! World 1/level.dat
//! World 1/region/r.0.0.mca
//! ```

use crate::error::{ArchiveError, ArchiveResult};
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name prefix of temporary archives and staging directories.
///
/// Directories with this prefix in the save-games root are never treated
/// as saves.
pub const STAGING_PREFIX: &str = ".minesync-";

/// Packs directories into opaque byte blobs and unpacks them again.
pub trait Archiver {
    /// Packs the directory tree rooted at `source`.
    fn pack(&self, source: &Path) -> ArchiveResult<Vec<u8>>;

    /// Returns the name of the save directory held by `bytes` without
    /// extracting anything.
    ///
    /// Fails unless the archive holds exactly one top-level directory.
    fn save_name(&self, bytes: &[u8]) -> ArchiveResult<String>;

    /// Unpacks `bytes` into `destination`, replacing an existing save of
    /// the same name. Returns the path of the placed save.
    ///
    /// Nothing is placed unless the archive holds exactly one top-level
    /// directory and extracted cleanly.
    fn unpack(&self, bytes: &[u8], destination: &Path) -> ArchiveResult<PathBuf>;
}

/// Deflate-compressed zip archives.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiver {
    temp_dir: Option<PathBuf>,
}

impl ZipArchiver {
    /// Creates an archiver that stages archives in the system temp dir.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an archiver that stages archives in `dir`.
    pub fn with_temp_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(dir.into()),
        }
    }

    fn temp_file(&self) -> ArchiveResult<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(".zip");
        match &self.temp_dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .map_err(|e| ArchiveError::io(dir, e)),
            None => builder
                .tempfile()
                .map_err(|e| ArchiveError::io(std::env::temp_dir(), e)),
        }
    }

    fn write_tree(&self, source: &Path, top: &str, file: &mut File) -> ArchiveResult<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(file);

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|_| ArchiveError::UnsafeEntry(entry.path().display().to_string()))?;
            let name = entry_name(top, relative)
                .ok_or_else(|| ArchiveError::InvalidName(entry.path().to_path_buf()))?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                writer.add_directory(format!("{name}/"), options)?;
            } else if file_type.is_file() {
                writer.start_file(name, options)?;
                let mut input =
                    File::open(entry.path()).map_err(|e| ArchiveError::io(entry.path(), e))?;
                io::copy(&mut input, &mut writer)
                    .map_err(|e| ArchiveError::io(entry.path(), e))?;
            } else {
                warn!("skipping special file {:?}", entry.path());
            }
        }

        writer.finish()?;
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn pack(&self, source: &Path) -> ArchiveResult<Vec<u8>> {
        if !source.is_dir() {
            return Err(ArchiveError::NotADirectory(source.to_path_buf()));
        }
        let top = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::InvalidName(source.to_path_buf()))?;

        // The temp file is removed when it goes out of scope, on every path.
        let mut temp = self.temp_file()?;
        self.write_tree(source, top, temp.as_file_mut())?;

        let bytes = fs::read(temp.path()).map_err(|e| ArchiveError::io(temp.path(), e))?;
        debug!("packed {:?} into {} bytes", source, bytes.len());
        Ok(bytes)
    }

    fn save_name(&self, bytes: &[u8]) -> ArchiveResult<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        top_level_dir(&mut archive)
    }

    fn unpack(&self, bytes: &[u8], destination: &Path) -> ArchiveResult<PathBuf> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let top = top_level_dir(&mut archive)?;

        fs::create_dir_all(destination).map_err(|e| ArchiveError::io(destination, e))?;

        // Staging lives next to the destination so the final move is a rename.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(destination)
            .map_err(|e| ArchiveError::io(destination, e))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
            let target = staging.path().join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
            }
            let mut output =
                File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
            io::copy(&mut entry, &mut output).map_err(|e| ArchiveError::io(&target, e))?;
        }

        let target = destination.join(&top);
        replace_with(&staging.path().join(&top), &target)?;

        debug!("unpacked {:?} into {:?}", top, destination);
        Ok(target)
    }
}

/// Returns the single top-level directory every entry of `archive` lives
/// under.
fn top_level_dir<R>(archive: &mut ZipArchive<R>) -> ArchiveResult<String>
where
    R: io::Read + io::Seek,
{
    if archive.is_empty() {
        return Err(ArchiveError::Empty);
    }

    let mut top: Option<String> = None;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        let first = parts
            .first()
            .and_then(|p| p.to_str())
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;

        let name = top.get_or_insert_with(|| first.to_string());
        if *name != first {
            return Err(ArchiveError::Layout(format!(
                "entries under both {name:?} and {first:?}"
            )));
        }

        if parts.len() == 1 && !entry.is_dir() {
            return Err(ArchiveError::Layout(format!("{first:?} is a file")));
        }
    }

    top.ok_or(ArchiveError::Empty)
}

/// Builds the `/`-separated archive path of `relative` below `top`.
fn entry_name(top: &str, relative: &Path) -> Option<String> {
    let mut name = top.to_string();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                name.push('/');
                name.push_str(part.to_str()?);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(name)
}

/// Moves `staged` to `target`, replacing whatever is at `target`.
///
/// An existing target is first moved aside and restored if the final
/// rename fails.
fn replace_with(staged: &Path, target: &Path) -> ArchiveResult<()> {
    if fs::symlink_metadata(target).is_err() {
        return fs::rename(staged, target).map_err(|e| ArchiveError::io(target, e));
    }

    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let backup = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| ArchiveError::io(parent, e))?;
    let aside = backup.path().join("previous");

    fs::rename(target, &aside).map_err(|e| ArchiveError::io(target, e))?;
    if let Err(e) = fs::rename(staged, target) {
        if let Err(restore) = fs::rename(&aside, target) {
            warn!("failed to restore {:?} after aborted replace: {}", target, restore);
        }
        return Err(ArchiveError::io(target, e));
    }
    Ok(())
}
