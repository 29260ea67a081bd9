//! On-disk layout and write primitives
//!
//! Every file the store writes goes through [`write_json_atomic`]: serialize
//! into a temporary file next to the target, fsync, then rename over the
//! target. Rotation plus write happens under a [`DirLock`] so a second host
//! instance never observes the gap between them.

use directories::ProjectDirs;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::record::RecordKind;

/// Stats file name inside the data directory
pub const STATS_FILE: &str = "stats.json";

/// Lock file name inside the data directory
pub const LOCK_FILE: &str = ".autosave.lock";

/// Where collections, stats, exports and backups live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// `{root}/saved_data` + `{root}/backup_data`
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("saved_data"), root.join("backup_data"))
    }

    /// Platform data directory, e.g. `~/.local/share/autosave` on Linux
    pub fn default_root() -> Option<PathBuf> {
        ProjectDirs::from("com", "autosave", "autosave").map(|dirs| dirs.data_dir().to_path_buf())
    }

    pub fn collection_path(&self, kind: RecordKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join(STATS_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }

    /// Create both directories if needed
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.backup_dir)?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            let _ = fs::set_permissions(&self.data_dir, perms);
        }
        Ok(())
    }
}

/// Exclusive advisory lock held for the lifetime of the guard
#[derive(Debug)]
pub struct DirLock {
    file: File,
}

impl DirLock {
    /// Block until the lock at `path` is ours
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn temp_in(target: &Path) -> io::Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".autosave-")
        .suffix(".tmp")
        .tempfile_in(dir)
}

fn serialize_pretty<T: Serialize + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serialize `value` as pretty JSON and atomically replace `target` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(target: &Path, value: &T) -> io::Result<()> {
    let bytes = serialize_pretty(value)?;
    let mut tmp = temp_in(target)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Like [`write_json_atomic`] but fails with `AlreadyExists` instead of
/// replacing an existing file.
pub fn write_json_new<T: Serialize + ?Sized>(target: &Path, value: &T) -> io::Result<()> {
    let bytes = serialize_pretty(value)?;
    let mut tmp = temp_in(target)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}

/// Copy `source` over `target` through a temporary file
pub fn copy_atomic(source: &Path, target: &Path) -> io::Result<()> {
    let mut tmp = temp_in(target)?;
    let mut input = File::open(source)?;
    io::copy(&mut input, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
