//! Backup retention
//!
//! Archived copies of a file live in the backup directory as
//! `{stem}_{YYYYMMDDHHMMSS}{suffix}`, with `_{n}` appended to the timestamp
//! when several archives land in the same second. Retention keeps the newest
//! `limit` archives per stem and deletes the rest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Length of the `%Y%m%d%H%M%S` timestamp embedded in backup names
const TIMESTAMP_LEN: usize = 14;

/// An archived file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Timestamp embedded in the name (empty for files not named by the engine)
    pub timestamp: String,
    /// Collision counter (0 for the first archive in a given second)
    pub seq: u32,
}

impl BackupFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of a retention pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    pub kept: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Parse `{timestamp}[_{seq}]` followed by end-of-name or an extension.
fn parse_stamp(rest: &str) -> Option<(String, u32)> {
    if rest.len() < TIMESTAMP_LEN || !rest.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let (stamp, tail) = rest.split_at(TIMESTAMP_LEN);
    if !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (seq, tail) = match tail.strip_prefix('_') {
        Some(after) => {
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let seq = after[..digits].parse().ok()?;
            (seq, &after[digits..])
        }
        None => (0, tail),
    };

    if tail.is_empty() || tail.starts_with('.') {
        Some((stamp.to_string(), seq))
    } else {
        None
    }
}

/// Match an archive name (`{stem}_{ts}[_{n}]{suffix}`) for `stem`.
pub fn parse_backup_name(name: &str, stem: &str) -> Option<(String, u32)> {
    name.strip_prefix(stem)?.strip_prefix('_').and_then(parse_stamp)
}

/// Match a rename-aside name (`{stem}.old_{ts}[_{n}]{suffix}`) for `stem`.
pub fn parse_aside_name(name: &str, stem: &str) -> Option<(String, u32)> {
    name.strip_prefix(stem)?
        .strip_prefix(".old_")
        .and_then(parse_stamp)
}

/// Order newest first: modification time, then embedded timestamp, then counter.
pub fn sort_newest_first(files: &mut [BackupFile]) {
    files.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| b.seq.cmp(&a.seq))
    });
}

/// List regular files in `dir` accepted by `matcher`, newest first.
///
/// A missing directory is treated as empty.
pub fn list_files<F>(dir: &Path, matcher: F) -> io::Result<Vec<BackupFile>>
where
    F: Fn(&str) -> Option<(String, u32)>,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some((timestamp, seq)) = matcher(name) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!(file = %entry.path().display(), "Skipping unreadable backup: {}", e);
                continue;
            }
        };
        files.push(BackupFile {
            path: entry.path(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            timestamp,
            seq,
        });
    }

    sort_newest_first(&mut files);
    Ok(files)
}

/// All archives of `stem` in `backup_dir`, newest first
pub fn list_backups(backup_dir: &Path, stem: &str) -> io::Result<Vec<BackupFile>> {
    list_files(backup_dir, |name| parse_backup_name(name, stem))
}

/// Every regular file in `dir`, whatever its name, newest first
pub fn list_all(dir: &Path) -> io::Result<Vec<BackupFile>> {
    list_files(dir, |_| Some((String::new(), 0)))
}

/// Number of regular files in the backup directory
pub fn count_backups(backup_dir: &Path) -> io::Result<usize> {
    Ok(list_all(backup_dir)?.len())
}

/// Delete everything past the `limit` newest entries of an already sorted list.
///
/// Individual delete failures are logged and recorded; they never stop the
/// remaining deletions.
pub fn prune_excess(files: Vec<BackupFile>, limit: usize) -> GcReport {
    let mut report = GcReport {
        kept: files.len().min(limit),
        ..GcReport::default()
    };

    for old in files.into_iter().skip(limit) {
        match fs::remove_file(&old.path) {
            Ok(()) => {
                info!(file = %old.file_name(), "Deleted old backup");
                report.deleted.push(old.path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %old.file_name(), "Backup already gone");
            }
            Err(e) => {
                warn!(file = %old.file_name(), "Failed to delete old backup: {}", e);
                report.failed.push(old.path);
            }
        }
    }

    report
}

/// Keep the `limit` newest archives of `stem`, delete the rest.
pub fn collect_excess(backup_dir: &Path, stem: &str, limit: usize) -> io::Result<GcReport> {
    let backups = list_backups(backup_dir, stem)?;
    debug!(stem, found = backups.len(), limit, "Running backup retention");
    Ok(prune_excess(backups, limit))
}
