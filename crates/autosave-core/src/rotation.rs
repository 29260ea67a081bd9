//! Rotation engine
//!
//! Runs right before a file is rewritten and disposes of its previous
//! version according to a [`RotationPolicy`]. Nothing here touches the new
//! contents; the caller writes them after `prepare` returns.

use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::policy::RotationPolicy;
use crate::retention::{self, GcReport};

/// `strftime` format of the timestamp embedded in rotated file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// What happened to the previous file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// No previous file existed
    Untouched,
    /// Previous file left in place to be overwritten
    Kept,
    /// Previous file removed
    Deleted,
    /// Previous file moved into the backup directory
    Archived { backup: PathBuf, gc: GcReport },
    /// Previous file renamed next to itself
    RenamedAside(PathBuf),
}

/// Split a path into its stem and suffix (`"a.json"` -> `("a", ".json")`).
pub fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, suffix)
}

/// `{stem}_{ts}{suffix}`, or `{stem}_{ts}_{seq}{suffix}` for `seq > 0`
pub fn archive_name(stem: &str, suffix: &str, timestamp: &str, seq: u32) -> String {
    if seq == 0 {
        format!("{}_{}{}", stem, timestamp, suffix)
    } else {
        format!("{}_{}_{}{}", stem, timestamp, seq, suffix)
    }
}

/// `{stem}.old_{ts}{suffix}`, or `{stem}.old_{ts}_{seq}{suffix}` for `seq > 0`
pub fn aside_name(stem: &str, suffix: &str, timestamp: &str, seq: u32) -> String {
    if seq == 0 {
        format!("{}.old_{}{}", stem, timestamp, suffix)
    } else {
        format!("{}.old_{}_{}{}", stem, timestamp, seq, suffix)
    }
}

/// First path in `dir` produced by `name_for(seq)` that does not exist yet.
pub(crate) fn first_free<F>(dir: &Path, name_for: F) -> PathBuf
where
    F: Fn(u32) -> String,
{
    let mut seq = 0;
    loop {
        let candidate = dir.join(name_for(seq));
        if !candidate.exists() {
            return candidate;
        }
        seq += 1;
    }
}

/// Rename, falling back to copy + remove when the rename itself fails
/// (e.g. backup directory on another filesystem).
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(from = %from.display(), to = %to.display(), "rename failed, copying: {}", rename_err);
            if fs::copy(from, to).is_err() {
                return Err(rename_err);
            }
            fs::remove_file(from)
        }
    }
}

fn exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Applies rotation policies, archiving into a fixed backup directory
#[derive(Debug, Clone)]
pub struct Rotator {
    backup_dir: PathBuf,
}

impl Rotator {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Dispose of `target` according to `policy`, using the current local time.
    pub fn prepare(&self, target: &Path, policy: RotationPolicy) -> io::Result<RotationOutcome> {
        self.prepare_at(target, policy, Local::now().naive_local())
    }

    /// Same as [`Rotator::prepare`] with an explicit clock.
    pub fn prepare_at(
        &self,
        target: &Path,
        policy: RotationPolicy,
        now: NaiveDateTime,
    ) -> io::Result<RotationOutcome> {
        if !exists(target)? {
            return Ok(RotationOutcome::Untouched);
        }

        let name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let (stem, suffix) = split_name(target);

        match policy {
            RotationPolicy::Overwrite => {
                debug!(file = %name, "Overwriting existing file");
                Ok(RotationOutcome::Kept)
            }
            RotationPolicy::Delete => {
                fs::remove_file(target)?;
                info!(file = %name, "Deleted existing file");
                Ok(RotationOutcome::Deleted)
            }
            RotationPolicy::Archive { retention_limit } => {
                fs::create_dir_all(&self.backup_dir)?;
                let backup = first_free(&self.backup_dir, |seq| {
                    archive_name(&stem, &suffix, &timestamp, seq)
                });
                move_file(target, &backup)?;
                info!(file = %name, backup = %backup.display(), "Archived existing file");

                let gc = match retention::collect_excess(&self.backup_dir, &stem, retention_limit) {
                    Ok(report) => report,
                    Err(e) => {
                        // The archive itself succeeded; a failed listing only delays pruning.
                        warn!(stem = %stem, "Backup retention skipped: {}", e);
                        GcReport::default()
                    }
                };
                Ok(RotationOutcome::Archived { backup, gc })
            }
            RotationPolicy::RenameAside => {
                let dir = target.parent().unwrap_or_else(|| Path::new("."));
                let aside = first_free(dir, |seq| aside_name(&stem, &suffix, &timestamp, seq));
                fs::rename(target, &aside)?;
                info!(file = %name, renamed = %aside.display(), "Renamed existing file");
                Ok(RotationOutcome::RenamedAside(aside))
            }
        }
    }
}
