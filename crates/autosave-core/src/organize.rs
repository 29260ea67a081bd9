//! Snapshot organizer
//!
//! The extension can also dump its whole state as `sora_auto_save_*.json`
//! into the downloads folder. The organizer picks the newest such dump,
//! validates it, copies it to a fixed location (rotating whatever was there)
//! and moves the processed dumps into a capped backup folder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use wildmatch::WildMatch;

use crate::policy::RotationPolicy;
use crate::retention::{self, BackupFile, GcReport};
use crate::rotation::{first_free, move_file, split_name, RotationOutcome, Rotator};
use crate::storage::copy_atomic;

/// Organizer error type
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No files matching '{pattern}' in {}", dir.display())]
    NoFiles { pattern: String, dir: PathBuf },
    #[error("{} is not a valid snapshot: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OrganizeError + '_ {
    move |source| OrganizeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn default_download_folder() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

fn cwd_join(name: &str) -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(name)
}

/// Organizer settings, stored as JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub download_folder: PathBuf,
    pub target_folder: PathBuf,
    pub file_pattern: String,
    pub output_filename: String,
    pub backup_old_files: bool,
    pub backup_folder: PathBuf,
    /// Seconds between runs in watch mode
    pub auto_run_interval: u64,
    pub max_backup_files: usize,
    pub required_keys: Vec<String>,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            download_folder: default_download_folder(),
            target_folder: cwd_join("organized_files"),
            file_pattern: "sora_auto_save_*.json".to_string(),
            output_filename: "sora_latest_data.json".to_string(),
            backup_old_files: true,
            backup_folder: cwd_join("backup"),
            auto_run_interval: 300,
            max_backup_files: 10,
            required_keys: vec![
                "metadata".to_string(),
                "images".to_string(),
                "prompts".to_string(),
            ],
        }
    }
}

impl OrganizerConfig {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, OrganizeError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(config = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(io_err(path)(e)),
        };
        let config = serde_json::from_str(&text).map_err(|source| OrganizeError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!(config = %path.display(), "Loaded organizer config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), OrganizeError> {
        crate::storage::write_json_atomic(path, self).map_err(io_err(path))?;
        info!(config = %path.display(), "Saved organizer config");
        Ok(())
    }

    pub fn target_path(&self) -> PathBuf {
        self.target_folder.join(&self.output_filename)
    }
}

/// A dump in the downloads folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Counts reported by validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub images: usize,
    pub prompts: usize,
}

/// What one organizer run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeReport {
    pub source: PathBuf,
    pub target: PathBuf,
    pub summary: SnapshotSummary,
    pub rotation: RotationOutcome,
    pub archived_sources: Vec<PathBuf>,
    pub gc: GcReport,
}

/// Runs organizer passes for one config
#[derive(Debug, Clone)]
pub struct Organizer {
    config: OrganizerConfig,
}

impl Organizer {
    pub fn new(config: OrganizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Regular files in the download folder matching the pattern, newest first.
    pub fn find_files(&self) -> Result<Vec<FoundFile>, OrganizeError> {
        let dir = &self.config.download_folder;
        let pattern = WildMatch::new(&self.config.file_pattern);
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(dir)(e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(dir))?;
            let name = entry.file_name();
            if !pattern.matches(&name.to_string_lossy()) {
                continue;
            }
            let metadata = entry.metadata().map_err(io_err(&entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            files.push(FoundFile {
                path: entry.path(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
        info!(pattern = %self.config.file_pattern, found = files.len(), "Scanned download folder");
        Ok(files)
    }

    /// Check that `path` is a JSON object with every required key.
    pub fn validate(&self, path: &Path) -> Result<SnapshotSummary, OrganizeError> {
        let invalid = |reason: String| OrganizeError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(io_err(path))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        let Some(object) = value.as_object() else {
            return Err(invalid("top level is not an object".to_string()));
        };

        let missing: Vec<&str> = self
            .config
            .required_keys
            .iter()
            .filter(|k| !object.contains_key(k.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("missing keys: {}", missing.join(", "))));
        }

        let count = |key: &str| object.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        let summary = SnapshotSummary {
            images: count("images"),
            prompts: count("prompts"),
        };
        info!(
            file = %path.display(),
            images = summary.images,
            prompts = summary.prompts,
            "Snapshot validated"
        );
        Ok(summary)
    }

    /// One full pass: find, pick newest, validate, copy, archive sources, prune.
    pub fn organize(&self) -> Result<OrganizeReport, OrganizeError> {
        let files = self.find_files()?;
        let Some(latest) = files.first() else {
            return Err(OrganizeError::NoFiles {
                pattern: self.config.file_pattern.clone(),
                dir: self.config.download_folder.clone(),
            });
        };
        let source = latest.path.clone();
        let summary = self.validate(&source)?;

        let target = self.config.target_path();
        fs::create_dir_all(&self.config.target_folder).map_err(io_err(&self.config.target_folder))?;
        let policy = if self.config.backup_old_files {
            RotationPolicy::Archive {
                retention_limit: self.config.max_backup_files,
            }
        } else {
            RotationPolicy::Overwrite
        };
        let rotation = Rotator::new(&self.config.backup_folder)
            .prepare(&target, policy)
            .map_err(io_err(&target))?;
        copy_atomic(&source, &target).map_err(io_err(&target))?;
        info!(from = %source.display(), to = %target.display(), "Copied latest snapshot");

        let mut archived_sources = Vec::new();
        let mut gc = GcReport::default();
        if self.config.backup_old_files {
            archived_sources = self.archive_sources(&files);
            gc = self.prune_backups()?;
        }

        Ok(OrganizeReport {
            source,
            target,
            summary,
            rotation,
            archived_sources,
            gc,
        })
    }

    /// Move processed dumps into the backup folder, suffixing `_{n}` on collisions.
    fn archive_sources(&self, files: &[FoundFile]) -> Vec<PathBuf> {
        let backup_dir = &self.config.backup_folder;
        if let Err(e) = fs::create_dir_all(backup_dir) {
            warn!(dir = %backup_dir.display(), "Cannot create backup folder: {}", e);
            return Vec::new();
        }

        let mut moved = Vec::new();
        for file in files {
            let (stem, suffix) = split_name(&file.path);
            let dest = first_free(backup_dir, |seq| {
                if seq == 0 {
                    format!("{}{}", stem, suffix)
                } else {
                    format!("{}_{}{}", stem, seq, suffix)
                }
            });
            match move_file(&file.path, &dest) {
                Ok(()) => {
                    info!(from = %file.path.display(), to = %dest.display(), "Moved to backup");
                    moved.push(dest);
                }
                Err(e) => warn!(file = %file.path.display(), "Backup failed: {}", e),
            }
        }
        moved
    }

    /// Keep the newest `max_backup_files` JSON files in the backup folder.
    pub fn prune_backups(&self) -> Result<GcReport, OrganizeError> {
        let dir = &self.config.backup_folder;
        let files: Vec<BackupFile> = retention::list_files(dir, |name| {
            name.ends_with(".json").then(|| (String::new(), 0))
        })
        .map_err(io_err(dir))?;
        Ok(retention::prune_excess(files, self.config.max_backup_files))
    }
}
