//! Rotation policies
//!
//! A rotation policy decides what happens to the previous version of a file
//! right before a new version is written. The host holds one process-wide
//! [`RotationSettings`]; individual save requests may override the mode for a
//! single write.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of archived copies kept per file stem
pub const DEFAULT_MAX_BACKUP_FILES: usize = 5;

/// Policy validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid cleanup mode: {0} (expected backup, delete, keep or rename)")]
    InvalidMode(String),
    #[error("Invalid max_backup_files: {0} (must be at least 1)")]
    InvalidRetention(i64),
}

/// Wire-level name of a rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    /// Archive into the backup directory, then prune old archives
    Backup,
    /// Remove the previous file
    Delete,
    /// Overwrite in place
    Keep,
    /// Rename next to the current file with an `.old_` timestamp
    Rename,
}

impl CleanupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupMode::Backup => "backup",
            CleanupMode::Delete => "delete",
            CleanupMode::Keep => "keep",
            CleanupMode::Rename => "rename",
        }
    }
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(CleanupMode::Backup),
            "delete" => Ok(CleanupMode::Delete),
            "keep" => Ok(CleanupMode::Keep),
            "rename" => Ok(CleanupMode::Rename),
            other => Err(PolicyError::InvalidMode(other.to_string())),
        }
    }
}

/// What to do with an existing file before it is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Overwrite,
    Delete,
    Archive { retention_limit: usize },
    RenameAside,
}

impl RotationPolicy {
    pub fn mode(&self) -> CleanupMode {
        match self {
            RotationPolicy::Overwrite => CleanupMode::Keep,
            RotationPolicy::Delete => CleanupMode::Delete,
            RotationPolicy::Archive { .. } => CleanupMode::Backup,
            RotationPolicy::RenameAside => CleanupMode::Rename,
        }
    }
}

/// Process-wide rotation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSettings {
    pub mode: CleanupMode,
    pub max_backup_files: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            mode: CleanupMode::Backup,
            max_backup_files: DEFAULT_MAX_BACKUP_FILES,
        }
    }
}

impl RotationSettings {
    pub fn new(mode: CleanupMode, max_backup_files: usize) -> Result<Self, PolicyError> {
        if max_backup_files == 0 {
            return Err(PolicyError::InvalidRetention(0));
        }
        Ok(Self {
            mode,
            max_backup_files,
        })
    }

    /// The active policy
    pub fn policy(&self) -> RotationPolicy {
        self.policy_for(self.mode)
    }

    /// Policy for a one-shot mode override, sharing the configured retention
    pub fn policy_for(&self, mode: CleanupMode) -> RotationPolicy {
        match mode {
            CleanupMode::Backup => RotationPolicy::Archive {
                retention_limit: self.max_backup_files,
            },
            CleanupMode::Delete => RotationPolicy::Delete,
            CleanupMode::Keep => RotationPolicy::Overwrite,
            CleanupMode::Rename => RotationPolicy::RenameAside,
        }
    }

    /// Apply a `set_cleanup_mode` request.
    ///
    /// Both values are validated before anything changes, so a rejected
    /// request leaves the previous settings in place. A missing
    /// `max_backup_files` keeps the current limit.
    pub fn update(&mut self, mode: &str, max_backup_files: Option<i64>) -> Result<(), PolicyError> {
        let mode = mode.parse::<CleanupMode>()?;
        let limit = match max_backup_files {
            Some(n) if n < 1 => return Err(PolicyError::InvalidRetention(n)),
            Some(n) => usize::try_from(n).map_err(|_| PolicyError::InvalidRetention(n))?,
            None => self.max_backup_files,
        };
        self.mode = mode;
        self.max_backup_files = limit;
        Ok(())
    }
}
