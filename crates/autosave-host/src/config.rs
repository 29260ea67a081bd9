//! Host configuration
//!
//! Each setting comes from a command-line flag, else its `AUTOSAVE_*`
//! environment variable, else a default under the platform data directory.

use anyhow::Context;
use autosave_core::{CleanupMode, DataLayout, RotationSettings, DEFAULT_MAX_BACKUP_FILES};
use clap::Args;
use std::path::PathBuf;

/// Storage and rotation settings shared by the host and the CLI
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// Directory holding the collection, stats and export files
    #[arg(long, env = "AUTOSAVE_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Directory receiving archived copies (default: `backup_data` next to the data directory)
    #[arg(long, env = "AUTOSAVE_BACKUP_DIR", value_name = "PATH")]
    pub backup_dir: Option<PathBuf>,

    /// What to do with the previous file before each write
    #[arg(
        long,
        env = "AUTOSAVE_CLEANUP_MODE",
        default_value = "backup",
        value_parser = parse_mode
    )]
    pub cleanup_mode: CleanupMode,

    /// Archived copies kept per collection in backup mode
    #[arg(
        long,
        env = "AUTOSAVE_MAX_BACKUP_FILES",
        default_value_t = DEFAULT_MAX_BACKUP_FILES as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub max_backup_files: u64,
}

fn parse_mode(s: &str) -> Result<CleanupMode, String> {
    s.parse::<CleanupMode>().map_err(|e| e.to_string())
}

/// Resolved host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub layout: DataLayout,
    pub rotation: RotationSettings,
}

impl StorageArgs {
    pub fn resolve(&self) -> anyhow::Result<HostConfig> {
        let layout = match (&self.data_dir, &self.backup_dir) {
            (Some(data), Some(backup)) => DataLayout::new(data, backup),
            (Some(data), None) => {
                let backup = data
                    .parent()
                    .map(|p| p.join("backup_data"))
                    .unwrap_or_else(|| PathBuf::from("backup_data"));
                DataLayout::new(data, backup)
            }
            (None, backup) => {
                let root = DataLayout::default_root()
                    .context("Could not determine the platform data directory; pass --data-dir")?;
                let mut layout = DataLayout::under(&root);
                if let Some(backup) = backup {
                    layout.backup_dir = backup.clone();
                }
                layout
            }
        };

        let max_backup_files = usize::try_from(self.max_backup_files)
            .context("max_backup_files does not fit in usize")?;
        let rotation = RotationSettings::new(self.cleanup_mode, max_backup_files)?;

        Ok(HostConfig { layout, rotation })
    }
}
