//! JSON record store
//!
//! Three ordered, deduplicated collections held in memory and mirrored to one
//! JSON array file each. Appends persist the whole collection after handing
//! the previous file to the rotation engine.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::layout::{self, DataLayout, DirLock};
use crate::policy::RotationPolicy;
use crate::record::{AppendOutcome, Record, RecordKind};
use crate::retention;
use crate::rotation::{RotationOutcome, Rotator};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Disk I/O failed while writing, renaming or deleting
    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A collection file exists but is not a JSON array of objects
    #[error("Corrupt collection file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    /// The incoming record lacks its dedup key
    #[error("Record is missing its dedup field '{field}'")]
    MissingKey { field: &'static str },
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

impl StoreError {
    fn persistence(path: &Path, source: io::Error) -> Self {
        StoreError::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// COLLECTION
// ============================================================================

/// Ordered records of one kind plus the file that mirrors them
#[derive(Debug, Clone)]
pub struct Collection {
    kind: RecordKind,
    path: PathBuf,
    records: Vec<Record>,
    /// Set while the file lags behind `records` after a failed write
    dirty: bool,
}

impl Collection {
    fn empty(kind: RecordKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            records: Vec::new(),
            dirty: false,
        }
    }

    /// Read the backing file; a missing file is an empty collection.
    fn load(kind: RecordKind, path: PathBuf) -> Result<Self> {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty(kind, path)),
            Err(e) => return Err(StoreError::persistence(&path, e)),
        };
        let records: Vec<Record> =
            serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            kind,
            path,
            records,
            dirty: false,
        })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the last write of this collection failed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.records
            .iter()
            .any(|r| self.kind.dedup_key(r) == Some(key))
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Collection sizes as reported by `get_stats`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_images: usize,
    pub total_prompts: usize,
    pub total_pages: usize,
    pub last_updated: DateTime<Local>,
    pub data_directory: String,
}

#[derive(Debug, Serialize)]
struct ExportInfo {
    timestamp: DateTime<Local>,
    total_images: usize,
    total_prompts: usize,
    total_pages: usize,
}

#[derive(Debug, Serialize)]
struct ExportSnapshot<'a> {
    export_info: ExportInfo,
    images: &'a [Record],
    prompts: &'a [Record],
    pages: &'a [Record],
}

/// Files removed by `clear_all`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: Vec<PathBuf>,
}

/// Result of replacing a collection from a backup file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub kind: RecordKind,
    pub restored: usize,
    pub duplicates_dropped: usize,
    pub invalid_dropped: usize,
    pub rotation: RotationOutcome,
}

// ============================================================================
// STORE
// ============================================================================

/// Owner of the image, prompt and page collections
#[derive(Debug)]
pub struct RecordStore {
    layout: DataLayout,
    rotator: Rotator,
    images: Collection,
    prompts: Collection,
    pages: Collection,
}

impl RecordStore {
    /// Create directories and load every collection.
    pub fn open(layout: DataLayout) -> Result<Self> {
        layout.ensure().map_err(|e| {
            StoreError::Init(format!(
                "Could not create {} / {}: {}",
                layout.data_dir.display(),
                layout.backup_dir.display(),
                e
            ))
        })?;

        let mut store = Self {
            rotator: Rotator::new(layout.backup_dir.clone()),
            images: Collection::empty(RecordKind::Image, layout.collection_path(RecordKind::Image)),
            prompts: Collection::empty(RecordKind::Prompt, layout.collection_path(RecordKind::Prompt)),
            pages: Collection::empty(RecordKind::Page, layout.collection_path(RecordKind::Page)),
            layout,
        };
        store.load_all()?;
        Ok(store)
    }

    /// Reload every collection from disk.
    ///
    /// A corrupt file is logged and its collection starts empty; the file is
    /// left in place so the next write rotates it like any previous version.
    pub fn load_all(&mut self) -> Result<()> {
        for kind in RecordKind::ALL {
            let path = self.layout.collection_path(kind);
            let collection = match Collection::load(kind, path.clone()) {
                Ok(c) => c,
                Err(StoreError::Corrupt { path, reason }) => {
                    warn!(file = %path.display(), "Ignoring corrupt collection file: {}", reason);
                    Collection::empty(kind, path)
                }
                Err(e) => return Err(e),
            };
            info!(kind = %kind, records = collection.len(), "Loaded collection");
            *self.collection_mut(kind) = collection;
        }
        Ok(())
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn collection(&self, kind: RecordKind) -> &Collection {
        match kind {
            RecordKind::Image => &self.images,
            RecordKind::Prompt => &self.prompts,
            RecordKind::Page => &self.pages,
        }
    }

    fn collection_mut(&mut self, kind: RecordKind) -> &mut Collection {
        match kind {
            RecordKind::Image => &mut self.images,
            RecordKind::Prompt => &mut self.prompts,
            RecordKind::Page => &mut self.pages,
        }
    }

    /// Append `record` unless its dedup key is already present.
    ///
    /// On a persistence failure the record stays in memory, the collection is
    /// marked dirty and the error is returned. Any later append to a dirty
    /// collection, duplicate or not, retries the write.
    pub fn append(
        &mut self,
        kind: RecordKind,
        record: Record,
        policy: RotationPolicy,
    ) -> Result<AppendOutcome> {
        let key = kind
            .dedup_key(&record)
            .cloned()
            .ok_or(StoreError::MissingKey {
                field: kind.dedup_field(),
            })?;

        let collection = self.collection_mut(kind);
        if collection.contains_key(&key) {
            debug!(kind = %kind, key = %preview(&key), "Skipping duplicate record");
            if collection.dirty {
                info!(kind = %kind, "Retrying write of unsaved collection");
                self.persist(kind, policy)?;
            }
            return Ok(AppendOutcome::DuplicateSkipped);
        }
        collection.records.push(record);
        info!(kind = %kind, key = %preview(&key), total = collection.len(), "Record saved");

        self.persist(kind, policy)?;
        Ok(AppendOutcome::Inserted)
    }

    /// Rotate the previous file of `kind` and write the current collection.
    pub fn persist(&mut self, kind: RecordKind, policy: RotationPolicy) -> Result<RotationOutcome> {
        let result = self.write_collection(kind, policy);
        self.collection_mut(kind).dirty = result.is_err();
        result
    }

    fn write_collection(&self, kind: RecordKind, policy: RotationPolicy) -> Result<RotationOutcome> {
        let lock_path = self.layout.lock_path();
        let _lock = DirLock::acquire(&lock_path).map_err(|e| StoreError::persistence(&lock_path, e))?;

        let collection = self.collection(kind);
        let path = collection.path().to_path_buf();
        let outcome = self
            .rotator
            .prepare(&path, policy)
            .map_err(|e| StoreError::persistence(&path, e))?;
        layout::write_json_atomic(&path, collection.records())
            .map_err(|e| StoreError::persistence(&path, e))?;
        debug!(file = %path.display(), ?outcome, "Collection persisted");

        self.write_stats();
        Ok(outcome)
    }

    /// Best-effort refresh of `stats.json`
    fn write_stats(&self) {
        let path = self.layout.stats_path();
        if let Err(e) = layout::write_json_atomic(&path, &self.stats()) {
            warn!(file = %path.display(), "Failed to update stats file: {}", e);
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total_images: self.images.len(),
            total_prompts: self.prompts.len(),
            total_pages: self.pages.len(),
            last_updated: Local::now(),
            data_directory: self.layout.data_dir.display().to_string(),
        }
    }

    /// Number of files currently in the backup directory
    pub fn backup_count(&self) -> Result<usize> {
        retention::count_backups(&self.layout.backup_dir)
            .map_err(|e| StoreError::persistence(&self.layout.backup_dir, e))
    }

    /// Write every collection into a new `export_{timestamp}.json` file.
    pub fn export_snapshot(&self) -> Result<PathBuf> {
        let now = Local::now();
        let snapshot = ExportSnapshot {
            export_info: ExportInfo {
                timestamp: now,
                total_images: self.images.len(),
                total_prompts: self.prompts.len(),
                total_pages: self.pages.len(),
            },
            images: self.images.records(),
            prompts: self.prompts.records(),
            pages: self.pages.records(),
        };

        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let mut seq = 0u32;
        loop {
            let name = if seq == 0 {
                format!("export_{}.json", stamp)
            } else {
                format!("export_{}_{}.json", stamp, seq)
            };
            let path = self.layout.data_dir.join(name);
            match layout::write_json_new(&path, &snapshot) {
                Ok(()) => {
                    info!(file = %path.display(), "Exported all collections");
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(StoreError::persistence(&path, e)),
            }
        }
    }

    /// Empty every collection and delete collection files, the stats file,
    /// every file in the backup directory and rename-aside copies. Rotation
    /// is bypassed.
    ///
    /// Memory is always cleared. Every deletion is attempted; the first
    /// failure is returned after the rest have run.
    pub fn clear_all(&mut self) -> Result<ClearReport> {
        let lock_path = self.layout.lock_path();
        let _lock = DirLock::acquire(&lock_path).map_err(|e| StoreError::persistence(&lock_path, e))?;

        for kind in RecordKind::ALL {
            let collection = self.collection_mut(kind);
            collection.records.clear();
            collection.dirty = false;
        }

        let mut targets: Vec<PathBuf> = RecordKind::ALL
            .iter()
            .map(|k| self.layout.collection_path(*k))
            .collect();
        targets.push(self.layout.stats_path());

        let mut first_error: Option<StoreError> = None;
        match retention::list_all(&self.layout.backup_dir) {
            Ok(files) => targets.extend(files.into_iter().map(|b| b.path)),
            Err(e) => {
                error!(dir = %self.layout.backup_dir.display(), "Could not list backups to clear: {}", e);
                first_error.get_or_insert(StoreError::persistence(&self.layout.backup_dir, e));
            }
        }
        for kind in RecordKind::ALL {
            let stem = kind.stem();
            let asides =
                retention::list_files(&self.layout.data_dir, |name| retention::parse_aside_name(name, stem));
            match asides {
                Ok(files) => targets.extend(files.into_iter().map(|b| b.path)),
                Err(e) => {
                    error!(stem, "Could not list renamed files to clear: {}", e);
                    first_error.get_or_insert(StoreError::persistence(&self.layout.data_dir, e));
                }
            }
        }

        let mut report = ClearReport::default();
        for path in targets {
            match layout::remove_if_exists(&path) {
                Ok(true) => report.removed.push(path),
                Ok(false) => {}
                Err(e) => {
                    error!(file = %path.display(), "Failed to delete: {}", e);
                    first_error.get_or_insert(StoreError::persistence(&path, e));
                }
            }
        }

        info!(removed = report.removed.len(), "Cleared all data");
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Replace the collection of `kind` with the records in `source` and
    /// persist it under `policy`.
    ///
    /// Records without a dedup key are dropped, as are later duplicates.
    pub fn restore_from(
        &mut self,
        kind: RecordKind,
        source: &Path,
        policy: RotationPolicy,
    ) -> Result<RestoreReport> {
        let text = fs::read_to_string(source).map_err(|e| StoreError::persistence(source, e))?;
        let incoming: Vec<Record> = serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(incoming.len());
        let mut duplicates_dropped = 0;
        let mut invalid_dropped = 0;
        for record in incoming {
            let Some(key) = kind.dedup_key(&record) else {
                invalid_dropped += 1;
                continue;
            };
            // Value is not Hash; its canonical JSON text is.
            if seen.insert(key.to_string()) {
                records.push(record);
            } else {
                duplicates_dropped += 1;
            }
        }

        let restored = records.len();
        self.collection_mut(kind).records = records;
        let rotation = self.persist(kind, policy)?;
        info!(kind = %kind, restored, source = %source.display(), "Restored collection");

        Ok(RestoreReport {
            kind,
            restored,
            duplicates_dropped,
            invalid_dropped,
            rotation,
        })
    }
}

/// Short, single-line rendering of a dedup key for logs
fn preview(key: &Value) -> String {
    let text = match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let text = text.replace('\n', " ");
    if text.chars().count() <= 50 {
        text
    } else {
        let truncated: String = text.chars().take(50).collect();
        format!("{}...", truncated)
    }
}
