//! # Autosave Core
//!
//! Storage engine behind the autosave browser host:
//!
//! - **Record store**: image, prompt and page collections, deduplicated by
//!   `url` / `content`, kept in insertion order and mirrored to JSON files
//! - **Rotation**: what happens to the previous file before each write
//!   (archive, delete, keep, rename aside)
//! - **Retention**: caps the number of archived copies per file stem
//! - **Organizer**: promotes the newest snapshot dump from a downloads folder
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autosave_core::{DataLayout, RecordKind, RecordStore, RotationSettings};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = RecordStore::open(DataLayout::under(std::path::Path::new("/tmp/autosave")))?;
//! let settings = RotationSettings::default();
//!
//! let record = json!({"content": "a watercolor fox"}).as_object().cloned().unwrap_or_default();
//! let outcome = store.append(RecordKind::Prompt, record, settings.policy())?;
//! assert!(outcome.is_inserted());
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod organize;
pub mod policy;
pub mod record;
pub mod retention;
pub mod rotation;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use organize::{OrganizeError, OrganizeReport, Organizer, OrganizerConfig, SnapshotSummary};
pub use policy::{CleanupMode, PolicyError, RotationPolicy, RotationSettings, DEFAULT_MAX_BACKUP_FILES};
pub use record::{AppendOutcome, Record, RecordKind};
pub use retention::{collect_excess, BackupFile, GcReport};
pub use rotation::{RotationOutcome, Rotator};
pub use storage::{ClearReport, DataLayout, RecordStore, RestoreReport, Stats, StoreError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
