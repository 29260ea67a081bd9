//! Storage Module
//!
//! JSON-file storage layer with:
//! - Deduplicated, insertion-ordered collections
//! - Atomic write-then-rename persistence under a cross-process lock
//! - Rotation of the previous file on every write

mod layout;
mod store;

pub use layout::{
    copy_atomic, remove_if_exists, write_json_atomic, write_json_new, DataLayout, DirLock,
    LOCK_FILE, STATS_FILE,
};
pub use store::{ClearReport, Collection, RecordStore, RestoreReport, Result, Stats, StoreError};
