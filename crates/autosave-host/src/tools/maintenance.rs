//! get_stats, export_data and clear_data

use autosave_core::RecordStore;
use tracing::error;

use crate::protocol::types::Response;
use crate::server::DispatchError;

pub fn execute_stats(store: &RecordStore) -> Result<Response, DispatchError> {
    let stats = serde_json::to_value(store.stats())?;
    Ok(Response::with_data(stats))
}

pub fn execute_export(store: &RecordStore) -> Result<Response, DispatchError> {
    let path = store.export_snapshot()?;
    Ok(Response::with_data(serde_json::json!({
        "export_path": path.display().to_string(),
    }))
    .with_message("Data exported"))
}

/// Irrecoverable: removes collections, stats and every backup.
pub fn execute_clear(store: &mut RecordStore) -> Result<Response, DispatchError> {
    match store.clear_all() {
        Ok(report) => Ok(Response::with_data(serde_json::json!({
            "files_removed": report.removed.len(),
        }))
        .with_message("Data cleared")),
        Err(e) => {
            error!("Clear failed: {}", e);
            Ok(Response::error(e.to_string()).with_message("Failed to clear data"))
        }
    }
}
