//! set_cleanup_mode and get_cleanup_info

use autosave_core::{RecordStore, RotationSettings};
use tracing::info;

use crate::protocol::types::Response;
use crate::server::DispatchError;

/// Change the process-wide rotation settings. Rejected values leave the
/// previous settings untouched.
pub fn execute_set_mode(
    settings: &mut RotationSettings,
    mode: &str,
    max_backup_files: Option<i64>,
) -> Result<Response, DispatchError> {
    settings.update(mode, max_backup_files)?;
    info!(
        mode = %settings.mode,
        max_backup_files = settings.max_backup_files,
        "Cleanup mode updated"
    );
    Ok(Response::with_data(serde_json::json!({
        "cleanup_mode": settings.mode,
        "max_backup_files": settings.max_backup_files,
    }))
    .with_message(format!("Cleanup mode set to {}", settings.mode)))
}

pub fn execute_info(store: &RecordStore, settings: &RotationSettings) -> Result<Response, DispatchError> {
    let backup_count = store.backup_count()?;
    Ok(Response::with_data(serde_json::json!({
        "cleanup_mode": settings.mode,
        "max_backup_files": settings.max_backup_files,
        "backup_directory": store.layout().backup_dir.display().to_string(),
        "current_backup_count": backup_count,
    })))
}
