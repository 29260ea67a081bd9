//! save_image / save_prompt / save_page

use autosave_core::{AppendOutcome, CleanupMode, Record, RecordKind, RecordStore, RotationSettings, StoreError};
use tracing::error;

use crate::protocol::types::Response;
use crate::server::DispatchError;

/// Append a record, rotating the collection file with the active policy or
/// the request's one-shot `cleanup_mode`.
pub fn execute_save(
    store: &mut RecordStore,
    settings: &RotationSettings,
    kind: RecordKind,
    record: Record,
    cleanup_mode: Option<CleanupMode>,
) -> Result<Response, DispatchError> {
    let policy = match cleanup_mode {
        Some(mode) => settings.policy_for(mode),
        None => settings.policy(),
    };

    match store.append(kind, record, policy) {
        Ok(AppendOutcome::Inserted) => Ok(Response::with_data(serde_json::json!({
            "kind": kind,
            "total": store.collection(kind).len(),
            "cleanup_mode": policy.mode(),
        }))
        .with_message(format!("{} saved", kind.label()))),
        Ok(AppendOutcome::DuplicateSkipped) => {
            Ok(Response::rejected(format!("{} already exists", kind.label())))
        }
        Err(e @ StoreError::Persistence { .. }) => {
            error!(kind = %kind, "Record kept in memory only: {}", e);
            Ok(Response::error(e.to_string())
                .with_message(format!("{} kept in memory but not written to disk", kind.label())))
        }
        Err(e) => Err(e.into()),
    }
}
