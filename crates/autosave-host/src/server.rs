//! Request dispatcher
//!
//! Owns the record store and the process-wide rotation settings, turns each
//! decoded message into a [`Request`] and routes it to the matching tool.

use serde_json::Value;
use tracing::{debug, warn};

use autosave_core::{PolicyError, RecordStore, RotationSettings, StoreError};

use crate::protocol::framing::FramingError;
use crate::protocol::types::{Request, RequestError, Response};
use crate::tools;

/// Everything that can turn a request into a `{"success": false}` response
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn into_response(self) -> Response {
        match self {
            DispatchError::Request(RequestError::UnknownAction(ref tag)) => {
                warn!(action = %tag, "Unknown action");
                Response::error(self.to_string()).with_message("Unknown action")
            }
            DispatchError::Request(RequestError::Policy(_)) => {
                Response::error(self.to_string()).with_message("Invalid cleanup mode")
            }
            // Only set_cleanup_mode surfaces bare policy errors
            DispatchError::Request(RequestError::CleanupSettings(_)) | DispatchError::Policy(_) => {
                Response::error(self.to_string()).with_message("Failed to set cleanup mode")
            }
            DispatchError::Framing(_) => {
                Response::error(self.to_string()).with_message("Malformed message")
            }
            _ => Response::error(self.to_string()),
        }
    }
}

/// The host's request handler
pub struct AutosaveServer {
    store: RecordStore,
    settings: RotationSettings,
    requests_handled: u64,
}

impl AutosaveServer {
    pub fn new(store: RecordStore, settings: RotationSettings) -> Self {
        Self {
            store,
            settings,
            requests_handled: 0,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn settings(&self) -> RotationSettings {
        self.settings
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests_handled
    }

    /// Handle a decoded JSON message
    pub fn handle_message(&mut self, message: Value) -> Response {
        match Request::from_value(message) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                self.requests_handled += 1;
                DispatchError::from(e).into_response()
            }
        }
    }

    /// Handle a validated request
    pub fn handle_request(&mut self, request: Request) -> Response {
        self.requests_handled += 1;
        debug!(?request, "Handling request");

        let result = match request {
            Request::Save {
                kind,
                record,
                cleanup_mode,
            } => tools::records::execute_save(
                &mut self.store,
                &self.settings,
                kind,
                record,
                cleanup_mode,
            ),
            Request::GetStats => tools::maintenance::execute_stats(&self.store),
            Request::ExportData => tools::maintenance::execute_export(&self.store),
            Request::ClearData => tools::maintenance::execute_clear(&mut self.store),
            Request::SetCleanupMode {
                mode,
                max_backup_files,
            } => tools::cleanup::execute_set_mode(&mut self.settings, &mode, max_backup_files),
            Request::GetCleanupInfo => tools::cleanup::execute_info(&self.store, &self.settings),
            Request::Ping => Ok(tools::execute_ping()),
        };

        result.unwrap_or_else(DispatchError::into_response)
    }
}
