//! Protocol Types
//!
//! Requests sent by the extension and the response shape it expects.

use autosave_core::{CleanupMode, PolicyError, Record, RecordKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// REQUEST
// ============================================================================

/// Recognized action tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SaveImage,
    SavePrompt,
    SavePage,
    GetStats,
    ExportData,
    ClearData,
    SetCleanupMode,
    GetCleanupInfo,
    Ping,
}

impl Action {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "save_image" => Action::SaveImage,
            "save_prompt" => Action::SavePrompt,
            "save_page" => Action::SavePage,
            "get_stats" => Action::GetStats,
            "export_data" => Action::ExportData,
            "clear_data" => Action::ClearData,
            "set_cleanup_mode" => Action::SetCleanupMode,
            "get_cleanup_info" => Action::GetCleanupInfo,
            "ping" => Action::Ping,
            _ => return None,
        })
    }
}

/// Why a message could not be turned into a [`Request`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    /// Malformed `set_cleanup_mode` fields
    #[error("Invalid cleanup settings: {0}")]
    CleanupSettings(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A validated request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Save {
        kind: RecordKind,
        record: Record,
        /// One-shot override of the process-wide mode
        cleanup_mode: Option<CleanupMode>,
    },
    GetStats,
    ExportData,
    ClearData,
    SetCleanupMode {
        mode: String,
        max_backup_files: Option<i64>,
    },
    GetCleanupInfo,
    Ping,
}

/// String field of a message; `null` counts as absent.
fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

impl Request {
    /// Validate a decoded message.
    ///
    /// Only `action` and the fields of that action are looked at; anything
    /// else in the message is ignored.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let Value::Object(mut object) = value else {
            return Err(RequestError::Invalid("message is not a JSON object".to_string()));
        };

        let tag = str_field(&object, "action")
            .map_err(RequestError::Invalid)?
            .unwrap_or("");
        let action = Action::parse(tag).ok_or_else(|| RequestError::UnknownAction(tag.to_string()))?;

        match action {
            Action::SaveImage => Self::save(RecordKind::Image, &mut object),
            Action::SavePrompt => Self::save(RecordKind::Prompt, &mut object),
            Action::SavePage => Self::save(RecordKind::Page, &mut object),
            Action::GetStats => Ok(Request::GetStats),
            Action::ExportData => Ok(Request::ExportData),
            Action::ClearData => Ok(Request::ClearData),
            Action::SetCleanupMode => Self::set_cleanup_mode(&object),
            Action::GetCleanupInfo => Ok(Request::GetCleanupInfo),
            Action::Ping => Ok(Request::Ping),
        }
    }

    fn save(kind: RecordKind, object: &mut Map<String, Value>) -> Result<Self, RequestError> {
        let cleanup_mode = str_field(object, "cleanup_mode")
            .map_err(RequestError::Invalid)?
            .map(str::parse::<CleanupMode>)
            .transpose()?;
        let record = match object.remove("data") {
            None | Some(Value::Null) => Record::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(RequestError::Invalid("'data' must be an object".to_string()));
            }
        };
        Ok(Request::Save {
            kind,
            record,
            cleanup_mode,
        })
    }

    fn set_cleanup_mode(object: &Map<String, Value>) -> Result<Self, RequestError> {
        let mode = str_field(object, "mode")
            .map_err(RequestError::CleanupSettings)?
            .ok_or_else(|| RequestError::CleanupSettings("'mode' is required".to_string()))?
            .to_string();
        let max_backup_files = match object.get("max_backup_files") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64().ok_or_else(|| {
                RequestError::CleanupSettings("'max_backup_files' must be an integer".to_string())
            })?),
        };
        Ok(Request::SetCleanupMode {
            mode,
            max_backup_files,
        })
    }
}

// ============================================================================
// RESPONSE
// ============================================================================

/// Response frame body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    /// Expected, non-exceptional refusal (e.g. duplicate record)
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Sent when a response cannot be serialized or framed
pub const FALLBACK_RESPONSE: &str = r#"{"success":false,"error":"Internal error"}"#;

// ============================================================================
// TESTS
// ============================================================================
