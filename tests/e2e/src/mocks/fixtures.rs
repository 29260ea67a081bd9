//! Test Request Factory
//!
//! Builds the JSON messages the extension sends, one constructor per action.

use serde_json::{json, Value};

/// Factory for extension requests
pub struct TestRequestFactory;

impl TestRequestFactory {
    pub fn save_image(url: &str) -> Value {
        json!({
            "action": "save_image",
            "data": {"url": url, "prompt": "a lighthouse at dusk", "timestamp": "2024-05-01T10:00:00Z"}
        })
    }

    pub fn save_prompt(content: &str) -> Value {
        json!({
            "action": "save_prompt",
            "data": {"content": content, "timestamp": "2024-05-01T10:00:00Z"}
        })
    }

    pub fn save_page(url: &str) -> Value {
        json!({
            "action": "save_page",
            "data": {"url": url, "title": "Library"}
        })
    }

    /// Attach a one-shot `cleanup_mode` to a save request
    pub fn with_mode(mut request: Value, mode: &str) -> Value {
        request["cleanup_mode"] = json!(mode);
        request
    }

    pub fn set_cleanup_mode(mode: &str, max_backup_files: Option<i64>) -> Value {
        match max_backup_files {
            Some(max) => json!({"action": "set_cleanup_mode", "mode": mode, "max_backup_files": max}),
            None => json!({"action": "set_cleanup_mode", "mode": mode}),
        }
    }

    pub fn action(name: &str) -> Value {
        json!({"action": name})
    }

    pub fn ping() -> Value {
        Self::action("ping")
    }

    pub fn stats() -> Value {
        Self::action("get_stats")
    }

    pub fn cleanup_info() -> Value {
        Self::action("get_cleanup_info")
    }

    /// A frame whose body is the given bytes, unchecked
    pub fn raw_frame(body: &[u8]) -> Vec<u8> {
        let mut frame = (body.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(body);
        frame
    }
}
