//! Record kinds and dedup keys
//!
//! A record is an arbitrary JSON object supplied by the extension. The only
//! field the host cares about is the kind's dedup key: `url` for images and
//! pages, `content` for prompts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One saved item. Field layout is owned by the caller.
pub type Record = Map<String, Value>;

/// The three collections the host keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Image,
    Prompt,
    Page,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Image, RecordKind::Prompt, RecordKind::Page];

    /// Field whose value identifies a record within its collection
    pub fn dedup_field(self) -> &'static str {
        match self {
            RecordKind::Image | RecordKind::Page => "url",
            RecordKind::Prompt => "content",
        }
    }

    /// Backing file name inside the data directory
    pub fn file_name(self) -> &'static str {
        match self {
            RecordKind::Image => "saved_images.json",
            RecordKind::Prompt => "saved_prompts.json",
            RecordKind::Page => "monitored_pages.json",
        }
    }

    /// File stem used as the backup naming anchor
    pub fn stem(self) -> &'static str {
        match self {
            RecordKind::Image => "saved_images",
            RecordKind::Prompt => "saved_prompts",
            RecordKind::Page => "monitored_pages",
        }
    }

    /// Capitalized name used in protocol messages ("Image saved")
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Image => "Image",
            RecordKind::Prompt => "Prompt",
            RecordKind::Page => "Page",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Image => "image",
            RecordKind::Prompt => "prompt",
            RecordKind::Page => "page",
        }
    }

    /// Extract the dedup key. Missing and `null` keys both yield `None`.
    pub fn dedup_key(self, record: &Record) -> Option<&Value> {
        record.get(self.dedup_field()).filter(|v| !v.is_null())
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(RecordKind::Image),
            "prompt" | "prompts" => Ok(RecordKind::Prompt),
            "page" | "pages" => Ok(RecordKind::Page),
            other => Err(format!("unknown record kind: {}", other)),
        }
    }
}

/// Result of appending to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record was new and has been appended (and persisted)
    Inserted,
    /// A record with the same dedup key already exists; nothing changed
    DuplicateSkipped,
}

impl AppendOutcome {
    pub fn is_inserted(self) -> bool {
        matches!(self, AppendOutcome::Inserted)
    }
}
