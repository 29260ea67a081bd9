//! Test Host Manager
//!
//! Provides isolated host instances for testing:
//! - A fresh data and backup directory per test, removed on drop
//! - Whole-session runs over framed byte streams
//! - Restarts against the same directories

use std::io::Cursor;
use std::path::{Path, PathBuf};

use autosave_core::retention::{self, BackupFile};
use autosave_core::{DataLayout, RecordKind, RecordStore, RotationSettings};
use autosave_host::protocol::framing::{Frame, FrameCodec};
use autosave_host::{AutosaveServer, StdioTransport};
use serde_json::Value;
use tempfile::TempDir;

/// A host bound to a temporary directory
///
/// # Example
///
/// ```rust,ignore
/// let mut host = TestHost::new_temp();
/// let reply = host.send(TestRequestFactory::ping());
/// assert_eq!(reply["message"], "pong");
/// ```
pub struct TestHost {
    pub server: AutosaveServer,
    codec: FrameCodec,
    layout: DataLayout,
    temp_dir: TempDir,
}

impl TestHost {
    /// Host with default settings (backup mode, five backups)
    pub fn new_temp() -> Self {
        Self::with_settings(RotationSettings::default())
    }

    pub fn with_settings(settings: RotationSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let layout = DataLayout::under(temp_dir.path());
        let store = RecordStore::open(layout.clone()).expect("Failed to open test store");
        Self {
            server: AutosaveServer::new(store, settings),
            codec: FrameCodec::default(),
            layout,
            temp_dir,
        }
    }

    /// Use a different frame size ceiling for later sessions
    pub fn with_codec(mut self, codec: FrameCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Encode requests as one input stream
    pub fn encode(&self, requests: &[Value]) -> Vec<u8> {
        let mut wire = Vec::new();
        for request in requests {
            FrameCodec::default()
                .write_message(&mut wire, request)
                .expect("Failed to encode request");
        }
        wire
    }

    /// Run a whole session over raw input bytes and decode every response
    pub fn run_raw(&mut self, input: Vec<u8>) -> Vec<Value> {
        let mut output = Vec::new();
        StdioTransport::new(self.codec)
            .serve(&mut self.server, Cursor::new(input), &mut output)
            .expect("Session failed");
        decode_all(output)
    }

    /// Run a session of well-formed requests
    pub fn session(&mut self, requests: &[Value]) -> Vec<Value> {
        let input = self.encode(requests);
        self.run_raw(input)
    }

    /// Single request, single response
    pub fn send(&mut self, request: Value) -> Value {
        let mut replies = self.session(&[request]);
        assert_eq!(replies.len(), 1, "expected exactly one response");
        replies.remove(0)
    }

    /// Drop the in-memory state and reload from disk, keeping settings
    pub fn restart(&mut self) {
        let settings = self.server.settings();
        let store = RecordStore::open(self.layout.clone()).expect("Failed to reopen store");
        self.server = AutosaveServer::new(store, settings);
    }

    /// Records currently on disk for `kind` (empty when the file is missing)
    pub fn on_disk(&self, kind: RecordKind) -> Vec<Value> {
        match std::fs::read_to_string(self.layout.collection_path(kind)) {
            Ok(text) => serde_json::from_str(&text).expect("Collection file is not JSON"),
            Err(_) => Vec::new(),
        }
    }

    pub fn backups(&self, kind: RecordKind) -> Vec<BackupFile> {
        retention::list_backups(&self.layout.backup_dir, kind.stem()).expect("Failed to list backups")
    }

    /// Every visible file name in the data directory, sorted
    pub fn data_files(&self) -> Vec<String> {
        list_names(&self.layout.data_dir)
    }

    /// Every file name in the backup directory, sorted
    pub fn backup_files(&self) -> Vec<String> {
        list_names(&self.layout.backup_dir)
    }

    pub fn collection_path(&self, kind: RecordKind) -> PathBuf {
        self.layout.collection_path(kind)
    }
}

/// Decode every frame in a host's output
pub fn decode_all(output: Vec<u8>) -> Vec<Value> {
    let codec = FrameCodec::default();
    let mut cursor = Cursor::new(output);
    let mut replies = Vec::new();
    while let Frame::Message(reply) = codec.read_message(&mut cursor).expect("Bad response frame") {
        replies.push(reply);
    }
    replies
}

fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
