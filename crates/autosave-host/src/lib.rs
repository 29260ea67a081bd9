//! Autosave native messaging host
//!
//! Library half of the `autosave-host` and `autosave` binaries: the framed
//! stdio transport, request dispatch and the per-action handlers.

pub mod config;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::{HostConfig, StorageArgs};
pub use protocol::framing::{FrameCodec, FramingError};
pub use protocol::stdio::StdioTransport;
pub use server::AutosaveServer;
