//! stdio Transport
//!
//! Reads one frame, answers it, then reads the next. Returns `Ok(())` when
//! the browser closes our stdin.

use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

use super::framing::{Frame, FrameCodec, FramingError};
use super::types::{Response, FALLBACK_RESPONSE};
use crate::server::{AutosaveServer, DispatchError};

/// stdio transport for the host
pub struct StdioTransport {
    codec: FrameCodec,
}

impl StdioTransport {
    pub fn new(codec: FrameCodec) -> Self {
        Self { codec }
    }

    /// Serve on the process's stdin/stdout
    pub fn run(self, server: &mut AutosaveServer) -> Result<(), FramingError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.serve(server, stdin.lock(), stdout.lock())
    }

    /// Serve on arbitrary streams until the reader is exhausted.
    ///
    /// Only an I/O failure of the streams themselves ends the loop early;
    /// every other problem becomes an error response.
    pub fn serve<R: Read, W: Write>(
        &self,
        server: &mut AutosaveServer,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), FramingError> {
        loop {
            let response = match self.codec.read_message(&mut reader) {
                Ok(Frame::EndOfStream) => {
                    info!(handled = server.requests_handled(), "Input closed");
                    return Ok(());
                }
                Ok(Frame::Message(message)) => {
                    panic::catch_unwind(AssertUnwindSafe(|| server.handle_message(message)))
                        .unwrap_or_else(|payload| {
                            let reason = payload
                                .downcast_ref::<&str>()
                                .map(|s| s.to_string())
                                .or_else(|| payload.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_string());
                            error!("Request handler panicked: {}", reason);
                            Response::error(format!("Internal error: {}", reason))
                        })
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Failed to read message: {}", e);
                    DispatchError::from(e).into_response()
                }
                Err(e) => {
                    error!("Failed to read from input: {}", e);
                    return Err(e);
                }
            };

            self.send(&mut writer, &response)?;
        }
    }

    fn send<W: Write>(&self, writer: &mut W, response: &Response) -> Result<(), FramingError> {
        let encoded = serde_json::to_vec(response).map_err(FramingError::from);
        let result = encoded.and_then(|body| self.codec.write_bytes(writer, &body));
        match result {
            Ok(()) => Ok(()),
            Err(FramingError::Io(e)) => {
                error!("Failed to write response: {}", e);
                Err(FramingError::Io(e))
            }
            Err(e) => {
                error!("Failed to encode response: {}", e);
                // Send a minimal error response so the extension doesn't hang
                self.codec.write_bytes(writer, FALLBACK_RESPONSE.as_bytes())
            }
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new(FrameCodec::default())
    }
}
