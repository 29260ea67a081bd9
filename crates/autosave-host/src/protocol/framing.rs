//! Native messaging framing
//!
//! Each message is a 4-byte little-endian length followed by that many bytes
//! of UTF-8 JSON. A clean end of input before the length prefix is the normal
//! shutdown signal.

use serde_json::Value;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

/// Largest message the browser may send to a host (64 MiB)
pub const DEFAULT_MAX_INCOMING: u32 = 64 * 1024 * 1024;

/// Largest message a host may send to the browser (1 MiB)
pub const DEFAULT_MAX_OUTGOING: u32 = 1024 * 1024;

/// Framing error type
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// Length prefix larger than the configured ceiling. The body has been
    /// drained, so the stream is still aligned on the next frame.
    #[error("Message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: u64, max: u32 },
    /// Stream ended inside a length prefix or body
    #[error("Truncated frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("Message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("Message is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The underlying stream failed; nothing more can be read or written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    /// Whether the stream can still be used after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FramingError::Io(_))
    }
}

/// Result of reading one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Value),
    EndOfStream,
}

/// Read into `buf` until full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Length-prefixed JSON codec with size ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_incoming: u32,
    max_outgoing: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_incoming: DEFAULT_MAX_INCOMING,
            max_outgoing: DEFAULT_MAX_OUTGOING,
        }
    }
}

impl FrameCodec {
    pub fn new(max_incoming: u32, max_outgoing: u32) -> Self {
        Self {
            max_incoming,
            max_outgoing,
        }
    }

    pub fn max_incoming(&self) -> u32 {
        self.max_incoming
    }

    /// Read one frame.
    pub fn read_message<R: Read>(&self, reader: &mut R) -> Result<Frame, FramingError> {
        let mut prefix = [0u8; 4];
        match read_full(reader, &mut prefix)? {
            0 => return Ok(Frame::EndOfStream),
            4 => {}
            got => return Err(FramingError::Truncated { expected: 4, got }),
        }

        let len = u32::from_le_bytes(prefix);
        if len > self.max_incoming {
            let drained = io::copy(&mut reader.by_ref().take(u64::from(len)), &mut io::sink())?;
            warn!(len, drained, max = self.max_incoming, "Dropped oversized message");
            return Err(FramingError::TooLarge {
                len: u64::from(len),
                max: self.max_incoming,
            });
        }

        let expected = len as usize;
        let mut body = vec![0u8; expected];
        let got = read_full(reader, &mut body)?;
        if got < expected {
            return Err(FramingError::Truncated { expected, got });
        }
        debug!("Received: {} bytes", expected);

        let text = std::str::from_utf8(&body)?;
        Ok(Frame::Message(serde_json::from_str(text)?))
    }

    /// Encode `message`, write prefix and body, then flush.
    pub fn write_message<W: Write>(&self, writer: &mut W, message: &Value) -> Result<(), FramingError> {
        let body = serde_json::to_vec(message)?;
        self.write_bytes(writer, &body)
    }

    /// Write an already-encoded JSON body.
    pub fn write_bytes<W: Write>(&self, writer: &mut W, body: &[u8]) -> Result<(), FramingError> {
        let len = u32::try_from(body.len())
            .ok()
            .filter(|len| *len <= self.max_outgoing)
            .ok_or(FramingError::TooLarge {
                len: body.len() as u64,
                max: self.max_outgoing,
            })?;

        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(body)?;
        writer.flush()?;
        debug!("Sending: {} bytes", body.len());
        Ok(())
    }
}
