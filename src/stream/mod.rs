pub mod transcoder;

pub use transcoder::{error_frame, transcode_byte_stream, StreamTranscoder};

use bytes::{Bytes, BytesMut};
use memchr::memchr;

/// The stream-end marker frame of the OpenAI streaming protocol.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Incremental line reassembler.
///
/// Feed it byte chunks in whatever sizes the transport delivers them and pop
/// complete `\n`-terminated lines back out. Only the undelivered tail is
/// buffered; the tail is never surfaced as a line because it may be the
/// prefix of a line still in flight.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete line, without its line feed.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let newline = memchr(b'\n', &self.buf)?;
        let mut line = self.buf.split_to(newline + 1);
        line.truncate(newline);
        Some(line.freeze())
    }

    /// Bytes held back as a potential partial line.
    #[must_use]
    pub fn tail(&self) -> &[u8] {
        &self.buf
    }

    /// Drop any buffered tail (used when the source stream ends).
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
