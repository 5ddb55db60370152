//! Incremental decoder for the engine's text frame stream
//!
//! Frames are blocks of `field: value` lines separated by a blank line. The
//! decoder buffers partial input across chunks, so a frame split over any
//! number of network reads decodes the same as one read in full.

use bytes::BytesMut;
use tracing::{trace, warn};

use super::protocol::{FrameError, StreamFrame};

/// Largest partial frame kept while waiting for its blank line
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Start of the first line not yet checked for a frame end
    scanned: usize,
    /// Dropping the rest of an oversized frame until its blank line
    discarding: bool,
    max_buffered: usize,
    skipped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_BUFFERED_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_buffered: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            discarding: false,
            max_buffered,
            skipped: 0,
        }
    }

    /// Feed a chunk and return every frame it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match find_block_end(&self.buf, self.scanned) {
                Ok((block_len, consumed)) => {
                    let block = self.buf.split_to(consumed);
                    self.scanned = 0;
                    if self.discarding {
                        self.discarding = false;
                    } else {
                        self.decode_into(&block[..block_len], &mut frames);
                    }
                }
                Err(resume_at) => {
                    self.scanned = resume_at;
                    break;
                }
            }
        }

        if self.buf.len() > self.max_buffered {
            if !self.discarding {
                self.skipped += 1;
                warn!(
                    buffered = self.buf.len(),
                    limit = self.max_buffered,
                    skipped = self.skipped,
                    "Dropping oversized stream frame"
                );
            }
            self.discarding = true;
            // Only the shape of the unfinished line matters: it may still turn
            // out to be the blank line that ends the frame
            let tail: &[u8] = match &self.buf[self.scanned..] {
                b"" => b"",
                b"\r" => b"\r",
                _ => b"-",
            };
            self.buf.clear();
            self.buf.extend_from_slice(tail);
            self.scanned = 0;
        }
        frames
    }

    /// End of input: decode whatever is left as a final frame
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let block = self.buf.split();
        self.scanned = 0;
        let mut frames = Vec::new();
        if !std::mem::take(&mut self.discarding) {
            self.decode_into(&block, &mut frames);
        }
        frames
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.discarding = false;
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Frames dropped because they could not be decoded
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn decode_into(&mut self, block: &[u8], frames: &mut Vec<StreamFrame>) {
        match parse_block(block) {
            Some(Ok(frame)) => {
                trace!(event = frame.event_name(), "Frame decoded");
                frames.push(frame);
            }
            Some(Err(e)) => {
                self.skipped += 1;
                warn!(error = %e, skipped = self.skipped, "Skipping stream frame");
            }
            None => {}
        }
    }
}

/// Find the first blank line at or after the line starting at `from`.
/// Returns the length of the block before it and the number of bytes to
/// consume including the blank line, or the start of the unfinished last line.
fn find_block_end(buf: &[u8], from: usize) -> Result<(usize, usize), usize> {
    let mut start = from;
    while let Some(offset) = buf[start..].iter().position(|&b| b == b'\n') {
        let end = start + offset;
        let line = &buf[start..end];
        if line.is_empty() || line == b"\r" {
            return Ok((start, end + 1));
        }
        start = end + 1;
    }
    Err(start)
}

/// Decode one block. `None` for blocks with no fields (blank or comment only).
fn parse_block(block: &[u8]) -> Option<Result<StreamFrame, FrameError>> {
    let Ok(text) = std::str::from_utf8(block) else {
        return Some(Err(FrameError::InvalidUtf8));
    };

    let mut event: Option<&str> = None;
    let mut data: Vec<&str> = Vec::new();
    let mut any_field = false;

    for line in text.lines().map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        any_field = true;
        match field {
            "event" => event = Some(value),
            "data" => data.push(value),
            "id" | "retry" => {}
            other => trace!(field = other, "Ignoring stream field"),
        }
    }

    if !any_field {
        return None;
    }
    if data.is_empty() {
        return Some(Err(FrameError::MissingData));
    }

    let name = event.unwrap_or("message");
    Some(StreamFrame::from_parts(name, &data.join("\n")))
}
