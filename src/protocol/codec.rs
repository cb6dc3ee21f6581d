//! Newline-delimited JSON framing
//!
//! Each message occupies exactly one line. The decoder accumulates raw
//! socket reads and hands out complete lines; the encoder appends the
//! terminating newline.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

use super::message::ClientMessage;

/// Default maximum frame size (1MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

const NEWLINE: u8 = b'\n';

/// Splits a byte stream into JSON text frames
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_size: usize,
    /// Bytes already searched for a newline
    scanned: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a decoder with a custom frame limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_size,
            scanned: 0,
        }
    }

    /// Buffer that socket reads should be appended to
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Append raw bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete frame, if any
    ///
    /// Blank lines are skipped and a trailing `\r` is stripped. Returns
    /// `FrameTooLarge` when a line (complete or still pending) exceeds the
    /// limit.
    pub fn next_frame(&mut self) -> Result<Option<String>, ProtocolError> {
        loop {
            // Only look at bytes that arrived since the last call
            let start = self.scanned.min(self.buf.len());
            let Some(pos) = self.buf[start..]
                .iter()
                .position(|&b| b == NEWLINE)
                .map(|offset| start + offset)
            else {
                self.scanned = self.buf.len();
                if self.buf.len() > self.max_frame_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: self.buf.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            };

            if pos > self.max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: pos,
                    max: self.max_frame_size,
                });
            }

            let mut line = self.buf.split_to(pos);
            self.buf.advance(1);
            self.scanned = 0;

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let text = String::from_utf8(line.to_vec())
                .map_err(|_| ProtocolError::Malformed("frame is not valid UTF-8".into()))?;
            return Ok(Some(text));
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes outbound messages into newline-terminated frames
#[derive(Debug)]
pub struct FrameEncoder {
    buf: BytesMut,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// Encode one message and return the framed bytes
    pub fn encode(&mut self, message: &ClientMessage) -> Result<Bytes, ProtocolError> {
        let json = message.to_json()?;
        self.buf.reserve(json.len() + 1);
        self.buf.put_slice(json.as_bytes());
        self.buf.put_u8(NEWLINE);
        Ok(self.buf.split().freeze())
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}
