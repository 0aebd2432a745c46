//! Byte-stream to line framing.
//!
//! Bytes accumulate in a fixed 256-byte buffer until `\n`. A `\r` directly
//! before the `\n` is stripped; a lone `\r` is kept as ordinary whitespace.
//! Non-ASCII bytes never enter the buffer, so every line is valid UTF-8.
//!
//! A line that does not fit is dropped up to its terminator and reported once
//! as [`Frame::Overflow`].
//!
//! ```rust
//! use vfd_sim::protocol::{Frame, LineBuffer};
//!
//! let mut buf = LineBuffer::new();
//! let frames = buf.push_bytes(b"RUN\r\nFRE");
//! assert_eq!(frames, vec![Frame::Line("RUN".into())]);
//! assert_eq!(buf.push_bytes(b"Q 10\n"), vec![Frame::Line("FREQ 10".into())]);
//! ```

use heapless::Vec as HVec;

/// Longest accepted line, terminator excluded.
pub const MAX_LINE: usize = 256;

/// One framing result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete non-blank line without its terminator.
    Line(String),
    /// A line exceeded [`MAX_LINE`] and was discarded.
    Overflow,
}

/// Incremental line splitter.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: HVec<u8, MAX_LINE>,
    pending_cr: bool,
    overflowed: bool,
}

impl LineBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held for the current partial line.
    pub fn pending(&self) -> usize {
        self.buf.len() + usize::from(self.pending_cr)
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pending_cr = false;
        self.overflowed = false;
    }

    /// Feed bytes, returning every frame they complete.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(frame) = self.push(byte) {
                frames.push(frame);
            }
        }
        frames
    }

    fn push(&mut self, byte: u8) -> Option<Frame> {
        if byte == b'\n' {
            self.pending_cr = false;
            return self.finish_line();
        }
        if !byte.is_ascii() {
            return None;
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.store(b'\r');
        }
        if byte == b'\r' {
            self.pending_cr = true;
        } else {
            self.store(byte);
        }
        None
    }

    fn store(&mut self, byte: u8) {
        if self.overflowed {
            return;
        }
        if self.buf.push(byte).is_err() {
            self.overflowed = true;
            self.buf.clear();
        }
    }

    fn finish_line(&mut self) -> Option<Frame> {
        if std::mem::take(&mut self.overflowed) {
            self.buf.clear();
            return Some(Frame::Overflow);
        }
        // Only ASCII is ever stored
        let line: String = self.buf.iter().map(|&b| char::from(b)).collect();
        self.buf.clear();
        if line.trim().is_empty() {
            None
        } else {
            Some(Frame::Line(line))
        }
    }
}
