//! Byte-stream transport abstraction.
//!
//! A transport is whatever carries protocol bytes: a serial port, a pipe,
//! stdin/stdout, one TCP connection, or a test double.
//!
//! # Contract
//!
//! | Method | Behavior |
//! |--------|----------|
//! | `read_available` | Returns the bytes available now, possibly none. Waits at most a short, bounded time. |
//! | `write` | Writes the whole buffer. |
//! | `close` | Idempotent. After it, reads and writes return [`TransportError::Closed`]. |
//!
//! A peer hang-up is reported as [`TransportError::Closed`] from
//! `read_available`.
//!
//! # Example
//!
//! ```rust
//! use vfd_sim::error::TransportError;
//! use vfd_sim::traits::Transport;
//!
//! fn echo<T: Transport>(t: &mut T) -> Result<(), TransportError> {
//!     let bytes = t.read_available()?;
//!     if !bytes.is_empty() {
//!         t.write(&bytes)?;
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::TransportError;

/// Bidirectional byte stream used by the line reader.
pub trait Transport: Send {
    /// Bytes received since the last call, or an empty vector if none arrived
    /// within the transport's poll interval.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Release the stream. Safe to call more than once.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_available()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
