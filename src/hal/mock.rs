//! Mock transport for testing without a serial port or socket.
//!
//! [`MockTransport`] is a cloneable handle: hand one clone to a
//! [`LineReader`](crate::services::LineReader) and keep another in the test to
//! queue input and inspect what was written back.
//!
//! # Example
//!
//! ```rust
//! use vfd_sim::hal::MockTransport;
//! use vfd_sim::traits::Transport;
//!
//! let mut transport = MockTransport::new();
//! let probe = transport.clone();
//!
//! probe.queue_input("STATUS\r\n");
//! assert_eq!(transport.read_available().unwrap(), b"STATUS\r\n");
//!
//! transport.write(b"OK\r\n").unwrap();
//! assert_eq!(probe.output_text(), "OK\r\n");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::TransportError;
use crate::traits::Transport;

/// Delay applied by `read_available` when nothing is queued, so reader loops
/// do not spin.
const EMPTY_READ_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct MockState {
    incoming: VecDeque<Vec<u8>>,
    output: Vec<u8>,
    closed: bool,
    peer_closed: bool,
    fail_writes: bool,
    close_calls: u32,
}

/// In-memory transport with queued input chunks and captured output.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Open transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue one chunk, returned whole by the next `read_available`.
    pub fn queue_input(&self, bytes: impl AsRef<[u8]>) {
        self.lock().incoming.push_back(bytes.as_ref().to_vec());
    }

    /// Chunks not read yet.
    pub fn pending_input(&self) -> usize {
        self.lock().incoming.len()
    }

    /// Simulate the peer hanging up once queued input is drained.
    pub fn hang_up(&self) {
        self.lock().peer_closed = true;
    }

    /// Make every subsequent `write` fail with an IO error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.lock().output.clone()
    }

    /// Everything written so far, as text.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().output).into_owned()
    }

    /// Drain captured output, as text.
    pub fn take_output(&self) -> String {
        let bytes = std::mem::take(&mut self.lock().output);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }
}

impl Transport for MockTransport {
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let next = {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            match state.incoming.pop_front() {
                Some(chunk) => return Ok(chunk),
                None if state.peer_closed => return Err(TransportError::Closed),
                None => Vec::new(),
            }
        };
        std::thread::sleep(EMPTY_READ_DELAY);
        Ok(next)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.output.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.closed = true;
        state.close_calls += 1;
    }
}
