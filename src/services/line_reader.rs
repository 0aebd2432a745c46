//! Reader loop that pumps a [`Transport`] through the line protocol.
//!
//! The loop reads whatever bytes are available, frames and dispatches them
//! with a [`ProtocolSession`], and writes every reply back. It ends when:
//!
//! - the stop flag is raised ([`LineReader::stop`]),
//! - the transport reports [`TransportError::Closed`], or
//! - a read or write fails.
//!
//! The transport is closed on every exit path. Transport errors are logged,
//! never propagated to the drive.
//!
//! ```rust
//! use std::sync::Arc;
//! use vfd_sim::hal::MockTransport;
//! use vfd_sim::services::{LineReader, ReaderExit, SharedDrive};
//! use vfd_sim::{DriveConfig, DriveEngine};
//!
//! let drive = Arc::new(SharedDrive::new(DriveEngine::new(DriveConfig::default()).unwrap()));
//! let transport = MockTransport::new();
//! transport.queue_input("FREQ 10\r\nRUN\r\n");
//! transport.hang_up();
//!
//! let reader = LineReader::spawn(transport.clone(), Arc::clone(&drive)).unwrap();
//! let summary = reader.join();
//! assert_eq!(summary.exit, ReaderExit::Closed);
//! assert_eq!(transport.output_text(), "OK: Frequenza impostata a 10.0 Hz\r\nOK\r\n");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::ProtocolSession;
use crate::services::shared::DriveControl;
use crate::traits::Transport;

/// Pause after an empty read before polling again.
const IDLE_PARK: Duration = Duration::from_millis(5);

/// Why a reader loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Stop flag raised.
    Stopped,
    /// Peer closed the stream.
    Closed,
    /// Reading failed.
    ReadFailed,
    /// Writing a reply failed.
    WriteFailed,
    /// The reader thread panicked.
    Panicked,
}

/// Outcome of one reader loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Why the loop ended.
    pub exit: ReaderExit,
    /// Lines answered.
    pub lines: u64,
}

/// Handle to a reader thread.
#[derive(Debug)]
pub struct LineReader {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<ReaderSummary>>,
}

impl LineReader {
    /// Run the reader loop on a new `vfd-reader` thread.
    pub fn spawn<T, D>(transport: T, drive: D) -> std::io::Result<Self>
    where
        T: Transport + 'static,
        D: DriveControl + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("vfd-reader".into())
            .spawn(move || run(transport, drive, &flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the loop to stop. It exits after its current read returns.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Whether the loop has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to end.
    pub fn join(mut self) -> ReaderSummary {
        self.wait()
    }

    /// Stop and wait.
    pub fn shutdown(mut self) -> ReaderSummary {
        self.stop();
        self.wait()
    }

    fn wait(&mut self) -> ReaderSummary {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                tracing::error!("reader thread panicked");
                ReaderSummary {
                    exit: ReaderExit::Panicked,
                    lines: 0,
                }
            }
            None => ReaderSummary {
                exit: ReaderExit::Stopped,
                lines: 0,
            },
        }
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
            self.wait();
        }
    }
}

/// Run the reader loop on the calling thread until `stop` is raised or the
/// transport ends.
pub fn run<T, D>(mut transport: T, drive: D, stop: &AtomicBool) -> ReaderSummary
where
    T: Transport,
    D: DriveControl,
{
    let mut session = ProtocolSession::new(drive);
    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break ReaderExit::Stopped;
        }
        let bytes = match transport.read_available() {
            Ok(bytes) => bytes,
            Err(TransportError::Closed) => {
                tracing::info!("transport closed by peer");
                break ReaderExit::Closed;
            }
            Err(err) => {
                tracing::error!(%err, "transport read failed");
                break ReaderExit::ReadFailed;
            }
        };
        if bytes.is_empty() {
            thread::park_timeout(IDLE_PARK);
            continue;
        }

        let reply = session.feed(&bytes);
        if reply.is_empty() {
            continue;
        }
        if let Err(err) = transport.write(reply.as_bytes()) {
            tracing::error!(%err, "transport write failed");
            break ReaderExit::WriteFailed;
        }
    };

    transport.close();
    let summary = ReaderSummary {
        exit,
        lines: session.handled(),
    };
    tracing::debug!(exit = ?summary.exit, lines = summary.lines, "reader loop ended");
    summary
}
