//! Runtime services around the drive engine.
//!
//! Every service shares one engine through [`SharedDrive`] wrapped in `Arc`:
//!
//! - `shared`: the lock, plus the [`DriveControl`] consumer trait
//! - `scheduler`: periodic tick thread and CSV data-log thread
//! - `datalog`: the CSV writer
//! - `line_reader`: protocol loop over any [`Transport`](crate::traits::Transport)
//! - `tcp` (feature `tcp`): tokio line server, one session per client
//!
//! ```ignore
//! use std::sync::Arc;
//! use vfd_sim::services::{LineReader, SharedDrive, UpdateScheduler};
//!
//! let drive = Arc::new(SharedDrive::new(engine));
//! let scheduler = UpdateScheduler::start(Arc::clone(&drive), &config.scheduler)?;
//! let reader = LineReader::spawn(transport, Arc::clone(&drive))?;
//! ```

pub mod datalog;
pub mod line_reader;
pub mod scheduler;
pub mod shared;

#[cfg(feature = "tcp")]
pub mod tcp;

pub use datalog::DataLogger;
pub use line_reader::{LineReader, ReaderExit, ReaderSummary};
pub use scheduler::UpdateScheduler;
pub use shared::{DriveControl, SharedDrive};

#[cfg(feature = "tcp")]
pub use tcp::TcpLineServer;
