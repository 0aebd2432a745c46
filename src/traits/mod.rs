//! Trait definitions for the I/O seams of the simulator.
//!
//! The drive engine itself has no I/O. Everything that moves bytes in or out
//! goes through a trait here so the same protocol code runs over a real
//! stream or a test double.
//!
//! # Submodules
//!
//! - `transport`: [`Transport`], a polled byte stream
//!
//! The consumer-side seam, [`DriveControl`](crate::services::DriveControl),
//! lives next to the shared engine it is implemented for.

pub mod transport;

pub use transport::*;
