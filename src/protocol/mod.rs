//! ASCII line protocol.
//!
//! Incoming bytes go through three stages:
//!
//! ```text
//! bytes ──► LineBuffer ──► parse_line ──► CommandProtocol ──► Response::render ──► bytes
//!           (framing)      (parsing)      (DriveControl)      ("\r\n" lines)
//! ```
//!
//! Every non-blank line produces exactly one [`Response`]. The protocol never
//! fails: parse errors, out-of-range values and rejected commands all become
//! `ERR:` replies.
//!
//! # Submodules
//!
//! - `framing`: [`LineBuffer`], bounded line splitting
//! - `response`: [`Response`] and its wire text
//! - `dispatch`: [`CommandProtocol`] and per-stream [`ProtocolSession`]

pub mod dispatch;
pub mod framing;
pub mod response;

pub use dispatch::{CommandProtocol, ProtocolSession};
pub use framing::{Frame, LineBuffer, MAX_LINE};
pub use response::{format_hz, ProtocolError, Response, CRLF};
