//! Error types for the drive engine, configuration, and transports.
//!
//! Every command-handler error ends up as a textual protocol response; none of
//! these types ever crosses the transport boundary as a failure. Tick failures
//! ([`DriveError::NonFinite`]) are caught by the scheduler and turned into a
//! software-fault alarm.

use thiserror::Error;

use crate::commands::RejectReason;

/// Errors returned by drive operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriveError {
    /// Valid request, wrong operating state. State is left unchanged.
    #[error("operation rejected: {0}")]
    Rejected(RejectReason),

    /// Requested frequency is outside `0..=max` or not a finite number.
    #[error("frequency {value} Hz out of range (0-{max} Hz)")]
    InvalidFrequency {
        /// Requested value.
        value: f64,
        /// Upper bound (nominal frequency).
        max: f64,
    },

    /// A simulated condition value was not a finite number.
    #[error("invalid simulated {quantity}: {value}")]
    InvalidCondition {
        /// Which quantity was being forced.
        quantity: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// The physics step produced a non-finite value.
    #[error("non-finite {quantity} after physics step")]
    NonFinite {
        /// Name of the offending quantity.
        quantity: &'static str,
    },
}

impl From<RejectReason> for DriveError {
    fn from(reason: RejectReason) -> Self {
        DriveError::Rejected(reason)
    }
}

/// Configuration validation and loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value the model cannot run with.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Human-readable constraint.
        reason: &'static str,
    },

    /// Config file could not be read.
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for the expected schema.
    #[cfg(feature = "cli")]
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Byte-stream transport errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer closed the stream or [`close`](crate::traits::Transport::close) was called.
    #[error("transport closed")]
    Closed,

    /// Underlying IO failure.
    #[error("transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while tokenizing a protocol line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// First token matches no known keyword.
    #[error("unknown command")]
    UnknownCommand,

    /// Keyword known, argument count or shape wrong. Carries the usage hint.
    #[error("bad format, usage: {usage}")]
    BadFormat {
        /// Usage string for the matched command.
        usage: &'static str,
    },

    /// Argument present but not a valid value.
    #[error("invalid value")]
    InvalidValue,
}

/// CSV data-log errors. Logged and skipped by the scheduler.
#[derive(Error, Debug)]
pub enum DataLogError {
    /// File could not be opened or written.
    #[error("data log IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed.
    #[error("data log CSV error: {0}")]
    Csv(#[from] csv::Error),
}
