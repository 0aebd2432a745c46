//! Command types for the drive line protocol.
//!
//! This module defines what a caller can ask the drive to do, independent of
//! how the request arrived (line protocol, TCP connection, direct API call).
//!
//! # Command Table
//!
//! Every keyword the protocol recognises is listed in [`COMMANDS`]. The table
//! drives tokenizing (see [`crate::parsing`]) and the `HELP` listing, so a
//! keyword added here shows up in both.
//!
//! | Keyword | Command | Arguments |
//! |---------|---------|-----------|
//! | `RUN` | [`DriveCommand::Run`] | none |
//! | `STOP` | [`DriveCommand::Stop`] | none |
//! | `RST` | [`DriveCommand::ResetAlarms`] | none |
//! | `FREQ` | [`DriveCommand::SetFrequency`] | frequency in Hz |
//! | `DIR` | [`DriveCommand::SetDirection`] | `1`, `+1` or `-1` |
//! | `STATUS` | [`DriveCommand::Status`] | none |
//! | `HELP` | [`DriveCommand::Help`] | none |
//!
//! # Rejections
//!
//! A well-formed command can still be refused because the drive is in the
//! wrong state. [`RejectReason`] says why:
//!
//! ```rust
//! use vfd_sim::RejectReason;
//!
//! assert_eq!(RejectReason::NotRunning.to_string(), "drive is not running");
//! ```

use core::fmt;

use crate::drive::Direction;

// ============================================================================
// Command Kinds and Table
// ============================================================================

/// Keyword-level identity of a command (no arguments attached).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandKind {
    /// Start the drive.
    Run,
    /// Ramp the drive down to standstill.
    Stop,
    /// Clear active alarms.
    Reset,
    /// Set the frequency setpoint.
    Freq,
    /// Set the direction of rotation.
    Dir,
    /// Report a status block.
    Status,
    /// List the available commands.
    Help,
}

/// One row of the command table.
#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    /// Which command this row describes.
    pub kind: CommandKind,
    /// Upper-case protocol keyword.
    pub keyword: &'static str,
    /// One-line description shown by `HELP`.
    pub description: &'static str,
    /// Usage hint appended to format errors.
    pub usage: &'static str,
    /// Example line and its explanation, shown by `HELP`.
    pub example: (&'static str, &'static str),
}

/// Every recognised command, in `HELP` order.
pub const COMMANDS: [CommandSpec; 7] = [
    CommandSpec {
        kind: CommandKind::Run,
        keyword: "RUN",
        description: "Avvia l'inverter",
        usage: "RUN",
        example: ("RUN", "Avvia l'inverter"),
    },
    CommandSpec {
        kind: CommandKind::Stop,
        keyword: "STOP",
        description: "Ferma l'inverter",
        usage: "STOP",
        example: ("STOP", "Ferma l'inverter"),
    },
    CommandSpec {
        kind: CommandKind::Reset,
        keyword: "RST",
        description: "Resetta gli allarmi",
        usage: "RST",
        example: ("RST", "Resetta gli allarmi"),
    },
    CommandSpec {
        kind: CommandKind::Freq,
        keyword: "FREQ",
        description: "Imposta la frequenza (es: FREQ 50.0)",
        usage: "FREQ <valore>",
        example: ("FREQ 50.0", "Imposta la frequenza a 50.0 Hz"),
    },
    CommandSpec {
        kind: CommandKind::Dir,
        keyword: "DIR",
        description: "Imposta la direzione (1=avanti, -1=indietro)",
        usage: "DIR 1 (avanti) o DIR -1 (indietro)",
        example: ("DIR 1", "Imposta la direzione in avanti"),
    },
    CommandSpec {
        kind: CommandKind::Status,
        keyword: "STATUS",
        description: "Restituisce lo stato dell'inverter",
        usage: "STATUS",
        example: ("STATUS", "Mostra lo stato corrente"),
    },
    CommandSpec {
        kind: CommandKind::Help,
        keyword: "HELP",
        description: "Mostra l'elenco dei comandi disponibili",
        usage: "HELP",
        example: ("HELP", "Mostra questo aiuto"),
    },
];

impl CommandKind {
    /// Look up a keyword, ignoring ASCII case.
    pub fn from_keyword(token: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|spec| spec.keyword.eq_ignore_ascii_case(token))
            .map(|spec| spec.kind)
    }

    /// The table row for this command.
    pub fn spec(self) -> &'static CommandSpec {
        // The table holds exactly one row per kind, in declaration order.
        &COMMANDS[self as usize]
    }

    /// Upper-case protocol keyword.
    #[inline]
    pub fn keyword(self) -> &'static str {
        self.spec().keyword
    }

    /// Usage hint for format errors.
    #[inline]
    pub fn usage(self) -> &'static str {
        self.spec().usage
    }

    /// Whether the command takes exactly one argument.
    #[inline]
    pub fn takes_argument(self) -> bool {
        matches!(self, CommandKind::Freq | CommandKind::Dir)
    }
}

// ============================================================================
// Parsed Commands
// ============================================================================

/// A fully parsed protocol command.
///
/// Produced by [`parse_line`](crate::parsing::parse_line) and consumed by the
/// dispatcher; never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriveCommand {
    /// Start the drive toward the current setpoint.
    Run,
    /// Decelerate to standstill.
    Stop,
    /// Clear active alarms.
    ResetAlarms,
    /// Set the frequency setpoint (Hz). Range is checked by the engine.
    SetFrequency(f64),
    /// Set the direction of rotation.
    SetDirection(Direction),
    /// Report the status block.
    Status,
    /// List the available commands.
    Help,
}

impl DriveCommand {
    /// Keyword-level identity of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Run => CommandKind::Run,
            Self::Stop => CommandKind::Stop,
            Self::ResetAlarms => CommandKind::Reset,
            Self::SetFrequency(_) => CommandKind::Freq,
            Self::SetDirection(_) => CommandKind::Dir,
            Self::Status => CommandKind::Status,
            Self::Help => CommandKind::Help,
        }
    }

    /// Whether executing the command can change drive state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Status | Self::Help)
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Reason a well-formed command was refused.
///
/// The drive state is never changed by a rejected command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RejectReason {
    /// Start requested outside READY.
    NotReady,
    /// An alarm is latched; reset it first.
    AlarmActive,
    /// Stop requested while the motor is not turning.
    NotRunning,
    /// Stop requested while already ramping down to zero.
    AlreadyStopping,
}

impl RejectReason {
    /// Short machine-friendly name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::AlarmActive => "alarm_active",
            Self::NotRunning => "not_running",
            Self::AlreadyStopping => "already_stopping",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotReady => "drive is not ready",
            Self::AlarmActive => "an alarm is active",
            Self::NotRunning => "drive is not running",
            Self::AlreadyStopping => "drive is already stopping",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Tests
// ============================================================================
