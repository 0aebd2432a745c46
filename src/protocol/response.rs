//! Protocol responses and their wire text.
//!
//! Every response renders to one or more `\r\n`-terminated lines. Single-line
//! replies start with `OK` or `ERR:`; `STATUS` and `HELP` return framed
//! blocks.

use core::fmt::{self, Write as _};

use crate::commands::COMMANDS;
use crate::drive::Direction;
use crate::engine::DriveSnapshot;
use crate::error::ParseError;

/// Line terminator for every response line.
pub const CRLF: &str = "\r\n";

/// Protocol-level error replies.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Keyword not in the command table.
    UnknownCommand,
    /// Wrong argument count or shape.
    BadFormat {
        /// Usage hint for the command.
        usage: &'static str,
    },
    /// Argument is not a usable number.
    InvalidValue,
    /// Frequency outside `0..=max`.
    FrequencyOutOfRange {
        /// Upper bound (Hz).
        max: f64,
    },
    /// `RUN` refused.
    StartFailed,
    /// `STOP` refused.
    StopFailed,
    /// Line longer than the framing buffer.
    LineTooLong,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => f.write_str("ERR: Comando non riconosciuto"),
            Self::BadFormat { usage } => write!(f, "ERR: Formato non valido. Usa: {usage}"),
            Self::InvalidValue => f.write_str("ERR: Valore non valido"),
            Self::FrequencyOutOfRange { max } => {
                write!(f, "ERR: Frequenza fuori range (0-{max:.1} Hz)")
            }
            Self::StartFailed => f.write_str("ERR: Impossibile avviare l'inverter"),
            Self::StopFailed => f.write_str("ERR: Impossibile fermare l'inverter"),
            Self::LineTooLong => f.write_str("ERR: Riga troppo lunga"),
        }
    }
}

impl From<ParseError> for ProtocolError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownCommand => Self::UnknownCommand,
            ParseError::BadFormat { usage } => Self::BadFormat { usage },
            ParseError::InvalidValue => Self::InvalidValue,
        }
    }
}

/// Reply to one protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Plain acknowledgement.
    Ok,
    /// `FREQ` accepted.
    FrequencySet(f64),
    /// `DIR` accepted.
    DirectionSet(Direction),
    /// `STATUS` block.
    Status(Box<DriveSnapshot>),
    /// `HELP` block.
    Help,
    /// Any `ERR:` reply.
    Error(ProtocolError),
}

impl Response {
    /// Whether this is an `ERR:` reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Wire text, `\r\n`-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> fmt::Result {
        match self {
            Self::Ok => write!(out, "OK{CRLF}"),
            Self::FrequencySet(hz) => {
                write!(out, "OK: Frequenza impostata a {} Hz{CRLF}", format_hz(*hz))
            }
            Self::DirectionSet(direction) => {
                write!(out, "OK: Direzione impostata a {}{CRLF}", direction.label())
            }
            Self::Status(snapshot) => write_status(out, snapshot),
            Self::Help => write_help(out),
            Self::Error(err) => write!(out, "{err}{CRLF}"),
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Response::Error(err)
    }
}

/// Echo a setpoint: whole numbers keep one decimal (`50.0`), others print as
/// given (`12.75`).
pub fn format_hz(hz: f64) -> String {
    let hz = if hz == 0.0 { 0.0 } else { hz };
    if hz.fract() == 0.0 {
        format!("{hz:.1}")
    } else {
        format!("{hz}")
    }
}

fn write_status(out: &mut String, s: &DriveSnapshot) -> fmt::Result {
    let alarm = if s.alarm_active {
        s.alarm_description.as_str()
    } else {
        "Nessuno"
    };
    write!(out, "=== STATO INVERTER ==={CRLF}")?;
    write!(out, "STATO: {}{CRLF}", s.state.label())?;
    write!(out, "FREQUENZA: {:.1} Hz{CRLF}", s.output_frequency)?;
    write!(out, "TENSIONE: {:.1} V{CRLF}", s.output_voltage)?;
    write!(out, "CORRENTE: {:.2} A{CRLF}", s.output_current)?;
    write!(out, "VELOCITA: {:.0} RPM{CRLF}", s.motor_speed.trunc())?;
    write!(out, "TEMPERATURA: {:.1} C{CRLF}", s.temperature)?;
    write!(out, "DIREZIONE: {}{CRLF}", s.direction.status_label())?;
    write!(out, "ALLARME: {alarm}{CRLF}")?;
    write!(out, "==================={CRLF}")
}

fn write_help(out: &mut String) -> fmt::Result {
    write!(out, "=== COMANDI DISPONIBILI ==={CRLF}")?;
    for spec in &COMMANDS {
        write!(out, "{}: {}{CRLF}", spec.keyword, spec.description)?;
    }
    write!(out, "{CRLF}Esempi:{CRLF}")?;
    for spec in &COMMANDS {
        let (line, meaning) = spec.example;
        write!(out, "  {line:<9} - {meaning}{CRLF}")?;
    }
    write!(out, "========================={CRLF}")
}
