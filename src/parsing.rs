//! Line tokenizer for the drive protocol.
//!
//! A line is split on ASCII whitespace. The first token is matched against the
//! [command table](crate::commands::COMMANDS) ignoring case; the remaining
//! tokens are parsed per command. Range checks are left to the engine so the
//! error text can quote the configured limit.
//!
//! ```rust
//! use vfd_sim::parsing::parse_line;
//! use vfd_sim::{Direction, DriveCommand};
//!
//! assert_eq!(parse_line("freq 12.5"), Ok(DriveCommand::SetFrequency(12.5)));
//! assert_eq!(parse_line("DIR -1"), Ok(DriveCommand::SetDirection(Direction::Reverse)));
//! assert!(parse_line("JUMP").is_err());
//! ```

use crate::commands::{CommandKind, DriveCommand};
use crate::drive::Direction;
use crate::error::ParseError;

/// Parse one protocol line (without its terminator).
pub fn parse_line(line: &str) -> Result<DriveCommand, ParseError> {
    let mut tokens = line.split_ascii_whitespace();
    let keyword = tokens.next().ok_or(ParseError::UnknownCommand)?;
    let kind = CommandKind::from_keyword(keyword).ok_or(ParseError::UnknownCommand)?;

    let argument = tokens.next();
    if tokens.next().is_some() {
        return Err(ParseError::BadFormat {
            usage: kind.usage(),
        });
    }

    let bad_format = ParseError::BadFormat {
        usage: kind.usage(),
    };
    match (kind, argument) {
        (CommandKind::Freq, Some(arg)) => parse_frequency(arg).map(DriveCommand::SetFrequency),
        (CommandKind::Dir, Some(arg)) => parse_direction(arg)
            .map(DriveCommand::SetDirection)
            .ok_or(bad_format),
        (CommandKind::Freq | CommandKind::Dir, None) => Err(bad_format),
        (_, Some(_)) => Err(bad_format),
        (CommandKind::Run, None) => Ok(DriveCommand::Run),
        (CommandKind::Stop, None) => Ok(DriveCommand::Stop),
        (CommandKind::Reset, None) => Ok(DriveCommand::ResetAlarms),
        (CommandKind::Status, None) => Ok(DriveCommand::Status),
        (CommandKind::Help, None) => Ok(DriveCommand::Help),
    }
}

/// Parse a frequency argument. Only finite numbers are accepted.
pub fn parse_frequency(arg: &str) -> Result<f64, ParseError> {
    match arg.parse::<f64>() {
        // `-0` is zero
        Ok(value) if value == 0.0 => Ok(0.0),
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse a direction argument (`1`, `+1`, `-1`, or a direction name).
pub fn parse_direction(arg: &str) -> Option<Direction> {
    Direction::from_text(arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Keywords
    // =========================================================================

    #[test]
    fn bare_keywords() {
        assert_eq!(parse_line("RUN"), Ok(DriveCommand::Run));
        assert_eq!(parse_line("STOP"), Ok(DriveCommand::Stop));
        assert_eq!(parse_line("RST"), Ok(DriveCommand::ResetAlarms));
        assert_eq!(parse_line("STATUS"), Ok(DriveCommand::Status));
        assert_eq!(parse_line("HELP"), Ok(DriveCommand::Help));
    }

    #[test]
    fn keywords_ignore_case_and_padding() {
        assert_eq!(parse_line("run"), Ok(DriveCommand::Run));
        assert_eq!(parse_line("  Status\t"), Ok(DriveCommand::Status));
        assert_eq!(parse_line("hElP"), Ok(DriveCommand::Help));
    }

    #[test]
    fn unknown_keyword() {
        assert_eq!(parse_line("JUMP"), Err(ParseError::UnknownCommand));
        assert_eq!(parse_line("RUNN"), Err(ParseError::UnknownCommand));
        assert_eq!(parse_line(""), Err(ParseError::UnknownCommand));
        assert_eq!(parse_line("   "), Err(ParseError::UnknownCommand));
    }

    #[test]
    fn extra_arguments_rejected() {
        assert_eq!(
            parse_line("RUN now"),
            Err(ParseError::BadFormat { usage: "RUN" })
        );
        assert_eq!(
            parse_line("STATUS 1"),
            Err(ParseError::BadFormat { usage: "STATUS" })
        );
    }

    // =========================================================================
    // FREQ
    // =========================================================================

    #[test]
    fn freq_values() {
        assert_eq!(parse_line("FREQ 50"), Ok(DriveCommand::SetFrequency(50.0)));
        assert_eq!(parse_line("FREQ 0"), Ok(DriveCommand::SetFrequency(0.0)));
        assert_eq!(
            parse_line("freq   12.75"),
            Ok(DriveCommand::SetFrequency(12.75))
        );
        // Range is the engine's business
        assert_eq!(
            parse_line("FREQ 999999"),
            Ok(DriveCommand::SetFrequency(999999.0))
        );
        assert_eq!(parse_line("FREQ -5"), Ok(DriveCommand::SetFrequency(-5.0)));
    }

    #[test]
    fn freq_negative_zero_is_zero() {
        for arg in ["-0", "-0.0", "+0"] {
            let Ok(DriveCommand::SetFrequency(hz)) = parse_line(&format!("FREQ {arg}")) else {
                panic!("FREQ {arg} not parsed");
            };
            assert_eq!(hz, 0.0);
            assert!(hz.is_sign_positive(), "{arg}");
        }
    }

    #[test]
    fn freq_missing_or_extra_argument() {
        let usage = ParseError::BadFormat {
            usage: "FREQ <valore>",
        };
        assert_eq!(parse_line("FREQ"), Err(usage.clone()));
        assert_eq!(parse_line("FREQ 1 2"), Err(usage));
    }

    #[test]
    fn freq_invalid_value() {
        for line in ["FREQ abc", "FREQ 1,5", "FREQ nan", "FREQ inf", "FREQ -inf", "FREQ 5Hz"] {
            assert_eq!(parse_line(line), Err(ParseError::InvalidValue), "{line}");
        }
    }

    // =========================================================================
    // DIR
    // =========================================================================

    #[test]
    fn dir_values() {
        assert_eq!(
            parse_line("DIR 1"),
            Ok(DriveCommand::SetDirection(Direction::Forward))
        );
        assert_eq!(
            parse_line("DIR +1"),
            Ok(DriveCommand::SetDirection(Direction::Forward))
        );
        assert_eq!(
            parse_line("dir -1"),
            Ok(DriveCommand::SetDirection(Direction::Reverse))
        );
        assert_eq!(
            parse_line("DIR indietro"),
            Ok(DriveCommand::SetDirection(Direction::Reverse))
        );
    }

    #[test]
    fn dir_bad_format() {
        let usage = ParseError::BadFormat {
            usage: "DIR 1 (avanti) o DIR -1 (indietro)",
        };
        for line in ["DIR", "DIR 0", "DIR 2", "DIR x", "DIR 1 1"] {
            assert_eq!(parse_line(line), Err(usage.clone()), "{line}");
        }
    }
}
