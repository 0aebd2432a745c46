//! Maps parsed commands onto drive operations.

use crate::commands::DriveCommand;
use crate::error::DriveError;
use crate::parsing::parse_line;
use crate::services::DriveControl;

use super::framing::{Frame, LineBuffer};
use super::response::{ProtocolError, Response};

// ============================================================================
// Command Protocol
// ============================================================================

/// Stateless command dispatcher over any [`DriveControl`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vfd_sim::protocol::CommandProtocol;
/// use vfd_sim::services::SharedDrive;
/// use vfd_sim::{DriveConfig, DriveEngine};
///
/// let drive = Arc::new(SharedDrive::new(DriveEngine::new(DriveConfig::default()).unwrap()));
/// let protocol = CommandProtocol::new(drive);
///
/// assert_eq!(protocol.handle_line("FREQ 50").render(), "OK: Frequenza impostata a 50.0 Hz\r\n");
/// assert_eq!(protocol.handle_line("RUN").render(), "OK\r\n");
/// assert_eq!(protocol.handle_line("RUN").render(), "ERR: Impossibile avviare l'inverter\r\n");
/// ```
#[derive(Debug, Clone)]
pub struct CommandProtocol<D> {
    drive: D,
}

impl<D: DriveControl> CommandProtocol<D> {
    /// Dispatch onto `drive`.
    pub fn new(drive: D) -> Self {
        Self { drive }
    }

    /// The drive being controlled.
    pub fn drive(&self) -> &D {
        &self.drive
    }

    /// Parse and execute one line.
    pub fn handle_line(&self, line: &str) -> Response {
        tracing::debug!(line, "command received");
        match parse_line(line) {
            Ok(command) => self.execute(command),
            Err(err) => {
                tracing::debug!(line, %err, "command not parsed");
                Response::Error(err.into())
            }
        }
    }

    /// Execute an already-parsed command.
    pub fn execute(&self, command: DriveCommand) -> Response {
        match command {
            DriveCommand::Run => match self.drive.start() {
                Ok(()) => Response::Ok,
                Err(_) => ProtocolError::StartFailed.into(),
            },
            DriveCommand::Stop => match self.drive.stop() {
                Ok(()) => Response::Ok,
                Err(_) => ProtocolError::StopFailed.into(),
            },
            DriveCommand::ResetAlarms => {
                self.drive.reset_alarms();
                Response::Ok
            }
            DriveCommand::SetFrequency(hz) => match self.drive.set_frequency(hz) {
                Ok(()) => Response::FrequencySet(hz),
                Err(DriveError::InvalidFrequency { max, .. }) => {
                    ProtocolError::FrequencyOutOfRange { max }.into()
                }
                Err(_) => ProtocolError::InvalidValue.into(),
            },
            DriveCommand::SetDirection(direction) => {
                let change = self.drive.set_direction(direction);
                tracing::debug!(?direction, ?change, "direction command");
                Response::DirectionSet(direction)
            }
            DriveCommand::Status => Response::Status(Box::new(self.drive.snapshot())),
            DriveCommand::Help => Response::Help,
        }
    }

    /// Answer one framing result.
    pub fn handle_frame(&self, frame: Frame) -> Response {
        match frame {
            Frame::Line(line) => self.handle_line(&line),
            Frame::Overflow => {
                tracing::warn!("protocol line too long, discarded");
                ProtocolError::LineTooLong.into()
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Framing plus dispatch for one byte stream.
///
/// Each transport connection owns a session; sessions share the drive.
#[derive(Debug)]
pub struct ProtocolSession<D> {
    protocol: CommandProtocol<D>,
    buffer: LineBuffer,
    handled: u64,
}

impl<D: DriveControl> ProtocolSession<D> {
    /// Fresh session over `drive`.
    pub fn new(drive: D) -> Self {
        Self {
            protocol: CommandProtocol::new(drive),
            buffer: LineBuffer::new(),
            handled: 0,
        }
    }

    /// Feed received bytes; returns the rendered reply text (possibly empty).
    pub fn feed(&mut self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for frame in self.buffer.push_bytes(bytes) {
            out.push_str(&self.protocol.handle_frame(frame).render());
            self.handled += 1;
        }
        out
    }

    /// Lines answered so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// The dispatcher.
    pub fn protocol(&self) -> &CommandProtocol<D> {
        &self.protocol
    }
}
