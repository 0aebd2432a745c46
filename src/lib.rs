//! # vfd-sim
//!
//! A simulated variable-frequency motor drive (inverter) controlled through an
//! ASCII line protocol, for exercising supervisory software without hardware.
//!
//! ## Features
//!
//! - **Drive physics**: linear frequency ramps, V/f voltage, quadratic load
//!   current, slip, torque, power and a first-order thermal model
//! - **Alarms**: overcurrent, over/undervoltage, overtemperature and supply
//!   faults, plus injectable faults, with a per-code history
//! - **State machine**: READY → ACCELERATING → RUNNING → DECELERATING, alarm
//!   trips, and stop-then-restart direction reversal
//! - **Line protocol**: `RUN`, `STOP`, `RST`, `FREQ`, `DIR`, `STATUS`, `HELP`
//!   over any byte-stream transport, or TCP with the `tcp` feature
//! - **Scheduler**: periodic tick thread and best-effort CSV data log
//!
//! ## Architecture
//!
//! - `drive` - Physical state and the per-tick model
//! - `alarm` - Alarm rules and records
//! - `machine` - Operating-state transitions
//! - `engine` - Ties model, alarms and machine together behind one API
//! - `protocol` / `parsing` / `commands` - Line framing, tokenizing, dispatch
//! - `services` - Shared engine, scheduler, data log, reader loop, TCP server
//! - `traits` / `hal` - Transport abstraction with mock and `std::io` implementations
//!
//! ## Example
//!
//! ```rust
//! use vfd_sim::{DriveConfig, DriveEngine, OperatingState};
//!
//! let mut engine = DriveEngine::new(DriveConfig::default().noiseless()).unwrap();
//! engine.set_frequency(50.0).unwrap();
//! engine.start().unwrap();
//!
//! // 100 ms ticks; ramp is 10 Hz/s
//! for _ in 0..60 {
//!     engine.tick(0.1).unwrap();
//! }
//! let snapshot = engine.snapshot();
//! assert_eq!(snapshot.state, OperatingState::Running);
//! assert!((snapshot.output_frequency - 50.0).abs() < 0.1);
//! ```

#![warn(missing_docs)]

/// Alarm codes, records and the alarm manager.
pub mod alarm;
/// Protocol command table and command types.
pub mod commands;
/// Simulator configuration with builder methods and TOML loading.
pub mod config;
/// Physical drive state and the per-tick model.
pub mod drive;
/// The drive engine: model, alarms and state machine behind one API.
pub mod engine;
/// Error types.
pub mod error;
/// Drive event channel.
pub mod events;
/// Transport implementations (mock and `std::io` streams).
pub mod hal;
/// Tracing subscriber setup.
pub mod logging;
/// Operating-state transitions.
pub mod machine;
/// Line tokenizer for protocol commands.
pub mod parsing;
/// Line framing, dispatch and responses.
pub mod protocol;
/// Shared engine, scheduler, data log, reader loop and TCP server.
pub mod services;
/// I/O traits.
pub mod traits;

// Re-exports for convenience
pub use alarm::{AlarmCode, AlarmManager, AlarmRecord};
pub use commands::{CommandKind, CommandSpec, DriveCommand, RejectReason, COMMANDS};
pub use config::{DeviceConfig, DriveConfig, SchedulerConfig, ServerConfig, SimulatorConfig};
pub use drive::{Direction, DriveModel, DriveState, OperatingState, NO_ALARM};
pub use engine::{DriveEngine, DriveSnapshot, SimulatedConditions};
pub use error::{ConfigError, DataLogError, DriveError, ParseError, TransportError};
pub use events::{DriveEvent, EventBus};
pub use machine::{DirectionChange, StateMachine};
pub use protocol::{CommandProtocol, ProtocolSession, Response};
pub use services::{DriveControl, SharedDrive};
pub use traits::Transport;
