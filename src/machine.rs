//! Operating-state transition rules.
//!
//! [`StateMachine`] owns the only piece of state that is not part of
//! [`DriveState`]: a pending direction reversal. Everything else it reads and
//! writes lives in the drive state, so the engine can hand it the state under
//! the same lock as the physics step.
//!
//! # Transitions
//!
//! ```text
//!            start()                  |f - target| < ε
//!   READY ───────────► ACCELERATING ───────────────────► RUNNING
//!     ▲                    ▲  │                            │
//!     │ f ≤ ε, target 0    │  │ stop() / lower setpoint    │ stop() / lower setpoint
//!     │                    │  ▼                            ▼
//!     └──────────────── DECELERATING ◄─────────────────────┘
//!                          (pending reversal: flip, then ACCELERATING)
//!
//!   any ── alarm active ──► ALARM ── reset_alarms() ──► READY
//! ```

use crate::commands::RejectReason;
use crate::config::DriveConfig;
use crate::drive::{Direction, DriveState, OperatingState};
use crate::error::DriveError;

/// Outcome of a direction request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DirectionChange {
    /// Already turning (or scheduled to turn) that way.
    Unchanged,
    /// Applied at once; the motor was not turning.
    Applied,
    /// Stop-then-restart sequence started.
    Reversing,
    /// A pending reversal was withdrawn.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Reversal {
    direction: Direction,
    restart: bool,
}

/// Transition rules plus the pending-reversal latch.
#[derive(Clone, Debug, Default)]
pub struct StateMachine {
    reversal: Option<Reversal>,
}

impl StateMachine {
    /// No reversal pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction the drive will flip to at standstill, if any.
    pub fn pending_reversal(&self) -> Option<Direction> {
        self.reversal.map(|r| r.direction)
    }

    /// Frequency the physics step should ramp toward.
    pub fn effective_target(&self, s: &DriveState) -> f64 {
        if s.state.is_turning() {
            s.target_frequency
        } else {
            0.0
        }
    }

    /// READY → ACCELERATING toward the setpoint.
    pub fn start(&mut self, s: &mut DriveState) -> Result<(), DriveError> {
        if s.alarm_active || s.state == OperatingState::Alarm {
            return Err(RejectReason::AlarmActive.into());
        }
        if s.state != OperatingState::Ready {
            return Err(RejectReason::NotReady.into());
        }
        s.state = OperatingState::Accelerating;
        s.target_frequency = s.frequency_setpoint;
        s.running = true;
        s.start_count += 1;
        Ok(())
    }

    /// Ramp down to standstill.
    ///
    /// Stopping during a reversal cancels the restart; the direction still
    /// flips at standstill.
    pub fn stop(&mut self, s: &mut DriveState) -> Result<(), DriveError> {
        match s.state {
            OperatingState::Accelerating | OperatingState::Running => {}
            OperatingState::Decelerating if s.target_frequency > 0.0 => {}
            OperatingState::Decelerating => {
                return match self.reversal.as_mut() {
                    Some(reversal) if reversal.restart => {
                        reversal.restart = false;
                        Ok(())
                    }
                    _ => Err(RejectReason::AlreadyStopping.into()),
                };
            }
            OperatingState::Ready | OperatingState::Off | OperatingState::Alarm => {
                return Err(RejectReason::NotRunning.into());
            }
        }
        s.state = OperatingState::Decelerating;
        s.target_frequency = 0.0;
        Ok(())
    }

    /// Store a new setpoint; re-target the ramp when a start is in effect.
    pub fn set_frequency(
        &mut self,
        s: &mut DriveState,
        config: &DriveConfig,
        value: f64,
    ) -> Result<(), DriveError> {
        if !value.is_finite() || value < 0.0 || value > config.nominal_frequency {
            return Err(DriveError::InvalidFrequency {
                value,
                max: config.nominal_frequency,
            });
        }
        s.frequency_setpoint = value;

        let retarget = match s.state {
            OperatingState::Accelerating | OperatingState::Running => true,
            OperatingState::Decelerating => s.target_frequency > 0.0,
            _ => false,
        };
        if retarget && self.reversal.is_none() {
            s.target_frequency = value;
            s.state = if value >= s.output_frequency {
                OperatingState::Accelerating
            } else {
                OperatingState::Decelerating
            };
        }
        Ok(())
    }

    /// Change direction; stop-then-restart while the motor turns.
    pub fn set_direction(&mut self, s: &mut DriveState, direction: Direction) -> DirectionChange {
        if !s.state.is_turning() {
            if s.direction == direction {
                return DirectionChange::Unchanged;
            }
            s.direction = direction;
            return DirectionChange::Applied;
        }

        if let Some(reversal) = self.reversal {
            if reversal.direction == direction {
                return DirectionChange::Unchanged;
            }
            // Back to the current direction: withdraw the flip
            self.reversal = None;
            if reversal.restart {
                s.target_frequency = s.frequency_setpoint;
                s.state = if s.frequency_setpoint >= s.output_frequency {
                    OperatingState::Accelerating
                } else {
                    OperatingState::Decelerating
                };
            }
            return DirectionChange::Cancelled;
        }

        if s.direction == direction {
            return DirectionChange::Unchanged;
        }

        let restart = !(s.state == OperatingState::Decelerating && s.target_frequency == 0.0);
        self.reversal = Some(Reversal { direction, restart });
        s.state = OperatingState::Decelerating;
        s.target_frequency = 0.0;
        DirectionChange::Reversing
    }

    /// Enter ALARM: output tripped to standstill, start cancelled, reversal dropped.
    pub fn trip(&mut self, s: &mut DriveState, config: &DriveConfig) {
        self.reversal = None;
        s.state = OperatingState::Alarm;
        s.running = false;
        s.target_frequency = 0.0;
        s.standstill(config);
    }

    /// ALARM → READY. No effect in other states.
    pub fn clear_trip(&mut self, s: &mut DriveState) {
        if s.state == OperatingState::Alarm {
            s.state = OperatingState::Ready;
            s.running = false;
            s.target_frequency = 0.0;
        }
    }

    /// Tick transitions, applied after physics and alarm evaluation.
    pub fn advance(&mut self, s: &mut DriveState, config: &DriveConfig, alarm_active: bool) {
        if alarm_active {
            if s.state != OperatingState::Alarm {
                self.trip(s, config);
            }
            return;
        }

        let eps = config.frequency_epsilon;
        let f = s.output_frequency;
        match s.state {
            OperatingState::Accelerating if (f - s.target_frequency).abs() < eps => {
                s.state = OperatingState::Running;
            }
            OperatingState::Decelerating if s.target_frequency <= 0.0 && f <= eps => {
                s.output_frequency = 0.0;
                match self.reversal.take() {
                    Some(Reversal {
                        direction,
                        restart: true,
                    }) => {
                        s.direction = direction;
                        s.start_count += 1;
                        s.target_frequency = s.frequency_setpoint;
                        s.state = OperatingState::Accelerating;
                    }
                    Some(Reversal {
                        direction,
                        restart: false,
                    }) => {
                        s.direction = direction;
                        s.state = OperatingState::Ready;
                        s.running = false;
                    }
                    None => {
                        s.state = OperatingState::Ready;
                        s.running = false;
                    }
                }
            }
            OperatingState::Decelerating
                if s.target_frequency > 0.0 && (f - s.target_frequency).abs() < eps =>
            {
                s.state = OperatingState::Running;
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
