//! The drive engine: physics, alarms and state machine behind one API.
//!
//! [`DriveEngine`] is the composition point. It owns the configuration, the
//! live [`DriveState`], the [`AlarmManager`], the [`StateMachine`], the noise
//! source and the event bus, and exposes the periodic [`tick`](DriveEngine::tick)
//! plus every operation a caller can request.
//!
//! The engine itself is not thread-safe. Share it through
//! [`SharedDrive`](crate::services::SharedDrive), which puts the whole engine
//! behind a single lock so a tick and a command never interleave.
//!
//! # Example
//!
//! ```rust
//! use vfd_sim::{DriveConfig, DriveEngine, OperatingState};
//!
//! let config = DriveConfig::default().noiseless().with_seed(1);
//! let mut engine = DriveEngine::new(config).unwrap();
//!
//! engine.set_frequency(50.0).unwrap();
//! engine.start().unwrap();
//! assert_eq!(engine.snapshot().state, OperatingState::Accelerating);
//!
//! // 6 s at 10 Hz/s
//! for _ in 0..60 {
//!     engine.tick(0.1).unwrap();
//! }
//! let snap = engine.snapshot();
//! assert_eq!(snap.state, OperatingState::Running);
//! assert!((snap.output_frequency - 50.0).abs() < 0.1);
//! ```
//!
//! # Tick Order
//!
//! 1. Physics step toward the effective target.
//! 2. Simulated conditions override the computed values.
//! 3. Alarm rules run.
//! 4. State transitions (including the trip into ALARM).
//!
//! Observers therefore never see `alarm_active` disagree with the ALARM state.

use std::sync::mpsc::Receiver;

use crate::alarm::{AlarmCode, AlarmManager, AlarmRecord};
use crate::config::DriveConfig;
use crate::drive::{Direction, DriveModel, DriveState, OperatingState};
use crate::error::{ConfigError, DriveError};
use crate::events::{DriveEvent, EventBus};
use crate::machine::{DirectionChange, StateMachine};

// ============================================================================
// Simulated Conditions
// ============================================================================

/// Forced values applied after every physics step.
///
/// Used to drive the alarm rules from tests and from the simulator front-ends.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulatedConditions {
    /// Forced output current (A).
    pub current: Option<f64>,
    /// Forced output voltage (V).
    pub voltage: Option<f64>,
    /// Forced temperature (°C).
    pub temperature: Option<f64>,
    /// Supply lost.
    pub supply_fault: bool,
}

impl SimulatedConditions {
    /// Whether any value is forced.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
            && self.voltage.is_none()
            && self.temperature.is_none()
            && !self.supply_fault
    }

    fn apply(&self, state: &mut DriveState) {
        if let Some(current) = self.current {
            state.output_current = current;
        }
        if let Some(voltage) = self.voltage {
            state.output_voltage = voltage;
        }
        if let Some(temperature) = self.temperature {
            state.temperature = temperature;
        }
        state.supply_ok = !self.supply_fault;
    }
}

fn finite(quantity: &'static str, value: f64) -> Result<f64, DriveError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DriveError::InvalidCondition { quantity, value })
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time copy of the drive for observers.
///
/// Carries every [`DriveState`] field plus the active alarm records.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveSnapshot {
    /// Output frequency (Hz).
    pub output_frequency: f64,
    /// Output voltage (V).
    pub output_voltage: f64,
    /// Output current (A).
    pub output_current: f64,
    /// Motor speed (rpm).
    pub motor_speed: f64,
    /// Torque (Nm).
    pub torque: f64,
    /// Output power (W).
    pub output_power: f64,
    /// Temperature (°C).
    pub temperature: f64,
    /// Lifetime running hours.
    pub running_hours: f64,
    /// Lifetime start count.
    pub start_count: u32,
    /// Operating state.
    pub state: OperatingState,
    /// Direction of rotation.
    pub direction: Direction,
    /// Start in effect.
    pub running: bool,
    /// Aggregate alarm flag.
    pub alarm_active: bool,
    /// Aggregate alarm description.
    pub alarm_description: String,
    /// Ramp target (Hz).
    pub target_frequency: f64,
    /// Voltage at the ramp target (V).
    pub target_voltage: f64,
    /// Speed at the ramp target (rpm).
    pub target_speed: f64,
    /// User setpoint (Hz).
    pub frequency_setpoint: f64,
    /// Supply healthy.
    pub supply_ok: bool,
    /// Direction the drive will flip to at standstill.
    pub pending_reversal: Option<Direction>,
    /// Active alarm records.
    pub active_alarms: Vec<AlarmRecord>,
}

// ============================================================================
// Engine
// ============================================================================

/// Single-owner drive engine.
#[derive(Debug)]
pub struct DriveEngine {
    config: DriveConfig,
    state: DriveState,
    model: DriveModel,
    alarms: AlarmManager,
    machine: StateMachine,
    conditions: SimulatedConditions,
    events: EventBus,
}

impl DriveEngine {
    /// Build an engine in READY from a validated configuration.
    pub fn new(config: DriveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: DriveState::new(&config),
            model: DriveModel::new(config.seed),
            alarms: AlarmManager::new(),
            machine: StateMachine::new(),
            conditions: SimulatedConditions::default(),
            events: EventBus::new(),
            config,
        })
    }

    /// Drive configuration.
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Live state (read-only).
    pub fn state(&self) -> &DriveState {
        &self.state
    }

    /// Fault history.
    pub fn alarms(&self) -> &AlarmManager {
        &self.alarms
    }

    /// Currently forced values.
    pub fn conditions(&self) -> &SimulatedConditions {
        &self.conditions
    }

    /// Register an event subscriber.
    pub fn subscribe(&mut self) -> Receiver<DriveEvent> {
        self.events.subscribe()
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// A non-finite physics result leaves the state as it was before the step
    /// and is returned as [`DriveError::NonFinite`].
    pub fn tick(&mut self, dt: f64) -> Result<(), DriveError> {
        let from = self.state.state;
        let target = self.machine.effective_target(&self.state);

        let before = self.state.clone();
        if let Err(err) = self.model.step(&mut self.state, &self.config, dt, target) {
            self.state = before;
            return Err(err);
        }
        self.conditions.apply(&mut self.state);
        self.state.update_power(&self.config);

        let raised = self.alarms.evaluate(&self.state, &self.config);
        self.machine
            .advance(&mut self.state, &self.config, self.alarms.is_active());
        self.sync_alarm_flags();

        for record in raised {
            tracing::warn!(code = %record.code, description = %record.description, "alarm raised");
            self.events.publish(DriveEvent::AlarmRaised(record));
        }
        self.note_transition(from);
        Ok(())
    }

    /// READY → ACCELERATING toward the setpoint.
    pub fn start(&mut self) -> Result<(), DriveError> {
        let from = self.state.state;
        self.machine.start(&mut self.state).inspect_err(|err| {
            tracing::warn!(state = %from, %err, "start rejected");
        })?;
        tracing::info!(setpoint = self.state.frequency_setpoint, "drive started");
        self.note_transition(from);
        Ok(())
    }

    /// Ramp down to standstill.
    pub fn stop(&mut self) -> Result<(), DriveError> {
        let from = self.state.state;
        self.machine.stop(&mut self.state).inspect_err(|err| {
            tracing::warn!(state = %from, %err, "stop rejected");
        })?;
        tracing::info!("drive stopping");
        self.note_transition(from);
        Ok(())
    }

    /// Set the frequency setpoint (Hz).
    pub fn set_frequency(&mut self, hz: f64) -> Result<(), DriveError> {
        let from = self.state.state;
        self.machine
            .set_frequency(&mut self.state, &self.config, hz)
            .inspect_err(|err| {
                tracing::warn!(%err, "frequency rejected");
            })?;
        tracing::info!(setpoint = hz, "frequency setpoint changed");
        self.note_transition(from);
        Ok(())
    }

    /// Set the direction of rotation.
    pub fn set_direction(&mut self, direction: Direction) -> DirectionChange {
        let from = self.state.state;
        let change = self.machine.set_direction(&mut self.state, direction);
        if change != DirectionChange::Unchanged {
            tracing::info!(direction = direction.as_str(), ?change, "direction request");
        }
        self.note_transition(from);
        change
    }

    /// Clear every active alarm; ALARM → READY.
    ///
    /// Returns whether anything was active. Conditions that still hold
    /// re-raise on the next tick when their rule is armed.
    pub fn reset_alarms(&mut self) -> bool {
        let from = self.state.state;
        let cleared = self.alarms.reset();
        self.machine.clear_trip(&mut self.state);
        self.sync_alarm_flags();
        if cleared {
            tracing::info!("alarms reset");
            self.events.publish(DriveEvent::AlarmsCleared);
        }
        self.note_transition(from);
        cleared
    }

    /// Force `code` active and trip the drive at once.
    ///
    /// Returns the record when the code was not already active.
    pub fn inject_fault(&mut self, code: AlarmCode, description: Option<&str>) -> Option<AlarmRecord> {
        let from = self.state.state;
        let raised = self.alarms.inject(code, description);
        self.machine.trip(&mut self.state, &self.config);
        self.sync_alarm_flags();
        if let Some(record) = &raised {
            tracing::warn!(code = %record.code, description = %record.description, "fault injected");
            self.events.publish(DriveEvent::AlarmRaised(record.clone()));
        }
        self.note_transition(from);
        raised
    }

    /// Force the output current (A) from the next tick on.
    pub fn simulate_current(&mut self, amps: f64) -> Result<(), DriveError> {
        self.conditions.current = Some(finite("current", amps)?);
        Ok(())
    }

    /// Force the output voltage (V) from the next tick on.
    pub fn simulate_voltage(&mut self, volts: f64) -> Result<(), DriveError> {
        self.conditions.voltage = Some(finite("voltage", volts)?);
        Ok(())
    }

    /// Force the temperature (°C) from the next tick on.
    pub fn simulate_temperature(&mut self, celsius: f64) -> Result<(), DriveError> {
        self.conditions.temperature = Some(finite("temperature", celsius)?);
        Ok(())
    }

    /// Simulate loss (or return) of supply.
    pub fn simulate_supply_fault(&mut self, lost: bool) {
        self.conditions.supply_fault = lost;
    }

    /// Force the condition that trips `code`.
    ///
    /// Codes without a physical rule are injected directly.
    pub fn simulate_fault_condition(&mut self, code: AlarmCode) -> Result<(), DriveError> {
        let DriveConfig {
            max_current,
            max_voltage,
            min_voltage,
            max_temperature,
            ..
        } = self.config;
        match code {
            AlarmCode::Overcurrent => self.simulate_current(max_current * 1.5),
            AlarmCode::Overvoltage => self.simulate_voltage(max_voltage * 1.2),
            AlarmCode::Undervoltage => self.simulate_voltage(min_voltage * 0.8),
            AlarmCode::Overtemperature => self.simulate_temperature(max_temperature + 10.0),
            AlarmCode::InputFault => {
                self.simulate_supply_fault(true);
                Ok(())
            }
            AlarmCode::OutputFault
            | AlarmCode::SoftwareFault
            | AlarmCode::HardwareFault
            | AlarmCode::Communication => {
                self.inject_fault(code, None);
                Ok(())
            }
        }
    }

    /// Stop forcing any value.
    pub fn clear_simulated_conditions(&mut self) {
        self.conditions = SimulatedConditions::default();
        self.state.supply_ok = true;
    }

    /// Reinitialise to READY, keeping running hours and start count.
    ///
    /// Drops the fault history and every forced condition.
    pub fn reset(&mut self) {
        let from = self.state.state;
        let had_alarms = self.alarms.is_active();
        self.state.reset(&self.config);
        self.alarms.clear_history();
        self.machine = StateMachine::new();
        self.conditions = SimulatedConditions::default();
        tracing::info!("drive reinitialised");
        if had_alarms {
            self.events.publish(DriveEvent::AlarmsCleared);
        }
        self.note_transition(from);
    }

    /// Copy of the state plus active alarms.
    pub fn snapshot(&self) -> DriveSnapshot {
        let s = &self.state;
        DriveSnapshot {
            output_frequency: s.output_frequency,
            output_voltage: s.output_voltage,
            output_current: s.output_current,
            motor_speed: s.motor_speed,
            torque: s.torque,
            output_power: s.output_power,
            temperature: s.temperature,
            running_hours: s.running_hours,
            start_count: s.start_count,
            state: s.state,
            direction: s.direction,
            running: s.running,
            alarm_active: s.alarm_active,
            alarm_description: s.alarm_description.clone(),
            target_frequency: s.target_frequency,
            target_voltage: s.target_voltage,
            target_speed: s.target_speed,
            frequency_setpoint: s.frequency_setpoint,
            supply_ok: s.supply_ok,
            pending_reversal: self.machine.pending_reversal(),
            active_alarms: self.alarms.active().cloned().collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn config_mut(&mut self) -> &mut DriveConfig {
        &mut self.config
    }

    fn sync_alarm_flags(&mut self) {
        self.state.alarm_active = self.alarms.is_active();
        self.state.alarm_description = self.alarms.description();
    }

    fn note_transition(&mut self, from: OperatingState) {
        let to = self.state.state;
        if from != to {
            tracing::info!(%from, %to, "state changed");
            self.events.publish(DriveEvent::StateChanged { from, to });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
