//! Drive state and the per-tick physics model.
//!
//! [`DriveModel::step`] advances a [`DriveState`] by one time step. It is a
//! pure function of the state, the [`DriveConfig`], the elapsed time and the
//! effective target frequency, plus the model's own noise generator. It never
//! touches the operating state; transitions belong to
//! [`StateMachine`](crate::machine::StateMachine).
//!
//! # Model
//!
//! - Frequency follows a linear ramp (accel rate up, decel rate down) and never
//!   overshoots the target.
//! - Voltage follows the V/f law, held at nominal at standstill, with a small
//!   ripple while the output is active.
//! - Current grows with the square of the frequency ratio (fan-type load) with
//!   random jitter.
//! - Temperature is a first-order lag toward ambient plus a rise proportional
//!   to output power.
//!
//! # Example
//!
//! ```rust
//! use vfd_sim::{DriveConfig, DriveModel, DriveState};
//!
//! let config = DriveConfig::default().noiseless();
//! let mut model = DriveModel::new(Some(1));
//! let mut state = DriveState::new(&config);
//!
//! model.step(&mut state, &config, 0.1, 50.0).unwrap();
//! assert!((state.output_frequency - 1.0).abs() < 1e-9); // 10 Hz/s for 0.1 s
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DriveConfig;
use crate::error::DriveError;

/// Empty aggregate alarm description.
pub const NO_ALARM: &str = "Nessun allarme";

// ============================================================================
// Direction
// ============================================================================

/// Direction of rotation.
///
/// Defaults to [`Forward`](Self::Forward).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Forward rotation (+1).
    #[default]
    Forward,
    /// Reverse rotation (−1).
    Reverse,
}

impl Direction {
    /// Signed unit value: `+1` forward, `-1` reverse.
    #[inline]
    pub const fn as_sign(&self) -> i8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// English lowercase name.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }

    /// Protocol label used in `OK:` responses.
    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            Direction::Forward => "avanti",
            Direction::Reverse => "indietro",
        }
    }

    /// Protocol label used in the status block.
    #[inline]
    pub const fn status_label(&self) -> &'static str {
        match self {
            Direction::Forward => "AVANTI",
            Direction::Reverse => "INDIETRO",
        }
    }

    /// The other direction.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Parse direction from text input.
    ///
    /// Accepts signed units (`"1"`, `"+1"`, `"-1"`), protocol labels
    /// (`"avanti"`, `"indietro"`) and English names with abbreviations
    /// (`"forward"`, `"fwd"`, `"reverse"`, `"rev"`). Input is trimmed and
    /// case-insensitive.
    ///
    /// ```
    /// use vfd_sim::Direction;
    ///
    /// assert_eq!(Direction::from_text("+1"), Some(Direction::Forward));
    /// assert_eq!(Direction::from_text("-1"), Some(Direction::Reverse));
    /// assert_eq!(Direction::from_text("Indietro"), Some(Direction::Reverse));
    /// assert_eq!(Direction::from_text("0"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "1" | "+1" => return Some(Direction::Forward),
            "-1" => return Some(Direction::Reverse),
            _ => {}
        }
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "avanti" | "forward" | "fwd" => Some(Direction::Forward),
            "indietro" | "reverse" | "rev" => Some(Direction::Reverse),
            _ => None,
        }
    }
}

// ============================================================================
// Operating State
// ============================================================================

/// Operating state of the drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OperatingState {
    /// Powered down.
    Off,
    /// Idle, able to start.
    #[default]
    Ready,
    /// Ramping up toward the target.
    Accelerating,
    /// At target frequency.
    Running,
    /// Ramping down toward the target.
    Decelerating,
    /// Tripped; only an alarm reset leaves this state.
    Alarm,
}

impl OperatingState {
    /// Upper-case English name (data log, tracing).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Ready => "READY",
            Self::Accelerating => "ACCELERATING",
            Self::Running => "RUNNING",
            Self::Decelerating => "DECELERATING",
            Self::Alarm => "ALARM",
        }
    }

    /// Protocol label used in the status block.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Off => "SPENTO",
            Self::Ready => "PRONTO",
            Self::Accelerating => "ACCELERAZIONE",
            Self::Running => "IN_MARCIA",
            Self::Decelerating => "DECELERAZIONE",
            Self::Alarm => "ALLARME",
        }
    }

    /// ACCELERATING, RUNNING or DECELERATING.
    #[inline]
    pub const fn is_turning(&self) -> bool {
        matches!(
            self,
            Self::Accelerating | Self::Running | Self::Decelerating
        )
    }

    /// States in which running hours accumulate.
    #[inline]
    pub const fn accumulates_hours(&self) -> bool {
        matches!(self, Self::Accelerating | Self::Running)
    }
}

impl core::fmt::Display for OperatingState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Drive State
// ============================================================================

/// Live electrical, mechanical and thermal state of the drive.
///
/// Only the engine owns a `DriveState`; everyone else sees
/// [`DriveSnapshot`](crate::engine::DriveSnapshot) copies.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveState {
    /// Output frequency (Hz).
    pub output_frequency: f64,
    /// Output voltage (V).
    pub output_voltage: f64,
    /// Output current (A).
    pub output_current: f64,
    /// Motor shaft speed (rpm, magnitude).
    pub motor_speed: f64,
    /// Shaft torque (Nm).
    pub torque: f64,
    /// Output power (W).
    pub output_power: f64,
    /// Drive temperature (°C).
    pub temperature: f64,
    /// Lifetime running hours.
    pub running_hours: f64,
    /// Lifetime start count.
    pub start_count: u32,
    /// Operating state.
    pub state: OperatingState,
    /// Direction of rotation.
    pub direction: Direction,
    /// Set while a start is in effect (cleared at standstill or on trip).
    pub running: bool,
    /// Aggregate alarm flag.
    pub alarm_active: bool,
    /// Aggregate alarm description.
    pub alarm_description: String,
    /// Frequency the ramp currently moves toward (Hz).
    pub target_frequency: f64,
    /// Voltage at the target frequency (V).
    pub target_voltage: f64,
    /// Synchronous speed at the target frequency (rpm).
    pub target_speed: f64,
    /// User frequency setpoint, remembered while stopped (Hz).
    pub frequency_setpoint: f64,
    /// Supply healthy (cleared by a simulated input fault).
    pub supply_ok: bool,
}

impl DriveState {
    /// Initial state: READY at standstill, nominal voltage, ambient temperature.
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            output_frequency: 0.0,
            output_voltage: config.nominal_voltage,
            output_current: 0.0,
            motor_speed: 0.0,
            torque: 0.0,
            output_power: 0.0,
            temperature: config
                .ambient_temperature
                .clamp(config.min_temperature, config.temperature_ceiling),
            running_hours: 0.0,
            start_count: 0,
            state: OperatingState::Ready,
            direction: Direction::Forward,
            running: false,
            alarm_active: false,
            alarm_description: NO_ALARM.to_string(),
            target_frequency: 0.0,
            target_voltage: 0.0,
            target_speed: 0.0,
            frequency_setpoint: 0.0,
            supply_ok: true,
        }
    }

    /// Reinitialise in place, keeping the lifetime counters.
    pub fn reset(&mut self, config: &DriveConfig) {
        let running_hours = self.running_hours;
        let start_count = self.start_count;
        *self = Self::new(config);
        self.running_hours = running_hours;
        self.start_count = start_count;
    }

    /// Output stage at standstill: no current, speed, torque or power,
    /// voltage held at nominal.
    pub fn standstill(&mut self, config: &DriveConfig) {
        self.output_frequency = 0.0;
        self.output_voltage = config.nominal_voltage;
        self.output_current = 0.0;
        self.motor_speed = 0.0;
        self.torque = 0.0;
        self.output_power = 0.0;
    }

    /// Recompute output power (W) and shaft torque (Nm) from the present
    /// voltage, current and speed. Zero while the output frequency is zero.
    pub fn update_power(&mut self, config: &DriveConfig) {
        if self.output_frequency > 0.0 {
            self.output_power = self.output_voltage * self.output_current * config.power_factor;
            self.torque = self.output_power * 9.549 / self.motor_speed.max(0.001);
        } else {
            self.output_power = 0.0;
            self.torque = 0.0;
        }
    }
}

// ============================================================================
// Physics Model
// ============================================================================

/// Per-tick physics step with its own noise source.
pub struct DriveModel {
    rng: StdRng,
}

impl DriveModel {
    /// Create a model; `None` seeds the noise generator from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Uniform noise factor in `[1 - amplitude, 1 + amplitude]`.
    fn noise(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            1.0
        } else {
            1.0 + amplitude * (2.0 * self.rng.gen::<f64>() - 1.0)
        }
    }

    /// Advance `state` by `dt` seconds toward `target` Hz.
    ///
    /// `dt` is clamped to `[0, max_dt]`; a zero step leaves the state
    /// untouched. On error the state may hold the offending value and the
    /// caller is expected to trip the drive.
    pub fn step(
        &mut self,
        state: &mut DriveState,
        config: &DriveConfig,
        dt: f64,
        target: f64,
    ) -> Result<(), DriveError> {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, config.max_dt)
        } else {
            0.0
        };
        if dt == 0.0 {
            return Ok(());
        }

        let f_nom = config.nominal_frequency;
        let target = target.clamp(0.0, f_nom);

        // Ramp
        let f = state.output_frequency;
        let f = if f < target {
            (f + config.accel_rate * dt).min(target)
        } else if f > target {
            (f - config.decel_rate * dt).max(target)
        } else {
            f
        };
        let f = f.clamp(0.0, f_nom);
        state.output_frequency = f;

        // V/f
        state.output_voltage = if f > 0.0 {
            config.expected_voltage(f) * self.noise(config.voltage_ripple)
        } else {
            config.nominal_voltage
        };

        // Load, current, speed
        let ratio = f / f_nom;
        let load_factor = ratio * ratio;
        state.output_current =
            config.nominal_current * load_factor * self.noise(config.current_jitter);
        state.motor_speed = config.synchronous_speed(f) * (1.0 - config.slip * load_factor);

        state.update_power(config);

        // Thermal lag
        let equilibrium =
            config.ambient_temperature + config.thermal_rise * state.output_power / config.rated_power();
        let alpha = 1.0 - (-dt / config.thermal_time_constant).exp();
        state.temperature = (state.temperature + (equilibrium - state.temperature) * alpha)
            .clamp(config.min_temperature, config.temperature_ceiling);

        if state.state.accumulates_hours() {
            state.running_hours += dt / 3600.0;
        }

        state.target_frequency = target;
        state.target_voltage = if target > 0.0 {
            config.expected_voltage(target)
        } else {
            0.0
        };
        state.target_speed = config.synchronous_speed(target);

        check_finite(state)
    }
}

impl core::fmt::Debug for DriveModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriveModel").finish_non_exhaustive()
    }
}

/// Every computed quantity must be a finite number.
pub(crate) fn check_finite(state: &DriveState) -> Result<(), DriveError> {
    let quantities = [
        ("output_frequency", state.output_frequency),
        ("output_voltage", state.output_voltage),
        ("output_current", state.output_current),
        ("motor_speed", state.motor_speed),
        ("torque", state.torque),
        ("output_power", state.output_power),
        ("temperature", state.temperature),
        ("running_hours", state.running_hours),
    ];
    match quantities.iter().find(|(_, v)| !v.is_finite()) {
        Some((quantity, _)) => Err(DriveError::NonFinite { quantity }),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> DriveConfig {
        DriveConfig::default().noiseless()
    }

    #[test]
    fn initial_state() {
        let config = quiet();
        let state = DriveState::new(&config);
        assert_eq!(state.state, OperatingState::Ready);
        assert_eq!(state.output_frequency, 0.0);
        assert_eq!(state.output_voltage, 400.0);
        assert_eq!(state.temperature, 25.0);
        assert_eq!(state.alarm_description, NO_ALARM);
        assert!(state.supply_ok);
    }

    #[test]
    fn zero_dt_is_noop() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        let before = state.clone();
        model.step(&mut state, &config, 0.0, 50.0).unwrap();
        assert_eq!(state, before);
        model.step(&mut state, &config, -1.0, 50.0).unwrap();
        assert_eq!(state, before);
        model.step(&mut state, &config, f64::NAN, 50.0).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn dt_is_clamped() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        model.step(&mut state, &config, 5.0, 50.0).unwrap();
        // max_dt 0.2 s × 10 Hz/s
        assert!((state.output_frequency - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ramp_never_overshoots() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        for _ in 0..100 {
            model.step(&mut state, &config, 0.1, 12.34).unwrap();
            assert!(state.output_frequency <= 12.34 + 1e-12);
        }
        assert!((state.output_frequency - 12.34).abs() < 1e-9);

        for _ in 0..100 {
            model.step(&mut state, &config, 0.1, 0.0).unwrap();
            assert!(state.output_frequency >= 0.0);
        }
        assert_eq!(state.output_frequency, 0.0);
    }

    #[test]
    fn target_clamped_to_nominal() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        for _ in 0..200 {
            model.step(&mut state, &config, 0.1, 1000.0).unwrap();
        }
        assert_eq!(state.output_frequency, 50.0);
        assert_eq!(state.target_frequency, 50.0);
    }

    #[test]
    fn vf_law_and_load() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        state.output_frequency = 25.0;
        model.step(&mut state, &config, 0.1, 25.0).unwrap();

        assert!((state.output_voltage - 200.0).abs() < 1e-9);
        assert!((state.output_current - 2.5).abs() < 1e-9);
        let expected_speed = 750.0 * (1.0 - 0.02 * 0.25);
        assert!((state.motor_speed - expected_speed).abs() < 1e-9);
        let expected_power = 200.0 * 2.5 * 0.95;
        assert!((state.output_power - expected_power).abs() < 1e-9);
        assert!((state.torque - expected_power * 9.549 / expected_speed).abs() < 1e-9);
    }

    #[test]
    fn voltage_held_at_standstill() {
        let config = DriveConfig::default();
        let mut model = DriveModel::new(Some(3));
        let mut state = DriveState::new(&config);
        for _ in 0..10 {
            model.step(&mut state, &config, 0.1, 0.0).unwrap();
            assert_eq!(state.output_voltage, 400.0);
            assert_eq!(state.output_current, 0.0);
            assert_eq!(state.torque, 0.0);
        }
    }

    #[test]
    fn noise_stays_in_band() {
        let config = DriveConfig::default().with_seed(42);
        let mut model = DriveModel::new(config.seed);
        let mut state = DriveState::new(&config);
        state.output_frequency = 50.0;
        for _ in 0..500 {
            model.step(&mut state, &config, 0.1, 50.0).unwrap();
            assert!(state.output_current >= 10.0 * 0.9 - 1e-9);
            assert!(state.output_current <= 10.0 * 1.1 + 1e-9);
            assert!(state.output_voltage >= 400.0 * 0.995 - 1e-9);
            assert!(state.output_voltage <= 400.0 * 1.005 + 1e-9);
        }
    }

    #[test]
    fn same_seed_same_trajectory() {
        let config = DriveConfig::default();
        let run = |seed| {
            let mut model = DriveModel::new(Some(seed));
            let mut state = DriveState::new(&config);
            for _ in 0..50 {
                model.step(&mut state, &config, 0.1, 40.0).unwrap();
            }
            state
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn temperature_rises_under_load_and_stays_in_band() {
        let config = quiet().with_thermal(40.0, 1.0);
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        state.output_frequency = 50.0;
        for _ in 0..200 {
            model.step(&mut state, &config, 0.1, 50.0).unwrap();
        }
        // Equilibrium is ambient + rise at rated power
        assert!((state.temperature - 65.0).abs() < 0.5);

        for _ in 0..400 {
            model.step(&mut state, &config, 0.1, 0.0).unwrap();
            assert!(state.temperature >= config.min_temperature);
        }
        assert!((state.temperature - 25.0).abs() < 0.5);
    }

    #[test]
    fn running_hours_only_while_turning() {
        let config = quiet();
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        model.step(&mut state, &config, 0.1, 0.0).unwrap();
        assert_eq!(state.running_hours, 0.0);

        state.state = OperatingState::Running;
        model.step(&mut state, &config, 0.2, 0.0).unwrap();
        assert!((state.running_hours - 0.2 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_parameters_reported() {
        let mut config = quiet();
        config.thermal_rise = f64::NAN;
        let mut model = DriveModel::new(Some(0));
        let mut state = DriveState::new(&config);
        state.output_frequency = 10.0;
        let err = model.step(&mut state, &config, 0.1, 10.0).unwrap_err();
        assert_eq!(err, DriveError::NonFinite { quantity: "temperature" });
    }

    #[test]
    fn reset_keeps_lifetime_counters() {
        let config = quiet();
        let mut state = DriveState::new(&config);
        state.running_hours = 12.5;
        state.start_count = 7;
        state.output_frequency = 30.0;
        state.state = OperatingState::Alarm;
        state.reset(&config);
        assert_eq!(state.running_hours, 12.5);
        assert_eq!(state.start_count, 7);
        assert_eq!(state.output_frequency, 0.0);
        assert_eq!(state.state, OperatingState::Ready);
    }

    #[test]
    fn direction_text() {
        assert_eq!(Direction::from_text("1"), Some(Direction::Forward));
        assert_eq!(Direction::from_text(" fwd "), Some(Direction::Forward));
        assert_eq!(Direction::from_text("REV"), Some(Direction::Reverse));
        assert_eq!(Direction::from_text("2"), None);
        assert_eq!(Direction::from_text("--1"), None);
        assert_eq!(Direction::Reverse.as_sign(), -1);
        assert_eq!(Direction::Forward.opposite(), Direction::Reverse);
        assert_eq!(Direction::Reverse.status_label(), "INDIETRO");
    }

    #[test]
    fn state_labels() {
        assert_eq!(OperatingState::Ready.label(), "PRONTO");
        assert_eq!(OperatingState::Running.label(), "IN_MARCIA");
        assert_eq!(OperatingState::Alarm.as_str(), "ALARM");
        assert!(OperatingState::Decelerating.is_turning());
        assert!(!OperatingState::Alarm.is_turning());
        assert!(!OperatingState::Decelerating.accumulates_hours());
    }
}
