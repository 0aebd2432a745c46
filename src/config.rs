//! Simulator configuration.
//!
//! All sections use plain builder methods on top of `Default`, and derive
//! serde (with `#[serde(default)]`, so partial files work) when the `serde`
//! feature is on. The `cli` feature adds TOML loading.
//!
//! # Example
//!
//! ```rust
//! use vfd_sim::config::{DriveConfig, SimulatorConfig, SchedulerConfig};
//!
//! // Use defaults (a 400 V / 50 Hz / 10 A drive)
//! let config = SimulatorConfig::default();
//! assert_eq!(config.drive.nominal_frequency, 50.0);
//!
//! // Or customize
//! let config = SimulatorConfig::default()
//!     .with_drive(DriveConfig::default().with_ramps(5.0, 20.0))
//!     .with_scheduler(SchedulerConfig::default().with_tick_interval_ms(50));
//! assert!(config.drive.validate().is_ok());
//! ```

use std::path::PathBuf;

use heapless::String as HString;

use crate::error::ConfigError;

/// Maximum length for short config strings (device names, addresses)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating on a char boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete simulator configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulatorConfig {
    /// Drive ratings, limits and model parameters
    pub drive: DriveConfig,
    /// Tick and data-log cadence
    pub scheduler: SchedulerConfig,
    /// Line protocol server
    pub server: ServerConfig,
    /// Device identification
    pub device: DeviceConfig,
}

impl SimulatorConfig {
    /// Set drive configuration
    pub fn with_drive(mut self, drive: DriveConfig) -> Self {
        self.drive = drive;
        self
    }

    /// Set scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set server configuration
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Validate every section that has constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.drive.validate()?;
        self.scheduler.validate()
    }

    /// Parse a TOML document. Missing keys fall back to defaults.
    #[cfg(feature = "cli")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    #[cfg(feature = "cli")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

// ============================================================================
// Drive Config
// ============================================================================

/// Drive ratings, protection limits and physics parameters.
///
/// Immutable once handed to an engine.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriveConfig {
    /// Rated output frequency (Hz); also the upper frequency bound
    pub nominal_frequency: f64,
    /// Rated output voltage (V) at nominal frequency
    pub nominal_voltage: f64,
    /// Rated motor current (A) at nominal frequency and full load
    pub nominal_current: f64,
    /// Synchronous speed (rpm) at nominal frequency
    pub nominal_speed: f64,
    /// Overtemperature threshold (°C)
    pub max_temperature: f64,
    /// Minimum acceptable voltage at standstill (V)
    pub min_voltage: f64,
    /// Maximum output voltage (V)
    pub max_voltage: f64,
    /// Maximum output current (A)
    pub max_current: f64,
    /// Acceleration ramp (Hz/s)
    pub accel_rate: f64,
    /// Deceleration ramp (Hz/s)
    pub decel_rate: f64,
    /// Motor power factor
    pub power_factor: f64,
    /// Slip at full load (fraction)
    pub slip: f64,
    /// Current noise amplitude (fraction, ± around the model value)
    pub current_jitter: f64,
    /// Voltage ripple amplitude (fraction) while the output is active
    pub voltage_ripple: f64,
    /// Ambient temperature (°C); idle equilibrium
    pub ambient_temperature: f64,
    /// Temperature rise above ambient at rated power (°C)
    pub thermal_rise: f64,
    /// First-order thermal time constant (s)
    pub thermal_time_constant: f64,
    /// Lower clamp of the temperature band (°C)
    pub min_temperature: f64,
    /// Upper clamp of the temperature band (°C)
    pub temperature_ceiling: f64,
    /// Largest time step accepted by a tick (s)
    pub max_dt: f64,
    /// Frequency tolerance for "target reached" / "stopped" (Hz)
    pub frequency_epsilon: f64,
    /// Overcurrent trips above `max_current × tolerance`
    pub overcurrent_tolerance: f64,
    /// Overvoltage trips above `max_voltage × tolerance`
    pub overvoltage_tolerance: f64,
    /// Undervoltage trips below `expected × tolerance`
    pub undervoltage_tolerance: f64,
    /// Undervoltage is only checked at or above this frequency (Hz), or at standstill
    pub undervoltage_min_frequency: f64,
    /// RNG seed for reproducible noise (`None` = entropy)
    pub seed: Option<u64>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            nominal_frequency: 50.0,
            nominal_voltage: 400.0,
            nominal_current: 10.0,
            nominal_speed: 1500.0,
            max_temperature: 80.0,
            min_voltage: 350.0,
            max_voltage: 450.0,
            max_current: 15.0,
            accel_rate: 10.0,
            decel_rate: 10.0,
            power_factor: 0.95,
            slip: 0.02,
            current_jitter: 0.1,
            voltage_ripple: 0.005,
            ambient_temperature: 25.0,
            thermal_rise: 40.0,
            thermal_time_constant: 60.0,
            min_temperature: 20.0,
            temperature_ceiling: 90.0,
            max_dt: 0.2,
            frequency_epsilon: 0.1,
            overcurrent_tolerance: 1.1,
            overvoltage_tolerance: 1.1,
            undervoltage_tolerance: 0.85,
            undervoltage_min_frequency: 5.0,
            seed: None,
        }
    }
}

impl DriveConfig {
    /// Ratings of a known drive model (CDE400, CDE550, CDE750, CDE1100S).
    ///
    /// Model names are matched case-insensitively. The rated frequency becomes
    /// the nominal frequency; nominal current is two thirds of the model's
    /// maximum current.
    pub fn for_model(model: &str) -> Option<Self> {
        let (max_frequency, max_current) = match model.trim().to_ascii_uppercase().as_str() {
            "CDE400" => (400.0, 8.0),
            "CDE550" => (50.0, 10.0),
            "CDE750" => (750.0, 15.0),
            "CDE1100S" => (1100.0, 22.0),
            _ => return None,
        };
        let base = Self::default();
        Some(Self {
            nominal_frequency: max_frequency,
            nominal_current: max_current / 1.5,
            max_current,
            accel_rate: base.accel_rate * max_frequency / base.nominal_frequency,
            decel_rate: base.decel_rate * max_frequency / base.nominal_frequency,
            ..base
        })
    }

    /// Set nominal frequency (Hz)
    pub fn with_nominal_frequency(mut self, hz: f64) -> Self {
        self.nominal_frequency = hz;
        self
    }

    /// Set nominal voltage (V)
    pub fn with_nominal_voltage(mut self, volts: f64) -> Self {
        self.nominal_voltage = volts;
        self
    }

    /// Set nominal current (A)
    pub fn with_nominal_current(mut self, amps: f64) -> Self {
        self.nominal_current = amps;
        self
    }

    /// Set acceleration and deceleration ramps (Hz/s)
    pub fn with_ramps(mut self, accel: f64, decel: f64) -> Self {
        self.accel_rate = accel;
        self.decel_rate = decel;
        self
    }

    /// Set the protection limits
    pub fn with_limits(mut self, max_current: f64, max_voltage: f64, max_temperature: f64) -> Self {
        self.max_current = max_current;
        self.max_voltage = max_voltage;
        self.max_temperature = max_temperature;
        self
    }

    /// Set the noise amplitudes (fractions)
    pub fn with_noise(mut self, current_jitter: f64, voltage_ripple: f64) -> Self {
        self.current_jitter = current_jitter;
        self.voltage_ripple = voltage_ripple;
        self
    }

    /// Disable all noise for fully deterministic runs
    pub fn noiseless(self) -> Self {
        self.with_noise(0.0, 0.0)
    }

    /// Seed the noise generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the thermal model (rise at rated power in °C, time constant in s)
    pub fn with_thermal(mut self, rise: f64, time_constant: f64) -> Self {
        self.thermal_rise = rise;
        self.thermal_time_constant = time_constant;
        self
    }

    /// Output power at rated voltage and current (W)
    pub fn rated_power(&self) -> f64 {
        self.nominal_voltage * self.nominal_current * self.power_factor
    }

    /// Constant V/f law; voltage is held at nominal at standstill
    pub fn expected_voltage(&self, frequency: f64) -> f64 {
        if frequency > 0.0 {
            self.nominal_voltage * frequency / self.nominal_frequency
        } else {
            self.nominal_voltage
        }
    }

    /// Synchronous speed (rpm) at the given frequency
    pub fn synchronous_speed(&self, frequency: f64) -> f64 {
        self.nominal_speed * frequency / self.nominal_frequency
    }

    /// Check that the model can run with these values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("nominal_frequency", self.nominal_frequency),
            ("nominal_voltage", self.nominal_voltage),
            ("nominal_current", self.nominal_current),
            ("nominal_speed", self.nominal_speed),
            ("max_current", self.max_current),
            ("max_voltage", self.max_voltage),
            ("accel_rate", self.accel_rate),
            ("decel_rate", self.decel_rate),
            ("thermal_time_constant", self.thermal_time_constant),
            ("max_dt", self.max_dt),
            ("frequency_epsilon", self.frequency_epsilon),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be a positive finite number",
                });
            }
        }

        let finite = [
            ("max_temperature", self.max_temperature),
            ("min_voltage", self.min_voltage),
            ("ambient_temperature", self.ambient_temperature),
            ("thermal_rise", self.thermal_rise),
            ("min_temperature", self.min_temperature),
            ("temperature_ceiling", self.temperature_ceiling),
            ("overcurrent_tolerance", self.overcurrent_tolerance),
            ("overvoltage_tolerance", self.overvoltage_tolerance),
            ("undervoltage_tolerance", self.undervoltage_tolerance),
            ("undervoltage_min_frequency", self.undervoltage_min_frequency),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be finite",
                });
            }
        }

        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "power_factor",
                reason: "must be in (0, 1]",
            });
        }
        if !(0.0..1.0).contains(&self.slip) {
            return Err(ConfigError::Invalid {
                field: "slip",
                reason: "must be in [0, 1)",
            });
        }
        if !(0.0..=0.5).contains(&self.current_jitter) {
            return Err(ConfigError::Invalid {
                field: "current_jitter",
                reason: "must be in [0, 0.5]",
            });
        }
        if !(0.0..=0.1).contains(&self.voltage_ripple) {
            return Err(ConfigError::Invalid {
                field: "voltage_ripple",
                reason: "must be in [0, 0.1]",
            });
        }
        if self.min_voltage >= self.max_voltage {
            return Err(ConfigError::Invalid {
                field: "min_voltage",
                reason: "must be below max_voltage",
            });
        }
        if self.min_temperature >= self.temperature_ceiling {
            return Err(ConfigError::Invalid {
                field: "min_temperature",
                reason: "must be below temperature_ceiling",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Scheduler Config
// ============================================================================

/// Tick cadence and CSV data log
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Physics tick period in milliseconds
    pub tick_interval_ms: u32,
    /// Data-log period in milliseconds
    pub log_interval_ms: u32,
    /// CSV file to append snapshots to (`None` disables the data log)
    pub log_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            log_interval_ms: 1000,
            log_path: None,
        }
    }
}

impl SchedulerConfig {
    /// Set the tick period
    pub fn with_tick_interval_ms(mut self, ms: u32) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Set the data-log period
    pub fn with_log_interval_ms(mut self, ms: u32) -> Self {
        self.log_interval_ms = ms;
        self
    }

    /// Enable the CSV data log
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Periods must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be non-zero",
            });
        }
        if self.log_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "log_interval_ms",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// Line protocol server configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServerConfig {
    /// TCP listen address (`host:port`)
    pub listen: ShortString,
    /// Serve the protocol on stdin/stdout instead of TCP
    pub stdio: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: short_string("127.0.0.1:7070"),
            stdio: false,
        }
    }
}

impl ServerConfig {
    /// Set the listen address
    pub fn with_listen(mut self, addr: &str) -> Self {
        self.listen = short_string(addr);
        self
    }

    /// Serve on stdin/stdout
    pub fn with_stdio(mut self, stdio: bool) -> Self {
        self.stdio = stdio;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Human-readable device name
    pub name: ShortString,
    /// Drive model name (informational)
    pub model: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("vfd-sim"),
            model: short_string("CDE550"),
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the model name
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = short_string(model);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.drive.nominal_frequency, 50.0);
        assert_eq!(config.scheduler.tick_interval_ms, 100);
        assert_eq!(config.scheduler.log_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rated_power_and_vf_law() {
        let drive = DriveConfig::default();
        assert!((drive.rated_power() - 3800.0).abs() < 1e-9);
        assert!((drive.expected_voltage(25.0) - 200.0).abs() < 1e-9);
        // Held at nominal at standstill
        assert_eq!(drive.expected_voltage(0.0), 400.0);
        assert!((drive.synchronous_speed(50.0) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_zero_nominal_frequency() {
        let drive = DriveConfig::default().with_nominal_frequency(0.0);
        assert!(matches!(
            drive.validate(),
            Err(ConfigError::Invalid {
                field: "nominal_frequency",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_nan() {
        let drive = DriveConfig::default().with_nominal_voltage(f64::NAN);
        assert!(drive.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_voltage_limits() {
        let mut drive = DriveConfig::default();
        drive.min_voltage = 500.0;
        assert!(matches!(
            drive.validate(),
            Err(ConfigError::Invalid {
                field: "min_voltage",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_bad_power_factor() {
        let mut drive = DriveConfig::default();
        drive.power_factor = 1.5;
        assert!(drive.validate().is_err());
    }

    #[test]
    fn scheduler_rejects_zero_period() {
        let scheduler = SchedulerConfig::default().with_tick_interval_ms(0);
        assert!(scheduler.validate().is_err());
    }

    #[test]
    fn model_presets() {
        let cde400 = DriveConfig::for_model("cde400").unwrap();
        assert_eq!(cde400.nominal_frequency, 400.0);
        assert_eq!(cde400.max_current, 8.0);
        assert!(cde400.validate().is_ok());

        let cde550 = DriveConfig::for_model("CDE550").unwrap();
        assert_eq!(cde550.nominal_frequency, 50.0);
        assert_eq!(cde550.accel_rate, 10.0);

        assert!(DriveConfig::for_model("XYZ").is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = SimulatorConfig::default()
            .with_drive(DriveConfig::default().with_ramps(5.0, 20.0).noiseless())
            .with_scheduler(
                SchedulerConfig::default()
                    .with_tick_interval_ms(50)
                    .with_log_path("/tmp/drive.csv"),
            )
            .with_server(ServerConfig::default().with_listen("0.0.0.0:9000"))
            .with_device(DeviceConfig::default().with_name("Bench drive"));

        assert_eq!(config.drive.accel_rate, 5.0);
        assert_eq!(config.drive.decel_rate, 20.0);
        assert_eq!(config.drive.current_jitter, 0.0);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
        assert!(config.scheduler.log_path.is_some());
        assert_eq!(config.server.listen.as_str(), "0.0.0.0:9000");
        assert_eq!(config.device.name.as_str(), "Bench drive");
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_utf8_boundary() {
        let input = "é".repeat(40); // 80 bytes
        let s = short_string(&input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn toml_partial_document() {
        let text = r#"
            [drive]
            accel_rate = 25.0
            seed = 7

            [scheduler]
            tick_interval_ms = 50
        "#;
        let config = SimulatorConfig::from_toml_str(text).unwrap();
        assert_eq!(config.drive.accel_rate, 25.0);
        assert_eq!(config.drive.decel_rate, 10.0);
        assert_eq!(config.drive.seed, Some(7));
        assert_eq!(config.scheduler.tick_interval_ms, 50);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn toml_invalid_values_rejected() {
        let text = "[drive]\nnominal_frequency = -1.0\n";
        assert!(SimulatorConfig::from_toml_str(text).is_err());
    }
}
