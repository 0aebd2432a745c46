//! Alarm rules and fault-record lifecycle.
//!
//! [`AlarmManager`] keeps at most one [`AlarmRecord`] per [`AlarmCode`]. A rule
//! that fires while its code is already active does nothing; a rule that fires
//! after a reset reactivates the existing record (bumping its occurrence
//! count) instead of appending a new one.
//!
//! # Rules
//!
//! | Code | Condition |
//! |------|-----------|
//! | Overcurrent | current > max current × 1.1, only while running |
//! | Overvoltage | voltage > max voltage × 1.1 |
//! | Undervoltage | standstill: voltage < min voltage × 0.9; at ≥ 5 Hz: voltage < expected × 0.85 |
//! | Overtemperature | temperature > max temperature |
//! | InputFault | supply flag cleared |
//!
//! The remaining codes are only raised through [`AlarmManager::inject`].

use chrono::{DateTime, Utc};

use crate::config::DriveConfig;
use crate::drive::{DriveState, NO_ALARM};

// ============================================================================
// Alarm Codes
// ============================================================================

/// Fault category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlarmCode {
    /// Output current above limit.
    Overcurrent = 1,
    /// Output voltage above limit.
    Overvoltage = 2,
    /// Output voltage below limit.
    Undervoltage = 3,
    /// Drive temperature above limit.
    Overtemperature = 4,
    /// Output stage fault.
    OutputFault = 5,
    /// Supply / external input fault.
    InputFault = 6,
    /// Internal software fault (tick failure).
    SoftwareFault = 7,
    /// Hardware fault.
    HardwareFault = 8,
    /// Communication fault.
    Communication = 9,
}

impl AlarmCode {
    /// All codes in numeric order.
    pub const ALL: [AlarmCode; 9] = [
        AlarmCode::Overcurrent,
        AlarmCode::Overvoltage,
        AlarmCode::Undervoltage,
        AlarmCode::Overtemperature,
        AlarmCode::OutputFault,
        AlarmCode::InputFault,
        AlarmCode::SoftwareFault,
        AlarmCode::HardwareFault,
        AlarmCode::Communication,
    ];

    /// Numeric code (1..=9).
    #[inline]
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Look up a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Stable snake_case name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Overcurrent => "overcurrent",
            Self::Overvoltage => "overvoltage",
            Self::Undervoltage => "undervoltage",
            Self::Overtemperature => "overtemperature",
            Self::OutputFault => "output_fault",
            Self::InputFault => "input_fault",
            Self::SoftwareFault => "software_fault",
            Self::HardwareFault => "hardware_fault",
            Self::Communication => "communication",
        }
    }

    /// Look up a name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Description used when none is supplied.
    pub const fn default_description(&self) -> &'static str {
        match self {
            Self::Overcurrent => "Sovracorrente",
            Self::Overvoltage => "Sovratensione",
            Self::Undervoltage => "Sottotensione",
            Self::Overtemperature => "Sovratemperatura",
            Self::OutputFault => "Guasto uscita",
            Self::InputFault => "Guasto ingresso",
            Self::SoftwareFault => "Guasto software",
            Self::HardwareFault => "Guasto hardware",
            Self::Communication => "Errore di comunicazione",
        }
    }
}

impl core::fmt::Display for AlarmCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Alarm Records
// ============================================================================

/// One fault record; the history holds at most one per code.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlarmRecord {
    /// Fault category.
    pub code: AlarmCode,
    /// Description of the latest occurrence.
    pub description: String,
    /// Time of the latest activation.
    pub timestamp: DateTime<Utc>,
    /// Whether the alarm is latched.
    pub active: bool,
    /// Number of times this code has been raised.
    pub occurrences: u32,
}

// ============================================================================
// Alarm Manager
// ============================================================================

/// Evaluates the alarm rules and owns the fault history.
#[derive(Clone, Debug, Default)]
pub struct AlarmManager {
    records: Vec<AlarmRecord>,
}

impl AlarmManager {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every rule against `state`, raising codes whose rule fires.
    ///
    /// Returns the records that became active on this call.
    pub fn evaluate(&mut self, state: &DriveState, config: &DriveConfig) -> Vec<AlarmRecord> {
        let mut raised = Vec::new();
        for (code, description) in check_rules(state, config) {
            if let Some(record) = self.raise(code, description) {
                raised.push(record);
            }
        }
        raised
    }

    /// Activate `code` unless it is already active.
    ///
    /// An inactive record of the same code is reactivated in place. Returns a
    /// copy of the record when it became active.
    pub fn raise(&mut self, code: AlarmCode, description: String) -> Option<AlarmRecord> {
        let now = Utc::now();
        match self.records.iter_mut().find(|r| r.code == code) {
            Some(record) if record.active => None,
            Some(record) => {
                record.active = true;
                record.description = description;
                record.timestamp = now;
                record.occurrences += 1;
                Some(record.clone())
            }
            None => {
                let record = AlarmRecord {
                    code,
                    description,
                    timestamp: now,
                    active: true,
                    occurrences: 1,
                };
                self.records.push(record.clone());
                Some(record)
            }
        }
    }

    /// Force `code` active, with the code's default description if none given.
    pub fn inject(&mut self, code: AlarmCode, description: Option<&str>) -> Option<AlarmRecord> {
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| code.default_description().to_string());
        self.raise(code, description)
    }

    /// Deactivate every record. Returns whether anything was active.
    pub fn reset(&mut self) -> bool {
        let mut cleared = false;
        for record in self.records.iter_mut().filter(|r| r.active) {
            record.active = false;
            cleared = true;
        }
        cleared
    }

    /// Drop the whole history.
    pub fn clear_history(&mut self) {
        self.records.clear();
    }

    /// Whether any record is active.
    pub fn is_active(&self) -> bool {
        self.records.iter().any(|r| r.active)
    }

    /// Whether `code` is active.
    pub fn is_code_active(&self, code: AlarmCode) -> bool {
        self.records.iter().any(|r| r.code == code && r.active)
    }

    /// Active records, oldest code first.
    pub fn active(&self) -> impl Iterator<Item = &AlarmRecord> {
        self.records.iter().filter(|r| r.active)
    }

    /// Every record ever raised, active or not.
    pub fn history(&self) -> &[AlarmRecord] {
        &self.records
    }

    /// Active descriptions joined with `"; "`, or `"Nessun allarme"`.
    pub fn description(&self) -> String {
        let active: Vec<&str> = self.active().map(|r| r.description.as_str()).collect();
        if active.is_empty() {
            NO_ALARM.to_string()
        } else {
            active.join("; ")
        }
    }
}

/// Codes whose rule fires for `state`, with their descriptions.
fn check_rules(state: &DriveState, config: &DriveConfig) -> Vec<(AlarmCode, String)> {
    let mut fired = Vec::new();

    let current_limit = config.max_current * config.overcurrent_tolerance;
    if state.running && state.output_current > current_limit {
        fired.push((
            AlarmCode::Overcurrent,
            format!(
                "Sovracorrente: {:.1}A > {:.1}A",
                state.output_current, config.max_current
            ),
        ));
    }

    let voltage_limit = config.max_voltage * config.overvoltage_tolerance;
    if state.output_voltage > voltage_limit {
        fired.push((
            AlarmCode::Overvoltage,
            format!(
                "Sovratensione: {:.1}V > {:.1}V",
                state.output_voltage, config.max_voltage
            ),
        ));
    }

    let f = state.output_frequency;
    let undervoltage_floor = if f <= 0.0 {
        Some(config.min_voltage * 0.9)
    } else if f >= config.undervoltage_min_frequency {
        Some(config.expected_voltage(f) * config.undervoltage_tolerance)
    } else {
        None
    };
    if let Some(floor) = undervoltage_floor {
        if state.output_voltage < floor {
            fired.push((
                AlarmCode::Undervoltage,
                format!(
                    "Sottotensione: {:.1}V < {:.1}V",
                    state.output_voltage, floor
                ),
            ));
        }
    }

    if state.temperature > config.max_temperature {
        fired.push((
            AlarmCode::Overtemperature,
            format!(
                "Sovratemperatura: {:.1}C > {:.1}C",
                state.temperature, config.max_temperature
            ),
        ));
    }

    if !state.supply_ok {
        fired.push((
            AlarmCode::InputFault,
            "Guasto ingresso: alimentazione assente".to_string(),
        ));
    }

    fired
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AlarmManager, DriveState, DriveConfig) {
        let config = DriveConfig::default().noiseless();
        let state = DriveState::new(&config);
        (AlarmManager::new(), state, config)
    }

    #[test]
    fn initial_state_raises_nothing() {
        let (mut alarms, state, config) = setup();
        assert!(alarms.evaluate(&state, &config).is_empty());
        assert!(!alarms.is_active());
        assert_eq!(alarms.description(), "Nessun allarme");
    }

    #[test]
    fn overcurrent_only_while_running() {
        let (mut alarms, mut state, config) = setup();
        state.output_current = 20.0;
        assert!(alarms.evaluate(&state, &config).is_empty());

        state.running = true;
        let raised = alarms.evaluate(&state, &config);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].code, AlarmCode::Overcurrent);
        assert_eq!(raised[0].description, "Sovracorrente: 20.0A > 15.0A");
    }

    #[test]
    fn overcurrent_threshold_has_tolerance() {
        let (mut alarms, mut state, config) = setup();
        state.running = true;
        state.output_current = 16.4; // below 16.5
        assert!(alarms.evaluate(&state, &config).is_empty());
        state.output_current = 16.6;
        assert_eq!(alarms.evaluate(&state, &config).len(), 1);
    }

    #[test]
    fn overvoltage() {
        let (mut alarms, mut state, config) = setup();
        state.output_voltage = 500.0;
        let raised = alarms.evaluate(&state, &config);
        assert_eq!(raised[0].code, AlarmCode::Overvoltage);
    }

    #[test]
    fn undervoltage_at_standstill() {
        let (mut alarms, mut state, config) = setup();
        state.output_voltage = 320.0; // above 315
        assert!(alarms.evaluate(&state, &config).is_empty());
        state.output_voltage = 300.0;
        assert_eq!(
            alarms.evaluate(&state, &config)[0].code,
            AlarmCode::Undervoltage
        );
    }

    #[test]
    fn undervoltage_follows_vf_when_turning() {
        let (mut alarms, mut state, config) = setup();
        // 20 Hz expects 160 V; floor is 136 V
        state.output_frequency = 20.0;
        state.output_voltage = 160.0;
        assert!(alarms.evaluate(&state, &config).is_empty());
        state.output_voltage = 130.0;
        assert_eq!(
            alarms.evaluate(&state, &config)[0].code,
            AlarmCode::Undervoltage
        );
    }

    #[test]
    fn undervoltage_not_checked_at_low_frequency() {
        let (mut alarms, mut state, config) = setup();
        state.output_frequency = 2.0;
        state.output_voltage = 1.0;
        assert!(alarms.evaluate(&state, &config).is_empty());
    }

    #[test]
    fn overtemperature_and_input_fault() {
        let (mut alarms, mut state, config) = setup();
        state.temperature = 85.0;
        state.supply_ok = false;
        let codes: Vec<_> = alarms
            .evaluate(&state, &config)
            .into_iter()
            .map(|r| r.code)
            .collect();
        assert_eq!(
            codes,
            vec![AlarmCode::Overtemperature, AlarmCode::InputFault]
        );
        assert!(alarms.description().contains("; "));
    }

    #[test]
    fn active_code_not_raised_twice() {
        let (mut alarms, mut state, config) = setup();
        state.temperature = 85.0;
        assert_eq!(alarms.evaluate(&state, &config).len(), 1);
        assert!(alarms.evaluate(&state, &config).is_empty());
        assert_eq!(alarms.history().len(), 1);
    }

    #[test]
    fn reset_then_reraise_reactivates_record() {
        let (mut alarms, mut state, config) = setup();
        state.temperature = 85.0;
        alarms.evaluate(&state, &config);
        assert!(alarms.reset());
        assert!(!alarms.is_active());
        assert!(!alarms.reset());

        let raised = alarms.evaluate(&state, &config);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].occurrences, 2);
        assert_eq!(alarms.history().len(), 1);
    }

    #[test]
    fn inject_uses_default_description() {
        let mut alarms = AlarmManager::new();
        let record = alarms.inject(AlarmCode::HardwareFault, None).unwrap();
        assert_eq!(record.description, "Guasto hardware");
        assert!(alarms.is_code_active(AlarmCode::HardwareFault));

        assert!(alarms
            .inject(AlarmCode::HardwareFault, Some("again"))
            .is_none());

        alarms.inject(AlarmCode::Communication, Some("Timeout Modbus"));
        assert_eq!(alarms.description(), "Guasto hardware; Timeout Modbus");
        assert_eq!(alarms.active().count(), 2);
    }

    #[test]
    fn code_lookup() {
        assert_eq!(AlarmCode::Overcurrent.code(), 1);
        assert_eq!(AlarmCode::Communication.code(), 9);
        assert_eq!(AlarmCode::from_code(7), Some(AlarmCode::SoftwareFault));
        assert_eq!(AlarmCode::from_code(0), None);
        assert_eq!(
            AlarmCode::from_name("Output_Fault"),
            Some(AlarmCode::OutputFault)
        );
        assert_eq!(AlarmCode::from_name("nope"), None);
    }

    #[test]
    fn clear_history() {
        let mut alarms = AlarmManager::new();
        alarms.inject(AlarmCode::OutputFault, None);
        alarms.clear_history();
        assert!(alarms.history().is_empty());
        assert!(!alarms.is_active());
    }
}
