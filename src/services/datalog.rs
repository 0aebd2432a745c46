//! Append-only CSV data log.
//!
//! One row per call to [`DataLogger::append`], columns:
//!
//! ```text
//! timestamp,frequency_hz,voltage_v,current_a,speed_rpm,temperature_c,state,alarm
//! 2024-05-01 12:00:00.123,50.00,400.12,10.03,1470.0,41.2,RUNNING,0
//! ```
//!
//! The header is written only when the file is created (or empty), so a log
//! can span several simulator runs. Logging is best-effort: the scheduler
//! reports failures and carries on.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::engine::DriveSnapshot;
use crate::error::DataLogError;

/// Column names, in order.
pub const HEADER: [&str; 8] = [
    "timestamp",
    "frequency_hz",
    "voltage_v",
    "current_a",
    "speed_rpm",
    "temperature_c",
    "state",
    "alarm",
];

/// Timestamp format (local time, millisecond precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// CSV writer bound to one file.
pub struct DataLogger {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: u64,
}

impl DataLogger {
    /// Open `path` for appending, writing the header if the file is new.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataLogError> {
        let path = path.as_ref();
        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        tracing::debug!(path = %path.display(), new = is_new, "data log opened");
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written since opening.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Append one row for `snapshot` stamped with `at`, and flush.
    pub fn append(
        &mut self,
        snapshot: &DriveSnapshot,
        at: DateTime<Local>,
    ) -> Result<(), DataLogError> {
        let record = format_row(snapshot, at);
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl core::fmt::Debug for DataLogger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataLogger")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Render one row.
pub fn format_row(snapshot: &DriveSnapshot, at: DateTime<Local>) -> [String; 8] {
    [
        at.format(TIMESTAMP_FORMAT).to_string(),
        format!("{:.2}", snapshot.output_frequency),
        format!("{:.2}", snapshot.output_voltage),
        format!("{:.2}", snapshot.output_current),
        format!("{:.1}", snapshot.motor_speed),
        format!("{:.1}", snapshot.temperature),
        snapshot.state.as_str().to_string(),
        if snapshot.alarm_active { "1" } else { "0" }.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DriveConfig, DriveEngine};
    use chrono::TimeZone;

    fn snapshot() -> DriveSnapshot {
        DriveEngine::new(DriveConfig::default().noiseless())
            .unwrap()
            .snapshot()
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn row_format() {
        let row = format_row(&snapshot(), fixed_time());
        assert_eq!(row[0], "2024-05-01 12:00:00.000");
        assert_eq!(row[1], "0.00");
        assert_eq!(row[2], "400.00");
        assert_eq!(row[5], "25.0");
        assert_eq!(row[6], "READY");
        assert_eq!(row[7], "0");
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.csv");

        {
            let mut log = DataLogger::open(&path).unwrap();
            log.append(&snapshot(), fixed_time()).unwrap();
            assert_eq!(log.rows(), 1);
        }
        {
            let mut log = DataLogger::open(&path).unwrap();
            log.append(&snapshot(), fixed_time()).unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,frequency_hz,voltage_v,current_a,speed_rpm,temperature_c,state,alarm"
        );
        assert!(lines[1].starts_with("2024-05-01 12:00:00.000,0.00,400.00"));
        assert!(lines[2].ends_with(",READY,0"));
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("drive.csv");
        assert!(matches!(DataLogger::open(&path), Err(DataLogError::Io(_))));
    }
}
