//! Shared drive state for every front-end.
//!
//! `SharedDrive` provides thread-safe access to a single [`DriveEngine`] that
//! is shared between the tick scheduler, the data logger and any number of
//! protocol readers (serial-style transports, TCP connections).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vfd_sim::services::{DriveControl, SharedDrive};
//! use vfd_sim::{DriveConfig, DriveEngine};
//!
//! let engine = DriveEngine::new(DriveConfig::default()).unwrap();
//! let drive = Arc::new(SharedDrive::new(engine));
//!
//! // Protocol handlers go through the DriveControl trait
//! drive.set_frequency(25.0).unwrap();
//! drive.start().unwrap();
//!
//! // The scheduler ticks through with_engine()
//! drive.with_engine(|engine| engine.tick(0.1)).unwrap();
//!
//! // Observers read snapshots
//! let snapshot = drive.snapshot();
//! assert!(snapshot.output_frequency > 0.0);
//! ```

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::alarm::{AlarmCode, AlarmRecord};
use crate::drive::Direction;
use crate::engine::{DriveEngine, DriveSnapshot};
use crate::error::DriveError;
use crate::events::DriveEvent;
use crate::machine::DirectionChange;

// ============================================================================
// Drive Control Trait
// ============================================================================

/// Operations every drive consumer may request.
///
/// The line protocol is generic over this trait, so it can be pointed at a
/// shared engine or at a test double.
pub trait DriveControl: Send + Sync {
    /// READY → ACCELERATING.
    fn start(&self) -> Result<(), DriveError>;

    /// Ramp down to standstill.
    fn stop(&self) -> Result<(), DriveError>;

    /// Set the frequency setpoint (Hz).
    fn set_frequency(&self, hz: f64) -> Result<(), DriveError>;

    /// Set the direction of rotation.
    fn set_direction(&self, direction: Direction) -> DirectionChange;

    /// Clear active alarms. Returns whether anything was active.
    fn reset_alarms(&self) -> bool;

    /// Force an alarm and trip the drive.
    fn inject_fault(&self, code: AlarmCode, description: Option<&str>) -> Option<AlarmRecord>;

    /// Current state copy.
    fn snapshot(&self) -> DriveSnapshot;

    /// Nominal (maximum) frequency, for range messages.
    fn nominal_frequency(&self) -> f64;
}

// ============================================================================
// Shared Drive
// ============================================================================

/// Single lock around the engine.
///
/// # Thread Safety
///
/// - Uses `Mutex` (not `RwLock`): the 100 ms tick writes constantly and every
///   command writes too, so readers gain little.
/// - The tick runs physics, alarms and transitions under one acquisition.
/// - A poisoned lock is recovered rather than propagated; the engine's own
///   invariants are restored by the next tick.
pub struct SharedDrive {
    engine: Mutex<DriveEngine>,

    /// Time base for uptime reporting
    start_time: Instant,
}

impl SharedDrive {
    /// Wrap an engine.
    pub fn new(engine: DriveEngine) -> Self {
        Self {
            engine: Mutex::new(engine),
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since the shared state was created.
    #[inline]
    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn lock(&self) -> MutexGuard<'_, DriveEngine> {
        self.engine.lock().unwrap_or_else(|poisoned| {
            tracing::error!("drive lock poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Access the engine under the lock.
    ///
    /// The closure pattern keeps the lock from being held across await points.
    pub fn with_engine<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DriveEngine) -> R,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Register an event subscriber.
    pub fn subscribe(&self) -> Receiver<DriveEvent> {
        self.lock().subscribe()
    }

    /// Current state copy (brief lock).
    pub fn snapshot(&self) -> DriveSnapshot {
        self.lock().snapshot()
    }
}

impl core::fmt::Debug for SharedDrive {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedDrive")
            .field("uptime_ms", &self.uptime_ms())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DriveControl Implementations
// ============================================================================

impl DriveControl for SharedDrive {
    fn start(&self) -> Result<(), DriveError> {
        self.with_engine(|engine| engine.start())
    }

    fn stop(&self) -> Result<(), DriveError> {
        self.with_engine(|engine| engine.stop())
    }

    fn set_frequency(&self, hz: f64) -> Result<(), DriveError> {
        self.with_engine(|engine| engine.set_frequency(hz))
    }

    fn set_direction(&self, direction: Direction) -> DirectionChange {
        self.with_engine(|engine| engine.set_direction(direction))
    }

    fn reset_alarms(&self) -> bool {
        self.with_engine(|engine| engine.reset_alarms())
    }

    fn inject_fault(&self, code: AlarmCode, description: Option<&str>) -> Option<AlarmRecord> {
        self.with_engine(|engine| engine.inject_fault(code, description))
    }

    fn snapshot(&self) -> DriveSnapshot {
        SharedDrive::snapshot(self)
    }

    fn nominal_frequency(&self) -> f64 {
        self.with_engine(|engine| engine.config().nominal_frequency)
    }
}

impl DriveControl for Arc<SharedDrive> {
    fn start(&self) -> Result<(), DriveError> {
        (**self).start()
    }

    fn stop(&self) -> Result<(), DriveError> {
        (**self).stop()
    }

    fn set_frequency(&self, hz: f64) -> Result<(), DriveError> {
        (**self).set_frequency(hz)
    }

    fn set_direction(&self, direction: Direction) -> DirectionChange {
        (**self).set_direction(direction)
    }

    fn reset_alarms(&self) -> bool {
        (**self).reset_alarms()
    }

    fn inject_fault(&self, code: AlarmCode, description: Option<&str>) -> Option<AlarmRecord> {
        (**self).inject_fault(code, description)
    }

    fn snapshot(&self) -> DriveSnapshot {
        SharedDrive::snapshot(self)
    }

    fn nominal_frequency(&self) -> f64 {
        (**self).nominal_frequency()
    }
}
