//! Periodic tick driver and data-log thread.
//!
//! [`UpdateScheduler::start`] spawns two named threads:
//!
//! - `vfd-tick` ticks the engine every `tick_interval_ms`, with `dt` measured
//!   from the wall clock. A tick that fails or panics is logged and turned into
//!   a [`SoftwareFault`](AlarmCode::SoftwareFault) alarm; the loop keeps going.
//! - `vfd-datalog` appends one CSV row every `log_interval_ms` when a log path
//!   is configured.
//!
//! Both threads sleep with `park_timeout`, so [`UpdateScheduler::shutdown`]
//! (also run on drop) wakes them at once and joins them.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vfd_sim::config::SchedulerConfig;
//! use vfd_sim::services::{SharedDrive, UpdateScheduler};
//! use vfd_sim::{DriveConfig, DriveEngine};
//!
//! let drive = Arc::new(SharedDrive::new(DriveEngine::new(DriveConfig::default()).unwrap()));
//! let mut scheduler = UpdateScheduler::start(Arc::clone(&drive), &SchedulerConfig::default()).unwrap();
//! // ... serve commands ...
//! scheduler.shutdown();
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::alarm::AlarmCode;
use crate::config::SchedulerConfig;
use crate::services::datalog::DataLogger;
use crate::services::shared::SharedDrive;

/// Handle to the running tick and data-log threads.
pub struct UpdateScheduler {
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    threads: Vec<JoinHandle<()>>,
}

impl UpdateScheduler {
    /// Spawn the tick thread and, if configured, the data-log thread.
    ///
    /// A data log that cannot be opened is reported and skipped; only a
    /// failure to spawn a thread is returned.
    pub fn start(drive: Arc<SharedDrive>, config: &SchedulerConfig) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));
        let mut scheduler = Self {
            stop: Arc::clone(&stop),
            ticks: Arc::clone(&ticks),
            threads: Vec::with_capacity(2),
        };

        let period = Duration::from_millis(u64::from(config.tick_interval_ms.max(1)));
        let tick_thread = {
            let drive = Arc::clone(&drive);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("vfd-tick".into())
                .spawn(move || tick_loop(&drive, &stop, &ticks, period))?
        };
        scheduler.threads.push(tick_thread);

        if let Some(path) = &config.log_path {
            match DataLogger::open(path) {
                Ok(logger) => {
                    let period = Duration::from_millis(u64::from(config.log_interval_ms.max(1)));
                    let stop = Arc::clone(&stop);
                    let handle = thread::Builder::new()
                        .name("vfd-datalog".into())
                        .spawn(move || log_loop(&drive, &stop, logger, period))?;
                    scheduler.threads.push(handle);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "data log disabled");
                }
            }
        }

        tracing::info!(
            tick_ms = config.tick_interval_ms,
            log_ms = config.log_interval_ms,
            "scheduler started"
        );
        Ok(scheduler)
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Whether the threads are still running.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire) && !self.threads.is_empty()
    }

    /// Stop both threads and wait for them. Idempotent.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            handle.thread().unpark();
            let name = handle.thread().name().unwrap_or("scheduler").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "scheduler thread panicked");
            }
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("ticks", &self.ticks())
            .field("threads", &self.threads.len())
            .finish()
    }
}

// ============================================================================
// Thread Bodies
// ============================================================================

fn tick_loop(drive: &SharedDrive, stop: &AtomicBool, ticks: &AtomicU64, period: Duration) {
    let mut last = Instant::now();
    while !stop.load(Ordering::Acquire) {
        let started = Instant::now();
        let dt = started.duration_since(last).as_secs_f64();
        last = started;

        run_tick(drive, dt);
        ticks.fetch_add(1, Ordering::Relaxed);

        park_until(started + period, stop);
    }
    tracing::debug!("tick thread exiting");
}

/// One guarded tick. Errors and panics become a software-fault alarm.
pub(crate) fn run_tick(drive: &SharedDrive, dt: f64) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        drive.with_engine(|engine| engine.tick(dt))
    }));

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(error = %failure, "tick failed");
    let description = format!("Errore software: {failure}");
    drive.with_engine(|engine| {
        engine.inject_fault(AlarmCode::SoftwareFault, Some(&description));
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn log_loop(drive: &SharedDrive, stop: &AtomicBool, mut logger: DataLogger, period: Duration) {
    let mut failures: u64 = 0;
    while !stop.load(Ordering::Acquire) {
        let started = Instant::now();
        let snapshot = drive.snapshot();
        if let Err(err) = logger.append(&snapshot, Local::now()) {
            failures += 1;
            // Avoid flooding: first failure, then every 60th
            if failures == 1 || failures % 60 == 0 {
                tracing::error!(path = %logger.path().display(), %err, failures, "data log write failed");
            }
        }
        park_until(started + period, stop);
    }
    tracing::debug!(rows = logger.rows(), "data log thread exiting");
}

/// Park until `deadline` or until `stop` is raised, tolerating spurious wake-ups.
fn park_until(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        match deadline.checked_duration_since(now) {
            Some(remaining) if !remaining.is_zero() => thread::park_timeout(remaining),
            _ => return,
        }
    }
}
