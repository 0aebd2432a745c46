//! Drive simulator binary.
//!
//! Serves the line protocol over TCP (default) or stdin/stdout, ticks the
//! drive in the background, and optionally appends a CSV data log.
//!
//! # Usage
//!
//! ```sh
//! vfd-sim --listen 127.0.0.1:7070
//! vfd-sim --stdio --model CDE750 --log-file drive.csv
//! vfd-sim --config simulator.toml --verbose
//! ```
//!
//! Then, for instance with `nc 127.0.0.1 7070`:
//!
//! ```text
//! FREQ 50
//! OK: Frequenza impostata a 50.0 Hz
//! RUN
//! OK
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use vfd_sim::hal::StreamTransport;
use vfd_sim::services::{line_reader, SharedDrive, TcpLineServer, UpdateScheduler};
use vfd_sim::{logging, DriveConfig, DriveEngine, DriveEvent, SimulatorConfig};

/// How long a stdin read waits before re-checking for shutdown.
const STDIO_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "vfd-sim", version, about = "Simulated variable-frequency drive")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Serve the protocol on stdin/stdout instead of TCP
    #[arg(long)]
    stdio: bool,

    /// Drive model preset (CDE400, CDE550, CDE750, CDE1100S)
    #[arg(short, long)]
    model: Option<String>,

    /// Seed for the measurement noise
    #[arg(long)]
    seed: Option<u64>,

    /// Append a CSV data log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Physics tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u32>,

    /// Debug-level logging for this crate
    #[arg(short, long)]
    verbose: bool,

    /// JSON log lines
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<SimulatorConfig> {
    let mut config = match &args.config {
        Some(path) => SimulatorConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimulatorConfig::default(),
    };

    if let Some(model) = &args.model {
        let Some(drive) = DriveConfig::for_model(model) else {
            bail!("unknown drive model `{model}` (expected CDE400, CDE550, CDE750 or CDE1100S)");
        };
        config.drive = drive;
        config.device = config.device.with_model(model);
    }
    if let Some(seed) = args.seed {
        config.drive = config.drive.with_seed(seed);
    }
    if let Some(listen) = &args.listen {
        config.server = config.server.with_listen(listen);
    }
    if args.stdio {
        config.server = config.server.with_stdio(true);
    }
    if let Some(path) = &args.log_file {
        config.scheduler = config.scheduler.with_log_path(path);
    }
    if let Some(ms) = args.tick_ms {
        config.scheduler = config.scheduler.with_tick_interval_ms(ms);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Forward drive events to the log until the drive goes away.
fn spawn_event_logger(drive: &SharedDrive) -> Result<()> {
    let events = drive.subscribe();
    std::thread::Builder::new()
        .name("vfd-events".into())
        .spawn(move || {
            for event in events {
                match event {
                    DriveEvent::StateChanged { from, to } => {
                        tracing::info!(%from, %to, "state changed")
                    }
                    DriveEvent::AlarmRaised(record) => {
                        tracing::warn!(code = %record.code, description = %record.description, "alarm")
                    }
                    DriveEvent::AlarmsCleared => tracing::info!("alarms cleared"),
                }
            }
        })
        .context("spawning event logger")?;
    Ok(())
}

async fn serve_stdio(drive: Arc<SharedDrive>) -> Result<()> {
    let transport = StreamTransport::stdio(STDIO_POLL).context("opening stdin/stdout")?;
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let mut reader =
        tokio::task::spawn_blocking(move || line_reader::run(transport, drive, &flag));

    tracing::info!("serving protocol on stdin/stdout");
    tokio::select! {
        summary = &mut reader => {
            let summary = summary.context("reader task failed")?;
            tracing::info!(exit = ?summary.exit, lines = summary.lines, "stdin closed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            tracing::info!("interrupted");
            stop.store(true, Ordering::Release);
            reader.await.context("reader task failed")?;
        }
    }
    Ok(())
}

async fn serve_tcp(drive: Arc<SharedDrive>, listen: &str) -> Result<()> {
    let server = TcpLineServer::bind(listen, drive)
        .await
        .with_context(|| format!("binding {listen}"))?;
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("interrupted");
    server.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.json);

    let config = load_config(&args)?;
    tracing::info!(
        device = %config.device.name,
        model = %config.device.model,
        nominal_hz = config.drive.nominal_frequency,
        "starting simulator"
    );

    let engine = DriveEngine::new(config.drive.clone()).context("building drive engine")?;
    let drive = Arc::new(SharedDrive::new(engine));
    spawn_event_logger(&drive)?;

    let mut scheduler = UpdateScheduler::start(Arc::clone(&drive), &config.scheduler)
        .context("starting scheduler")?;

    let served = if config.server.stdio {
        serve_stdio(Arc::clone(&drive)).await
    } else {
        serve_tcp(Arc::clone(&drive), config.server.listen.as_str()).await
    };

    scheduler.shutdown();
    tracing::info!(ticks = scheduler.ticks(), uptime_ms = drive.uptime_ms(), "simulator stopped");
    served
}
