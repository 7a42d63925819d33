//! fdport: answer a call and bridge it to raw PCM files
//!
//! Samples read from the input file are sent to the caller and the caller's
//! audio is written to the output file, both as headerless 16-bit
//! little-endian PCM at the bridge clock rate. The call itself comes from the
//! in-process simulated call control, which plays a tone.

mod config;

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fdport_infra_common::logging::{parse_log_level, setup_logging, LoggingConfig};
use fdport_media_core::{BridgeClock, ConferenceBridge, FdPortFlags, FdPortOptions, StreamHandle};
use fdport_session_core::{
    CallSessionManager, SessionEvent, SimulatedCallControl, SimulatedCallOptions,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{AppConfig, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args).context("Failed to load configuration")?;

    let level = parse_log_level(&config.log_level)?;
    let mut logging = LoggingConfig::new(level, "fdport").with_version(env!("CARGO_PKG_VERSION"));
    if config.json_logs {
        logging = logging.with_json();
    }
    setup_logging(logging)?;

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let bridge = Arc::new(ConferenceBridge::new(config.bridge.clone())?);
    info!(
        "Bridge up: {} Hz, {} samples per frame",
        config.bridge.clock_rate,
        bridge.samples_per_frame()
    );

    let input = open_input(&config.input);
    let output = open_output(&config.output);
    let flags = if config.nonblocking {
        FdPortFlags::nonblocking()
    } else {
        FdPortFlags::default()
    };
    let fd_port = bridge
        .create_fd_port_owned(FdPortOptions::new(input, output).with_flags(flags))
        .context("Failed to create the fd port")?;
    println!("fd port created: {}", fd_port.id());
    let fd_port_id = fd_port.id();

    let mut clock = BridgeClock::start(bridge.clone())?;

    let control = SimulatedCallControl::new(bridge.clone());
    let manager = Arc::new(
        CallSessionManager::new(fd_port, control.clone()).with_policy(config.hangup_policy),
    );
    let events = tokio::spawn(log_events(manager.subscribe()));

    let options = SimulatedCallOptions {
        tone_hz: config.tone_hz,
        ..Default::default()
    };
    let call = control.place_call(manager.clone(), options).await?;
    if !call.decision().is_accept() {
        warn!("Call {} was not answered: {:?}", call.call_id(), call.decision());
    }

    match config.duration() {
        Some(duration) => {
            info!("Running for {:?}, Ctrl+C to stop early", duration);
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                result = tokio::signal::ctrl_c() => result?,
            }
        }
        None => {
            info!("Press Ctrl+C to quit");
            tokio::signal::ctrl_c().await?;
        }
    }

    let received = call.hangup().await;
    info!("Caller received {} samples", received.len());

    clock.stop();
    if let Ok(status) = bridge.port_status(fd_port_id) {
        info!(
            "fd port: {} frames read, {} written, {} dropped",
            status.io.frames_read, status.io.frames_written, status.io.frames_dropped
        );
        for warning in &status.io.warnings {
            warn!("fd port: {}", warning);
        }
    }
    info!("{} ticks, {} overruns", clock.ticks(), clock.overruns());

    drop(manager);
    events.abort();
    Ok(())
}

/// Open the input file; a failure leaves the port without input
fn open_input(path: &Path) -> StreamHandle {
    match File::open(path) {
        Ok(file) => StreamHandle::File(file),
        Err(e) => {
            warn!("Cannot open {} for reading: {}", path.display(), e);
            StreamHandle::None
        }
    }
}

/// Create the output file; a failure leaves the port without output
fn open_output(path: &Path) -> StreamHandle {
    match File::create(path) {
        Ok(file) => StreamHandle::File(file),
        Err(e) => {
            warn!("Cannot open {} for writing: {}", path.display(), e);
            StreamHandle::None
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!("Session event: {:?}", event),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} session events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
