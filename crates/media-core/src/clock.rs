//! Bridge clock
//!
//! Drives [`ConferenceBridge::tick`] from a dedicated thread once per frame
//! duration, standing in for a sound device clock. Deadlines are absolute
//! (start + n * ptime) so timing errors do not accumulate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::bridge::ConferenceBridge;
use crate::error::Result;

/// Name of the clock thread
pub const CLOCK_THREAD_NAME: &str = "conf-clock";

#[derive(Debug, Default)]
struct ClockShared {
    running: AtomicBool,
    ticks: AtomicU64,
    overruns: AtomicU64,
}

/// Periodic tick source for a bridge
#[derive(Debug)]
pub struct BridgeClock {
    shared: Arc<ClockShared>,
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl BridgeClock {
    /// Start ticking `bridge` every frame duration
    pub fn start(bridge: Arc<ConferenceBridge>) -> Result<Self> {
        let period = bridge.config().frame_duration();
        let shared = Arc::new(ClockShared::default());
        shared.running.store(true, Ordering::Release);

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(CLOCK_THREAD_NAME.to_string())
            .spawn(move || run(bridge, thread_shared, period))?;

        debug!("Bridge clock started, period {:?}", period);
        Ok(Self {
            shared,
            handle: Some(handle),
            period,
        })
    }

    /// Stop the clock and wait for the thread to exit
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("Bridge clock thread panicked");
            }
            debug!(
                "Bridge clock stopped after {} ticks ({} overruns)",
                self.ticks(),
                self.overruns()
            );
        }
    }

    /// Whether the clock thread is running
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.running.load(Ordering::Acquire)
    }

    /// Ticks driven so far
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Times the clock fell more than a frame behind and skipped ahead
    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Acquire)
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for BridgeClock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(bridge: Arc<ConferenceBridge>, shared: Arc<ClockShared>, period: Duration) {
    let start = Instant::now();
    let mut index: u32 = 0;

    while shared.running.load(Ordering::Acquire) {
        let deadline = start + period * index;
        let now = Instant::now();
        if now < deadline {
            thread::park_timeout(deadline - now);
            // Woken early by stop() or spuriously
            continue;
        }

        let report = bridge.tick();
        shared.ticks.fetch_add(1, Ordering::AcqRel);
        trace!("Clock tick {} took {:?}", report.tick, report.elapsed);
        index = index.wrapping_add(1);

        let behind = Instant::now().saturating_duration_since(start + period * index);
        if behind > period {
            let skipped = (behind.as_nanos() / period.as_nanos()) as u32;
            index = index.wrapping_add(skipped);
            shared.overruns.fetch_add(1, Ordering::AcqRel);
            warn!("Bridge clock overrun, skipping {} frame(s)", skipped);
        }
    }
}
