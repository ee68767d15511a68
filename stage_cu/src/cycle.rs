//! Fixed-rate cycle runner: stop check → tick → event drain → sleep.
//!
//! The default build paces with `std::thread::sleep`, good enough for a
//! 100 Hz lab loop. The `rt` feature swaps in `mlockall`, CPU pinning,
//! `SCHED_FIFO` and absolute-time `clock_nanosleep` pacing for rigs where
//! tick jitter shows up in the position data. Overruns are counted and
//! logged, never fatal: the loop has no failure path besides external
//! cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, trace, warn};

use stage_common::event::{EventBuf, StageEvent};

use crate::exec::StageController;
use crate::hw::StageHardware;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
///
/// Updated every cycle with no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of ticks that exceeded the period.
    pub overruns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT scheduling setup.
#[derive(Debug, thiserror::Error)]
#[error("RT setup error: {0}")]
pub struct RtSetupError(String);

/// Lock all current and future memory pages.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), RtSetupError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RtSetupError(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), RtSetupError> {
    Ok(())
}

/// Prefault stack pages to prevent page faults once the loop is running.
fn prefault_stack() {
    let mut buf = [0u8; 64 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), RtSetupError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| RtSetupError(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| RtSetupError(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), RtSetupError> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), RtSetupError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(RtSetupError(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), RtSetupError> {
    Ok(())
}

/// Perform the full RT setup sequence before entering the loop.
///
/// In the default build all RT calls are no-ops besides stack prefaulting.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), RtSetupError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Drives [`StageController::tick`] at the configured period until the
/// active mode finishes or the stop flag is raised.
pub struct CycleRunner<H: StageHardware> {
    controller: StageController,
    hw: H,
    period: Duration,
    stats: CycleStats,
    stop: Arc<AtomicBool>,
}

impl<H: StageHardware> CycleRunner<H> {
    pub fn new(controller: StageController, hw: H, stop: Arc<AtomicBool>) -> Self {
        let period = Duration::from_millis(controller.config().cycle.period_ms);
        Self {
            controller,
            hw,
            period,
            stats: CycleStats::new(),
            stop,
        }
    }

    #[inline]
    pub fn controller(&self) -> &StageController {
        &self.controller
    }

    #[inline]
    pub fn controller_mut(&mut self) -> &mut StageController {
        &mut self.controller
    }

    #[inline]
    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Enter the cycle loop. Returns when the active mode no longer wants
    /// ticks or the stop flag is raised.
    pub fn run(&mut self) {
        #[cfg(feature = "rt")]
        self.run_rt_loop();

        #[cfg(not(feature = "rt"))]
        self.run_sim_loop();
    }

    /// One tick body. Returns `false` when the loop should exit.
    fn tick_body(&mut self, now: Instant, events: &mut EventBuf) -> bool {
        // Stop flag first: brake immediately, abandon any in-progress
        // settling or correction state.
        if self.stop.load(Ordering::SeqCst) {
            self.controller.stop_all(&mut self.hw, events);
            log_events(events);
            events.clear();
            return false;
        }
        if !self.controller.is_active() {
            return false;
        }
        self.controller.tick(now, &mut self.hw, events);
        log_events(events);
        events.clear();
        true
    }

    fn note_duration(&mut self, elapsed: Duration) {
        let duration_ns = elapsed.as_nanos() as i64;
        self.stats.record(duration_ns);
        if elapsed > self.period {
            self.stats.overruns += 1;
            warn!(
                duration_ns,
                budget_ns = self.period.as_nanos() as i64,
                "tick overran its period"
            );
        }
    }

    /// Pacing via `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) {
        let mut events = EventBuf::new();
        loop {
            let tick_start = Instant::now();
            if !self.tick_body(tick_start, &mut events) {
                break;
            }
            let elapsed = tick_start.elapsed();
            self.note_duration(elapsed);
            if let Some(remaining) = self.period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Drift-free pacing via `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) {
        use nix::time::{ClockId, clock_gettime, clock_nanosleep, ClockNanosleepFlags};

        let clock = ClockId::CLOCK_MONOTONIC;
        let period_ns = self.period.as_nanos() as i64;
        let Ok(mut next_wake) = clock_gettime(clock) else {
            warn!("clock_gettime failed; falling back to relative sleep");
            return self.run_fallback_loop();
        };

        let mut events = EventBuf::new();
        loop {
            next_wake = timespec_add_ns(next_wake, period_ns);

            let tick_start = Instant::now();
            if !self.tick_body(tick_start, &mut events) {
                break;
            }
            self.note_duration(tick_start.elapsed());

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
    }

    /// Relative-sleep fallback for the rt build when the monotonic clock is
    /// unavailable.
    #[cfg(feature = "rt")]
    fn run_fallback_loop(&mut self) {
        let mut events = EventBuf::new();
        loop {
            let tick_start = Instant::now();
            if !self.tick_body(tick_start, &mut events) {
                break;
            }
            let elapsed = tick_start.elapsed();
            self.note_duration(elapsed);
            if let Some(remaining) = self.period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Consume the runner, returning the controller and hardware adapter.
    pub fn into_parts(self) -> (StageController, H) {
        (self.controller, self.hw)
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

// ─── Event Logging ──────────────────────────────────────────────────

/// Log a tick's drained events: lifecycle at INFO, degraded outcomes at
/// WARN, per-tick feedback at TRACE.
pub fn log_events(events: &EventBuf) {
    for ev in events.iter() {
        match *ev {
            StageEvent::Feedback(fb) => trace!(?fb, "tick feedback"),
            StageEvent::TrajectoryStarted { points } => info!(points, "trajectory started"),
            StageEvent::TrajectoryStopped => info!("trajectory stopped"),
            StageEvent::TrajectoryCompleted => info!("trajectory completed"),
            StageEvent::WaypointReached {
                index,
                x,
                y,
                acceptance,
            } => match acceptance {
                stage_common::event::AcceptanceKind::Settled => {
                    info!(index, x, y, "waypoint reached")
                }
                stage_common::event::AcceptanceKind::Fallback => {
                    warn!(index, x, y, "waypoint accepted at fallback tolerance")
                }
            },
            StageEvent::DriftCorrectionStarted { axis, error } => {
                warn!(%axis, error, "locked axis drifted; correcting")
            }
            StageEvent::DriftCorrectionEnded { axis } => {
                info!(%axis, "drift correction complete")
            }
            StageEvent::HoldStarted { x, y } => info!(x, y, "position hold started"),
            StageEvent::HoldTargetReached { acceptance } => {
                info!(?acceptance, "position hold target reached")
            }
            StageEvent::HoldStopped => info!("position hold stopped"),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
