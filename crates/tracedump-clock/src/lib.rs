//! Monotonic and wall-clock timestamps used to frame chunk headers.
//!
//! The monotonic reading is the one that matters for ordering; realtime and
//! walltime are informational only. All three are sourced the same way the
//! broadcast bus's own timestamp helper does, via `clock_gettime` (or
//! `mach_absolute_time` on macOS for the monotonic reading).

#[cfg(target_os = "macos")]
use std::sync::OnceLock;

/// The errno observed when the underlying syscall failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockError(pub i32);

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clock_gettime failed (errno {})", self.0)
    }
}

impl std::error::Error for ClockError {}

#[cfg(target_os = "macos")]
#[inline]
fn errno() -> i32 {
    unsafe { *libc::__error() }
}

#[cfg(not(target_os = "macos"))]
#[inline]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Shared `clock_gettime(clk_id, ...)` → nanoseconds helper, mirroring the
/// original `trace_get_nsec_from_clk`.
fn nsec_from_clock(clk_id: libc::clockid_t) -> Result<u64, ClockError> {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::clock_gettime(clk_id, &mut ts) };
    if rc != 0 {
        return Err(ClockError(errno()));
    }
    Ok(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

/// Source of monotonic nanosecond timestamps, abstracted so tests can supply
/// a deterministic fake.
pub trait MonotonicClock {
    fn now_monotonic_ns(&self) -> Result<u64, ClockError>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    #[cfg(not(target_os = "macos"))]
    fn now_monotonic_ns(&self) -> Result<u64, ClockError> {
        nsec_from_clock(libc::CLOCK_MONOTONIC)
    }

    #[cfg(target_os = "macos")]
    #[allow(deprecated)]
    fn now_monotonic_ns(&self) -> Result<u64, ClockError> {
        static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
        let (numer, denom) = *TIMEBASE.get_or_init(|| {
            let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
            let rc = unsafe { libc::mach_timebase_info(&mut info) };
            if rc != 0 || info.denom == 0 {
                (1, 1)
            } else {
                (info.numer as u64, info.denom as u64)
            }
        });
        let t = unsafe { libc::mach_absolute_time() } as u128;
        Ok(((t * numer as u128) / denom as u128) as u64)
    }
}

/// Wall-clock nanoseconds via `CLOCK_REALTIME`. Informational only, like
/// `now_walltime_ns`; kept distinct from it because the two are sourced from
/// different syscalls (`clock_gettime` vs `gettimeofday`) and can disagree by
/// a few microseconds.
pub fn now_realtime_ns() -> Result<u64, ClockError> {
    nsec_from_clock(libc::CLOCK_REALTIME)
}

/// Wall-clock nanoseconds via `gettimeofday`, microsecond-resolution expanded
/// to ns. Never fails in practice on a POSIX system, so this returns the
/// value directly rather than threading a sentinel through every caller.
pub fn now_walltime_ns() -> u64 {
    let mut tv: libc::timeval = unsafe { std::mem::zeroed() };
    unsafe { libc::gettimeofday(&mut tv, std::ptr::null_mut()) };
    tv.tv_sec as u64 * 1_000_000_000 + tv.tv_usec as u64 * 1_000
}

/// Splits a nanosecond count into `(seconds, nanoseconds)`, matching the
/// split-field representation trace file consumers expect.
pub fn split_seconds_nanos(ns: u64) -> (u64, u64) {
    (ns / 1_000_000_000, ns % 1_000_000_000)
}

/// Sentinel the orchestrator substitutes when the monotonic clock fails.
/// Timestamps are informational for framing, so a failed read does not stop
/// the flush tick; it is logged and dumped with this value instead.
pub const TS_SENTINEL: u64 = u64::MAX;

/// A deterministic clock for tests.
#[derive(Debug, Clone)]
pub struct FakeClock {
    pub next: std::cell::Cell<u64>,
    pub fail_next: std::cell::Cell<bool>,
}

impl FakeClock {
    pub fn new(start: u64) -> Self {
        Self {
            next: std::cell::Cell::new(start),
            fail_next: std::cell::Cell::new(false),
        }
    }

    pub fn advance(&self, by: u64) {
        self.next.set(self.next.get() + by);
    }

    pub fn fail_once(&self) {
        self.fail_next.set(true);
    }
}

impl MonotonicClock for FakeClock {
    fn now_monotonic_ns(&self) -> Result<u64, ClockError> {
        if self.fail_next.replace(false) {
            return Err(ClockError(5));
        }
        Ok(self.next.get())
    }
}
