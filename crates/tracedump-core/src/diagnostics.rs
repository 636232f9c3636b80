use std::cell::RefCell;
use tracedump_clock::ClockError;
use tracedump_wire::Severity;

/// Injected logging capability every anomaly in the core is reported
/// through, instead of reaching for a process-wide logger or syslog call
/// directly. All methods default to no-ops so implementors only override
/// what they care about.
pub trait Diagnostics {
    /// A ring's committed counter points at a slot that reads as `Invalid`.
    fn uninitialized_committed(&self, _committed: u64, _producer_pid: u32) {}
    /// The producer lapped the dumper; `lost` records are gone for good.
    fn record_loss(&self, _severity_tag: u8, _lost: u64) {}
    /// A notification trace looked torn on its first pass; a retry is
    /// about to be attempted.
    fn torn_trace_retry(&self, _severity: Severity, _start_counter: u64, _recs_covered: u64, _retries_left: u32) {}
    /// Retries were exhausted; the trace is skipped for this tick.
    fn torn_trace_skipped(&self, _severity: Severity, _start_counter: u64, _recs_covered: u64, _window_count: u64) {}
    /// The monotonic clock failed; a sentinel timestamp is being used.
    fn clock_unavailable(&self, _err: &ClockError) {}
    /// The external writer failed to append the assembled iovec.
    fn writer_failed(&self, _err: &dyn std::error::Error) {}
}

/// Discards every event. Useful where diagnostics are genuinely unwanted
/// (benchmarks, fuzzing harnesses).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {}

/// Forwards every event to `tracing`, matching the level the original
/// syslog priorities used (`LOG_ERR`/`LOG_NOTICE`/`LOG_USER` map to
/// `error!`/`warn!`/`info!`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn uninitialized_committed(&self, committed: u64, producer_pid: u32) {
        tracing::error!(
            committed,
            producer_pid,
            "record was uninitialized but marked committed while dumping"
        );
    }

    fn record_loss(&self, severity_tag: u8, lost: u64) {
        tracing::warn!(severity_tag, lost, "producer overran the dumper; records lost");
    }

    fn torn_trace_retry(&self, severity: Severity, start_counter: u64, recs_covered: u64, retries_left: u32) {
        tracing::info!(
            ?severity,
            start_counter,
            recs_covered,
            retries_left,
            "unterminated record found while scanning for notifications, retrying"
        );
    }

    fn torn_trace_skipped(&self, severity: Severity, start_counter: u64, recs_covered: u64, window_count: u64) {
        tracing::warn!(
            ?severity,
            start_counter,
            recs_covered,
            window_count,
            "skipped a partial record while building the notification iovec"
        );
    }

    fn clock_unavailable(&self, err: &ClockError) {
        tracing::warn!(%err, "monotonic clock unavailable, using sentinel timestamp");
    }

    fn writer_failed(&self, err: &dyn std::error::Error) {
        tracing::error!(%err, "trace writer failed to append iovec");
    }
}

/// One recorded diagnostics call, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    UninitializedCommitted { committed: u64, producer_pid: u32 },
    RecordLoss { severity_tag: u8, lost: u64 },
    TornTraceRetry { severity: Severity, start_counter: u64, recs_covered: u64, retries_left: u32 },
    TornTraceSkipped { severity: Severity, start_counter: u64, recs_covered: u64, window_count: u64 },
    ClockUnavailable,
    WriterFailed,
}

/// Captures every call into a `Vec` rather than emitting anywhere, so tests
/// can assert on exactly what the core reported.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    pub events: RefCell<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.borrow().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn uninitialized_committed(&self, committed: u64, producer_pid: u32) {
        self.events.borrow_mut().push(DiagnosticEvent::UninitializedCommitted { committed, producer_pid });
    }

    fn record_loss(&self, severity_tag: u8, lost: u64) {
        self.events.borrow_mut().push(DiagnosticEvent::RecordLoss { severity_tag, lost });
    }

    fn torn_trace_retry(&self, severity: Severity, start_counter: u64, recs_covered: u64, retries_left: u32) {
        self.events.borrow_mut().push(DiagnosticEvent::TornTraceRetry {
            severity,
            start_counter,
            recs_covered,
            retries_left,
        });
    }

    fn torn_trace_skipped(&self, severity: Severity, start_counter: u64, recs_covered: u64, window_count: u64) {
        self.events.borrow_mut().push(DiagnosticEvent::TornTraceSkipped {
            severity,
            start_counter,
            recs_covered,
            window_count,
        });
    }

    fn clock_unavailable(&self, _err: &ClockError) {
        self.events.borrow_mut().push(DiagnosticEvent::ClockUnavailable);
    }

    fn writer_failed(&self, _err: &dyn std::error::Error) {
        self.events.borrow_mut().push(DiagnosticEvent::WriterFailed);
    }
}
