//! Write-preparation core for the trace dumper: given a snapshot of a
//! producer's ring buffer, decide what is dumpable, frame it, and scan it a
//! second time for high-severity notifications — all without blocking the
//! producer or taking a lock.

mod delta;
mod diagnostics;
mod metrics;
mod notification_scanner;
mod orchestrator;
mod ring;
mod writer;

pub use delta::{Delta, calculate_delta};
pub use diagnostics::{Diagnostics, DiagnosticEvent, NullDiagnostics, RecordingDiagnostics, TracingDiagnostics};
pub use metrics::MetricsSnapshot;
pub use notification_scanner::{NoopSleeper, NotificationSpan, RetryPolicy, RetrySleeper, ThreadSleeper, scan_notifications};
pub use orchestrator::{FlushIovecs, FlushOrchestrator, PendingCommit};
pub use ring::{ReaderState, Ring, RingView};
pub use writer::{Writer, WriterError};

pub use tracedump_clock::{ClockError, MonotonicClock, SystemClock, TS_SENTINEL};
pub use tracedump_config::{ConfigError, DumperConfig};
pub use tracedump_wire::{Record, RecordType, Severity, Termination, RECORD_SIZE};
