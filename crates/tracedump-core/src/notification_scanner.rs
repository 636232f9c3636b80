use crate::{Diagnostics, Ring};
use std::time::Duration;
use tracedump_wire::{Record, RecordType, Severity, Termination};

/// Bounded-retry policy for torn traces: a fixed number of attempts with a
/// fixed sleep in between. This is deliberately not an escalating
/// spin/yield backoff — the producer either finishes the write within a few
/// short sleeps or the trace is genuinely still in flight and will be
/// picked up by a later tick's main dump regardless.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub num_retries: u32,
    pub wait: Duration,
}

/// Suspends the scanner between retries. Abstracted so tests can run the
/// retry state machine without actually sleeping.
pub trait RetrySleeper {
    fn sleep(&self, dur: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl RetrySleeper for ThreadSleeper {
    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSleeper;

impl RetrySleeper for NoopSleeper {
    fn sleep(&self, _dur: Duration) {}
}

/// One complete, non-torn logical trace found in the scanned window,
/// expressed as a counter range rather than a raw pointer so callers decide
/// how to turn it into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSpan {
    pub start_counter: u64,
    pub len: u64,
}

fn interesting(rec: &Record, threshold: Severity) -> bool {
    rec.termination.contains(Termination::FIRST) && rec.rec_type == RecordType::Typed && rec.severity >= threshold
}

/// Walks forward from `rec_counter` until the trace starting there ends, or
/// the scan window (`window_end`) is reached. Returns the counter just past
/// the last record walked.
fn walk_trace(ring: &dyn Ring, rec_counter: u64, starting: &Record, window_end: u64) -> u64 {
    let mut j = rec_counter;
    loop {
        let cur = ring.read(j);
        j += 1;
        if cur.ends_trace(starting) || j == window_end {
            break;
        }
    }
    j
}

/// Splits a `[start_counter, start_counter + len)` counter range into one or
/// two byte-contiguous spans, one per side of a physical ring wrap.
fn push_spans(spans: &mut Vec<NotificationSpan>, ring: &dyn Ring, start_counter: u64, len: u64) {
    let cap = ring.capacity();
    let start_idx = ring.view().index_of(start_counter);
    let up_to_end = (cap - start_idx).min(len);
    spans.push(NotificationSpan { start_counter, len: up_to_end });
    if up_to_end < len {
        spans.push(NotificationSpan {
            start_counter: start_counter + up_to_end,
            len: len - up_to_end,
        });
    }
}

/// Scans `[start_counter, start_counter + count)` for complete logical
/// traces at or above `threshold`, appending one (or two, across a wrap)
/// span per trace found. A trace that looks torn — its last walked record
/// doesn't match the first on `(timestamp, thread_id, severity)` — is
/// retried up to `policy.num_retries` times with `policy.wait` in between
/// before being skipped and logged.
pub fn scan_notifications(
    ring: &dyn Ring,
    start_counter: u64,
    count: u64,
    threshold: Severity,
    policy: RetryPolicy,
    sleeper: &dyn RetrySleeper,
    diagnostics: &dyn Diagnostics,
) -> Vec<NotificationSpan> {
    let mut spans = Vec::new();
    let window_end = start_counter + count;
    let mut i = 0u64;

    while i < count {
        let rec_counter = start_counter + i;
        let rec = ring.read(rec_counter);

        if !interesting(&rec, threshold) {
            i += 1;
            continue;
        }

        let starting = rec;
        let mut retries_left = policy.num_retries;
        loop {
            let end_counter = walk_trace(ring, rec_counter, &starting, window_end);
            let recs_covered = end_counter - rec_counter;
            debug_assert!(recs_covered >= 1);
            let last = ring.read(end_counter - 1);

            if !last.same_trace_as(&starting) {
                if retries_left > 0 {
                    diagnostics.torn_trace_retry(starting.severity, rec_counter, recs_covered, retries_left);
                    retries_left -= 1;
                    sleeper.sleep(policy.wait);
                    continue;
                }
                diagnostics.torn_trace_skipped(starting.severity, rec_counter, recs_covered, count);
                i += recs_covered;
                break;
            }

            push_spans(&mut spans, ring, rec_counter, recs_covered);
            i += recs_covered;
            break;
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiagnosticEvent, NullDiagnostics, RecordingDiagnostics, RingView};

    struct Fixed<'a> {
        view: &'a RingView,
        committed: u64,
    }

    impl Ring for Fixed<'_> {
        fn committed_counter(&self) -> u64 {
            self.committed
        }
        fn view(&self) -> &RingView {
            self.view
        }
        fn producer_pid(&self) -> u32 {
            1
        }
        fn severity_tag(&self) -> u8 {
            0
        }
    }

    fn typed(ts: u64, tid: u64, severity: Severity, term: Termination) -> Record {
        let mut rec = Record::dump_header(ts, 0, 0);
        rec.rec_type = RecordType::Typed;
        rec.tid = tid;
        rec.severity = severity;
        rec.termination = term;
        rec
    }

    #[test]
    fn single_record_trace_is_found() {
        let mut records = vec![Record::INVALID; 8];
        records[0] = typed(1, 1, Severity::Error, Termination::FIRST | Termination::LAST);
        records[1] = typed(2, 1, Severity::Info, Termination::FIRST | Termination::LAST);
        let view = unsafe { RingView::from_raw_parts(records.as_ptr(), 8) };
        let ring = Fixed { view: &view, committed: 1 };

        let spans = scan_notifications(
            &ring,
            0,
            2,
            Severity::Warn,
            RetryPolicy { num_retries: 3, wait: std::time::Duration::from_micros(10) },
            &NoopSleeper,
            &NullDiagnostics,
        );
        assert_eq!(spans, vec![NotificationSpan { start_counter: 0, len: 1 }]);
    }

    #[test]
    fn multi_record_trace_is_coalesced() {
        let mut records = vec![Record::INVALID; 8];
        records[0] = typed(5, 9, Severity::Error, Termination::FIRST);
        records[1] = typed(5, 9, Severity::Error, Termination::NONE);
        records[2] = typed(5, 9, Severity::Error, Termination::LAST);
        records[3] = typed(6, 9, Severity::Info, Termination::FIRST | Termination::LAST);
        let view = unsafe { RingView::from_raw_parts(records.as_ptr(), 8) };
        let ring = Fixed { view: &view, committed: 3 };

        let spans = scan_notifications(
            &ring,
            0,
            4,
            Severity::Warn,
            RetryPolicy { num_retries: 3, wait: std::time::Duration::from_micros(10) },
            &NoopSleeper,
            &NullDiagnostics,
        );
        assert_eq!(spans, vec![NotificationSpan { start_counter: 0, len: 3 }]);
    }

    #[test]
    fn torn_trace_retries_then_is_skipped_when_never_healed() {
        let mut records = vec![Record::INVALID; 8];
        records[0] = typed(5, 9, Severity::Error, Termination::FIRST);
        records[1] = typed(5, 9, Severity::Error, Termination::NONE);
        // Record 2's LAST bit is never set: every retry still looks torn.
        records[2] = typed(5, 9, Severity::Error, Termination::NONE);
        let view = unsafe { RingView::from_raw_parts(records.as_ptr(), 8) };
        let ring = Fixed { view: &view, committed: 2 };

        let diag = RecordingDiagnostics::new();
        let spans = scan_notifications(
            &ring,
            0,
            3,
            Severity::Warn,
            RetryPolicy { num_retries: 3, wait: std::time::Duration::from_micros(1) },
            &NoopSleeper,
            &diag,
        );
        assert!(spans.is_empty());
        let events = diag.events();
        assert!(events.iter().any(|e| matches!(e, DiagnosticEvent::TornTraceSkipped { .. })));
        assert_eq!(
            events.iter().filter(|e| matches!(e, DiagnosticEvent::TornTraceRetry { .. })).count(),
            3
        );
    }

    /// A sleeper that completes the torn write in `records[2]` the first
    /// time it is invoked, simulating the producer finishing its write
    /// during the scanner's retry wait.
    struct HealOnFirstSleep {
        target: *mut Record,
        healed_value: Record,
        healed: std::cell::Cell<bool>,
    }

    impl RetrySleeper for HealOnFirstSleep {
        fn sleep(&self, _dur: Duration) {
            if !self.healed.replace(true) {
                unsafe { std::ptr::write(self.target, self.healed_value) };
            }
        }
    }

    #[test]
    fn torn_trace_succeeds_after_one_retry() {
        let mut records = vec![Record::INVALID; 8];
        records[0] = typed(5, 9, Severity::Error, Termination::FIRST);
        records[1] = typed(5, 9, Severity::Error, Termination::NONE);
        records[2] = typed(5, 9, Severity::Error, Termination::NONE);
        let view = unsafe { RingView::from_raw_parts(records.as_ptr(), 8) };
        let target: *mut Record = records.as_mut_ptr().wrapping_add(2);
        let ring = Fixed { view: &view, committed: 2 };

        let sleeper = HealOnFirstSleep {
            target,
            healed_value: typed(5, 9, Severity::Error, Termination::LAST),
            healed: std::cell::Cell::new(false),
        };
        let diag = RecordingDiagnostics::new();
        let spans = scan_notifications(
            &ring,
            0,
            3,
            Severity::Warn,
            RetryPolicy { num_retries: 3, wait: std::time::Duration::from_micros(1) },
            &sleeper,
            &diag,
        );
        assert_eq!(spans, vec![NotificationSpan { start_counter: 0, len: 3 }]);
        let events = diag.events();
        assert_eq!(
            events.iter().filter(|e| matches!(e, DiagnosticEvent::TornTraceRetry { .. })).count(),
            1
        );
    }
}
