use std::cell::Cell;
use std::io::IoSlice;

use tracedump_clock::{ClockError, MonotonicClock, TS_SENTINEL};
use tracedump_wire::{Record, Severity};

use crate::{
    Delta, Diagnostics, MetricsSnapshot, NotificationSpan, ReaderState, RetryPolicy, RetrySleeper, Ring, Writer,
    calculate_delta, scan_notifications,
};
use tracedump_config::DumperConfig;

/// A ring attached to the orchestrator alongside this dumper's own
/// bookkeeping for it. Registered once (`FlushOrchestrator::attach`) and
/// reused every tick.
pub struct RingSlot {
    pub ring: Box<dyn Ring>,
    pub reader: ReaderState,
}

/// What `flush_tick` wants committed once the caller's `Writer::append_iovec`
/// call for this tick has succeeded. Carries no borrow, so it can outlive the
/// `FlushIovecs` it was produced alongside.
#[derive(Debug, Default)]
pub struct PendingCommit {
    advances: Vec<PendingRingAdvance>,
}

impl PendingCommit {
    /// Total records this tick contributed to the output file: the dump
    /// header plus each attached ring's chunk header and records. Lets the
    /// external writer keep its own `records_written` counter in sync
    /// without re-deriving it from the iovec byte lengths.
    pub fn records_in_tick(&self) -> u64 {
        1 + self.advances.iter().map(|a| 1 + a.records_written).sum::<u64>()
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRingAdvance {
    ring_index: usize,
    new_read_counter: u64,
    last_flush_offset: u64,
    records_written: u64,
    records_lost: u64,
    notifications_emitted: u64,
    notifications_skipped: u64,
}

/// The scatter/gather lists prepared for one tick. `main` is the dump header
/// plus every ring's chunk header and record slices; `notifications` is the
/// secondary stream of high-severity trace spans. Borrows from the
/// orchestrator for the lifetime of the pending write.
pub struct FlushIovecs<'a> {
    pub main: Vec<IoSlice<'a>>,
    pub notifications: Vec<IoSlice<'a>>,
}

/// Per-tick: queries the clock, iterates attached rings, runs
/// delta → chunk-framing → notification-scanning for each, and assembles the
/// two scatter/gather lists the caller hands to its `Writer`.
pub struct FlushOrchestrator {
    clock: Box<dyn MonotonicClock>,
    diagnostics: Box<dyn Diagnostics>,
    sleeper: Box<dyn RetrySleeper>,
    config: DumperConfig,
    metrics: MetricsSnapshot,
    rings: Vec<RingSlot>,
    dump_header: Record,
}

impl FlushOrchestrator {
    pub fn new(
        config: DumperConfig,
        clock: Box<dyn MonotonicClock>,
        diagnostics: Box<dyn Diagnostics>,
        sleeper: Box<dyn RetrySleeper>,
    ) -> Self {
        Self {
            clock,
            diagnostics,
            sleeper,
            config,
            metrics: MetricsSnapshot::default(),
            rings: Vec::new(),
            dump_header: Record::INVALID,
        }
    }

    pub fn attach(&mut self, ring: Box<dyn Ring>) {
        self.rings.push(RingSlot { ring, reader: ReaderState::new() });
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
    }

    pub fn rings(&self) -> &[RingSlot] {
        &self.rings
    }

    /// Prepares this tick's scatter/gather lists. Performs no I/O and
    /// advances no cursors; call `commit` after the caller's write succeeds.
    pub fn flush_tick(&mut self, writer: &dyn Writer) -> (FlushIovecs<'_>, PendingCommit) {
        let cur_ts = match self.clock.now_monotonic_ns() {
            Ok(ts) => ts,
            Err(err) => {
                self.diagnostics.clock_unavailable(&err);
                TS_SENTINEL
            }
        };

        self.dump_header = Record::dump_header(cur_ts, writer.last_flush_offset(), writer.records_discarded());

        let mut main = Vec::with_capacity(1 + self.rings.len() * 2);
        let mut notifications = Vec::new();
        let mut advances = Vec::with_capacity(self.rings.len());
        let mut total_written_records = 1u64;

        main.push(IoSlice::new(self.dump_header.as_bytes()));

        let retry_policy = RetryPolicy { num_retries: self.config.num_retries_on_partial_record, wait: self.config.retry_wait() };
        let threshold = self.config.threshold_severity;
        let max_per_chunk = self.config.max_records_per_chunk as u64;

        for (ring_index, slot) in self.rings.iter_mut().enumerate() {
            let delta = calculate_delta(slot.ring.as_ref(), &slot.reader, max_per_chunk, self.diagnostics.as_ref());

            if delta.total == 0 {
                continue;
            }

            let chunk_offset = writer.records_written() + total_written_records;
            slot.reader.chunk_header = Record::buffer_chunk_header(
                cur_ts,
                slot.ring.producer_pid(),
                0,
                slot.reader.last_flush_offset,
                writer.last_flush_offset(),
                delta.lost + slot.reader.records_discarded,
                delta.total as u32,
                slot.ring.severity_tag(),
            );
            main.push(IoSlice::new(slot.reader.chunk_header.as_bytes()));
            push_ring_slices(&mut main, slot.ring.as_ref(), &slot.reader, &delta);
            total_written_records += 1 + delta.total;

            let skip_counter = SkipCounter::new(self.diagnostics.as_ref());
            let spans = scan_notifications(
                slot.ring.as_ref(),
                slot.reader.current_read_counter,
                delta.total,
                threshold,
                retry_policy,
                self.sleeper.as_ref(),
                &skip_counter,
            );
            let notifications_skipped = skip_counter.count.get();
            push_notification_slices(&mut notifications, slot.ring.as_ref(), &spans);

            advances.push(PendingRingAdvance {
                ring_index,
                // Skip past the lost region as well as the delivered one:
                // those counters are physically gone (overwritten beyond
                // `capacity`), so re-deriving them as backlog next tick would
                // double-count the same loss on every subsequent tick.
                new_read_counter: slot.reader.current_read_counter + delta.total + delta.lost,
                last_flush_offset: chunk_offset,
                records_written: delta.total,
                records_lost: delta.lost,
                notifications_emitted: spans.len() as u64,
                notifications_skipped,
            });
        }

        (FlushIovecs { main, notifications }, PendingCommit { advances })
    }

    /// Advances ring cursors and cumulative metrics after the caller's write
    /// of the iovec from the matching `flush_tick` call has succeeded. Not
    /// calling this (because the write failed) leaves every ring's read
    /// cursor untouched, so the next tick re-covers the same window.
    pub fn commit(&mut self, pending: PendingCommit) {
        self.metrics.chunks_written += pending.advances.len() as u64;
        for advance in pending.advances {
            let slot = &mut self.rings[advance.ring_index];
            slot.reader.current_read_counter = advance.new_read_counter;
            slot.reader.last_flush_offset = advance.last_flush_offset;
            self.metrics.records_written += advance.records_written;
            self.metrics.records_lost += advance.records_lost;
            self.metrics.notifications_emitted += advance.notifications_emitted;
            self.metrics.notifications_skipped += advance.notifications_skipped;
        }
    }
}

fn push_ring_slices(main: &mut Vec<IoSlice<'_>>, ring: &dyn Ring, reader: &ReaderState, delta: &Delta) {
    let start = reader.current_read_counter;
    if delta.up_to_buf_end > 0 {
        let bytes = unsafe { ring.view().slice_bytes(start, delta.up_to_buf_end) };
        main.push(IoSlice::new(bytes));
    }
    if delta.from_buf_start > 0 {
        let bytes = unsafe { ring.view().slice_bytes(start + delta.up_to_buf_end, delta.from_buf_start) };
        main.push(IoSlice::new(bytes));
    }
}

fn push_notification_slices(notifications: &mut Vec<IoSlice<'_>>, ring: &dyn Ring, spans: &[NotificationSpan]) {
    for span in spans {
        let bytes = unsafe { ring.view().slice_bytes(span.start_counter, span.len) };
        notifications.push(IoSlice::new(bytes));
    }
}

/// Wraps the orchestrator's `Diagnostics` for the span of one
/// `scan_notifications` call, counting `torn_trace_skipped` events so the
/// metrics snapshot can track them without `scan_notifications` itself
/// needing to know about metrics.
struct SkipCounter<'a> {
    inner: &'a dyn Diagnostics,
    count: Cell<u64>,
}

impl<'a> SkipCounter<'a> {
    fn new(inner: &'a dyn Diagnostics) -> Self {
        Self { inner, count: Cell::new(0) }
    }
}

impl Diagnostics for SkipCounter<'_> {
    fn uninitialized_committed(&self, committed: u64, producer_pid: u32) {
        self.inner.uninitialized_committed(committed, producer_pid);
    }
    fn record_loss(&self, severity_tag: u8, lost: u64) {
        self.inner.record_loss(severity_tag, lost);
    }
    fn torn_trace_retry(&self, severity: Severity, start_counter: u64, recs_covered: u64, retries_left: u32) {
        self.inner.torn_trace_retry(severity, start_counter, recs_covered, retries_left);
    }
    fn torn_trace_skipped(&self, severity: Severity, start_counter: u64, recs_covered: u64, window_count: u64) {
        self.count.set(self.count.get() + 1);
        self.inner.torn_trace_skipped(severity, start_counter, recs_covered, window_count);
    }
    fn clock_unavailable(&self, err: &ClockError) {
        self.inner.clock_unavailable(err);
    }
    fn writer_failed(&self, err: &dyn std::error::Error) {
        self.inner.writer_failed(err);
    }
}
