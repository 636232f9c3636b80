/// Cumulative counters maintained across ticks. Plain `u64`s: the flush
/// loop is single-threaded, so there is nothing here that needs atomics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub chunks_written: u64,
    pub records_written: u64,
    pub records_lost: u64,
    pub records_discarded: u64,
    pub notifications_emitted: u64,
    pub notifications_skipped: u64,
}
