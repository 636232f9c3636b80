use crate::{Diagnostics, ReaderState, Ring};
use tracedump_wire::Severity;

/// Per-tick, per-ring quantities derived from the producer's committed
/// counter and the dumper's read cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delta {
    /// Records the producer overwrote before the dumper could read them.
    pub lost: u64,
    /// Slots still free before the next write would cause loss.
    pub remaining_before_loss: u64,
    /// Records dumpable this tick, capped at `max_records_per_chunk`.
    pub total: u64,
    /// Records left in the backlog after the cap, deferred to next tick.
    pub beyond_chunk_size: u64,
    /// Portion of `total` up to the physical end of the ring.
    pub up_to_buf_end: u64,
    /// Portion of `total` that wraps to the start of the ring.
    pub from_buf_start: u64,
}

/// Pure snapshot computation: reads the ring's committed counter and head
/// slot once, derives loss/backlog/wrap-split, and returns. Performs no
/// mutation and no I/O.
pub fn calculate_delta(
    ring: &dyn Ring,
    reader: &ReaderState,
    max_records_per_chunk: u64,
    diagnostics: &dyn Diagnostics,
) -> Delta {
    let committed = ring.committed_counter();
    let head = ring.read(committed);

    if head.severity == Severity::Invalid {
        if committed != u64::MAX {
            diagnostics.uninitialized_committed(committed, head.pid);
        }
        return Delta {
            remaining_before_loss: ring.capacity(),
            ..Delta::default()
        };
    }

    // INV-CTR-01: record counters never wrap on a 64-bit platform.
    debug_assert!(
        committed.wrapping_add(1) >= reader.current_read_counter,
        "committed counter regressed past the read cursor"
    );
    let backlog = committed + 1 - reader.current_read_counter;

    let overrun = backlog as i64 - ring.capacity() as i64;
    let lost = overrun.max(0) as u64;
    let remaining_before_loss = (-overrun).max(0) as u64;

    // Records beyond `capacity` behind the writer are already overwritten;
    // only the most recent `capacity` of the backlog are actually
    // retrievable, regardless of the chunk cap.
    let retrievable_backlog = backlog.min(ring.capacity());
    let total = retrievable_backlog.min(max_records_per_chunk);
    let beyond_chunk_size = retrievable_backlog - total;

    let start_index = reader.start_index(ring.capacity_mask());
    let up_to_buf_end = total.min(ring.capacity() - start_index);
    let from_buf_start = total - up_to_buf_end;

    debug_assert!(total <= max_records_per_chunk);
    debug_assert_eq!(up_to_buf_end + from_buf_start, total);

    if lost > 0 {
        diagnostics.record_loss(ring.severity_tag(), lost);
    }

    Delta {
        lost,
        remaining_before_loss,
        total,
        beyond_chunk_size,
        up_to_buf_end,
        from_buf_start,
    }
}
