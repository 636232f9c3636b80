//! On-the-wire record layout shared between producers, the dumper core, and
//! whatever reads the resulting trace file back. Every type here is `Copy`
//! and `#[repr(C)]` so it can be addressed directly inside a memory-mapped
//! ring buffer or an on-disk chunk, the same discipline the broadcast bus
//! types use for their mmap layout.

mod record;
mod severity;
mod termination;

pub use record::{BufferChunkPayload, DumpHeaderPayload, Record, RecordType, TypedPayload};
pub use severity::Severity;
pub use termination::Termination;

/// Size in bytes of every on-wire record, header or typed.
pub const RECORD_SIZE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn record_matches_record_size() {
        assert_eq!(size_of::<Record>(), RECORD_SIZE);
    }
}
