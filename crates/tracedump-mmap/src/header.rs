//! Binary layout of the producer's shared-memory ring, as the dumper sees
//! it: a fixed header the producer publishes once at creation, followed by
//! `capacity` contiguous `Record` slots.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ magic │ version │ capacity │ producer_pid │ severity_tag │ pad │  (64 B)
//! ├────────────────────────────────────────────────────────────────┤
//! │                   committed_counter (atomic)                   │
//! ├────────────────────────────────────────────────────────────────┤
//! │                        Record[0]                                │
//! │                        Record[1]                                │
//! │                           ...                                   │
//! │                   Record[capacity - 1]                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::mem::size_of;
use std::sync::atomic::AtomicU64;
use tracedump_wire::RECORD_SIZE;

/// ASCII "TRCDUMP0" — `0x5452_4344_554D_5030`.
pub const RING_MAGIC: u64 = 0x5452_4344_554D_5030;
pub const RING_VERSION: u64 = 1;

/// Header published by the producer at the start of the mapping. `#[repr(C)]`
/// and cache-line sized so it never shares a line with `committed_counter` or
/// `Record[0]`.
#[repr(C)]
pub struct RingHeader {
    pub magic: u64,
    pub version: u64,
    pub capacity: u64,
    pub producer_pid: u32,
    pub severity_tag: u8,
    _pad0: [u8; 3],
    _pad1: [u8; 24],
    /// Monotonically increasing count of published records. The producer's
    /// sole synchronization primitive; the dumper never writes it.
    pub committed_counter: AtomicU64,
}

impl RingHeader {
    pub fn new(capacity: u64, producer_pid: u32, severity_tag: u8) -> Self {
        Self {
            magic: RING_MAGIC,
            version: RING_VERSION,
            capacity,
            producer_pid,
            severity_tag,
            _pad0: [0; 3],
            _pad1: [0; 24],
            committed_counter: AtomicU64::new(u64::MAX),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != RING_MAGIC {
            return Err("bad magic");
        }
        if self.version != RING_VERSION {
            return Err("wrong version");
        }
        if !self.capacity.is_power_of_two() {
            return Err("capacity must be a power of two");
        }
        Ok(())
    }
}

/// Total bytes required for the header plus `capacity` records.
pub fn bytes_for_ring(capacity: u64) -> u64 {
    size_of::<RingHeader>() as u64 + capacity * RECORD_SIZE as u64
}

const _: () = assert!(size_of::<RingHeader>() == 64);
