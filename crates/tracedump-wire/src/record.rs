use crate::{RECORD_SIZE, Severity, Termination};

/// Discriminates the three kinds of record this crate ever frames.
/// Producer-defined payload layouts for `Typed` records are opaque to us.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    Typed = 0,
    DumpHeader = 1,
    BufferChunk = 2,
}

/// Opaque producer payload. The dumper never interprets typed-record bytes;
/// it only needs to know where they end.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TypedPayload(pub [u8; 40]);

/// Payload of the once-per-tick dump header record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DumpHeaderPayload {
    pub prev_dump_offset: u64,
    pub records_previously_discarded: u64,
    _pad: [u8; 24],
}

impl DumpHeaderPayload {
    pub fn new(prev_dump_offset: u64, records_previously_discarded: u64) -> Self {
        Self {
            prev_dump_offset,
            records_previously_discarded,
            _pad: [0; 24],
        }
    }
}

/// Payload of the per-ring buffer-chunk header record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferChunkPayload {
    pub last_metadata_offset: u64,
    pub prev_chunk_offset: u64,
    pub dump_header_offset: u64,
    pub lost_records: u64,
    pub records: u32,
    pub severity_type: u8,
    _pad: [u8; 3],
}

impl BufferChunkPayload {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        last_metadata_offset: u64,
        prev_chunk_offset: u64,
        dump_header_offset: u64,
        lost_records: u64,
        records: u32,
        severity_type: u8,
    ) -> Self {
        Self {
            last_metadata_offset,
            prev_chunk_offset,
            dump_header_offset,
            lost_records,
            records,
            severity_type,
            _pad: [0; 3],
        }
    }
}

/// Variant payload of a record. Mirrors the C union this format was
/// originally specified with: exactly one field is meaningful, selected by
/// `Record::rec_type`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RecordPayload {
    pub typed: TypedPayload,
    pub dump_header: DumpHeaderPayload,
    pub buffer_chunk: BufferChunkPayload,
}

/// A single fixed-size wire record. `#[repr(C)]` and `Copy` so it can be
/// addressed directly inside a memory-mapped ring slot or read out of shared
/// memory by value without any (de)serialization step.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Record {
    pub ts: u64,
    pub tid: u64,
    pub pid: u32,
    pub severity: Severity,
    pub rec_type: RecordType,
    pub termination: Termination,
    _pad: [u8; 1],
    pub u: RecordPayload,
}

impl Record {
    /// An all-zero record with `severity == Invalid`: what an unwritten ring
    /// slot reads as.
    pub const INVALID: Record = Record {
        ts: 0,
        tid: 0,
        pid: 0,
        severity: Severity::Invalid,
        rec_type: RecordType::Typed,
        termination: Termination::NONE,
        _pad: [0],
        u: RecordPayload {
            typed: TypedPayload([0; 40]),
        },
    };

    pub fn dump_header(
        cur_ts: u64,
        prev_dump_offset: u64,
        records_previously_discarded: u64,
    ) -> Self {
        Record {
            ts: cur_ts,
            tid: 0,
            pid: 0,
            severity: Severity::Invalid,
            rec_type: RecordType::DumpHeader,
            termination: Termination::FIRST | Termination::LAST,
            _pad: [0],
            u: RecordPayload {
                dump_header: DumpHeaderPayload::new(prev_dump_offset, records_previously_discarded),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn buffer_chunk_header(
        cur_ts: u64,
        pid: u32,
        last_metadata_offset: u64,
        prev_chunk_offset: u64,
        dump_header_offset: u64,
        lost_records: u64,
        records: u32,
        severity_type: u8,
    ) -> Self {
        Record {
            ts: cur_ts,
            tid: 0,
            pid,
            severity: Severity::Invalid,
            rec_type: RecordType::BufferChunk,
            termination: Termination::FIRST | Termination::LAST,
            _pad: [0],
            u: RecordPayload {
                buffer_chunk: BufferChunkPayload::new(
                    last_metadata_offset,
                    prev_chunk_offset,
                    dump_header_offset,
                    lost_records,
                    records,
                    severity_type,
                ),
            },
        }
    }

    /// # Safety
    /// Caller must have constructed this record as a `DumpHeader` record.
    pub unsafe fn dump_header_payload(&self) -> &DumpHeaderPayload {
        unsafe { &self.u.dump_header }
    }

    /// # Safety
    /// Caller must have constructed this record as a `BufferChunk` record.
    pub unsafe fn buffer_chunk_payload(&self) -> &BufferChunkPayload {
        unsafe { &self.u.buffer_chunk }
    }

    /// Whether `self` and `other` belong to the same logical trace: the
    /// triple-equality check used both to coalesce multi-record traces and
    /// to detect torn writes after a scan.
    #[inline]
    pub fn same_trace_as(&self, other: &Record) -> bool {
        self.ts == other.ts && self.tid == other.tid && self.severity == other.severity
    }

    /// Whether `self` terminates the trace started by `start`.
    #[inline]
    pub fn ends_trace(&self, start: &Record) -> bool {
        debug_assert!(start.termination.contains(Termination::FIRST));
        self.termination.contains(Termination::LAST) || !self.same_trace_as(start)
    }

    /// This record's wire bytes, for handing to a vectored write. Every
    /// field (including padding) is explicitly initialized by every
    /// constructor, so this never exposes uninitialized memory.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self as *const Record as *const u8, RECORD_SIZE) }
    }
}

const _: () = assert!(std::mem::size_of::<Record>() == RECORD_SIZE);
