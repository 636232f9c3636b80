use std::io::IoSlice;
use tracedump_core::{Ring, RingView, Writer, WriterError};
use tracedump_wire::{Record, RecordType, Severity, Termination};

/// An in-memory ring backed by a `Vec<Record>`, standing in for shared
/// memory in integration tests.
pub struct VecRing {
    _records: Vec<Record>,
    view: RingView,
    pub committed: u64,
    pub pid: u32,
    pub severity_tag: u8,
}

impl VecRing {
    pub fn new(records: Vec<Record>, committed: u64) -> Self {
        let capacity = records.len() as u64;
        let view = unsafe { RingView::from_raw_parts(records.as_ptr(), capacity) };
        Self { _records: records, view, committed, pid: 1, severity_tag: 0 }
    }
}

impl Ring for VecRing {
    fn committed_counter(&self) -> u64 {
        self.committed
    }
    fn view(&self) -> &RingView {
        &self.view
    }
    fn producer_pid(&self) -> u32 {
        self.pid
    }
    fn severity_tag(&self) -> u8 {
        self.severity_tag
    }
}

/// Builds a complete, single-record trace at `ts`/`tid`/`severity`.
pub fn typed_record(ts: u64, tid: u64, severity: Severity, term: Termination) -> Record {
    let mut rec = Record::dump_header(ts, 0, 0);
    rec.rec_type = RecordType::Typed;
    rec.tid = tid;
    rec.severity = severity;
    rec.termination = term;
    rec
}

/// Collects everything written via `append_iovec`, byte length per call, for
/// assertions against the expected iovec shape.
#[derive(Default)]
pub struct InMemoryWriter {
    pub calls: Vec<Vec<u8>>,
    pub records_written: u64,
    pub last_flush_offset: u64,
    pub records_discarded: u64,
}

impl Writer for InMemoryWriter {
    fn append_iovec(&mut self, iov: &[IoSlice<'_>]) -> Result<usize, WriterError> {
        let mut buf = Vec::new();
        for slice in iov {
            buf.extend_from_slice(slice);
        }
        let n = buf.len();
        self.calls.push(buf);
        Ok(n)
    }
    fn records_written(&self) -> u64 {
        self.records_written
    }
    fn last_flush_offset(&self) -> u64 {
        self.last_flush_offset
    }
    fn records_discarded(&self) -> u64 {
        self.records_discarded
    }
}
