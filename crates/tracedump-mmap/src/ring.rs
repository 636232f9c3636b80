//! The dumper's read-only view of a producer's shared-memory ring, plus a
//! writer-side double used by tests and the demo binary to stand in for a
//! real producer.

use std::io;
use std::mem::size_of;
use std::path::Path;
use std::sync::atomic::Ordering;

use tracedump_core::{Ring, RingView};
use tracedump_wire::Record;

use crate::header::{RingHeader, bytes_for_ring};
use crate::mmap_file::{MmapFile, MmapFileMut};

#[derive(Debug, thiserror::Error)]
pub enum ShmRingError {
    #[error("failed to map ring file")]
    Io(#[from] io::Error),
    #[error("invalid ring header: {0}")]
    InvalidHeader(&'static str),
    #[error("mapped file size {actual} does not match header-declared size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Read-only attachment to a producer's ring, opened from a memory-mapped
/// file. Implements `Ring` by reading the header's `committed_counter`
/// atomically and delegating slot addressing to `RingView`.
pub struct ShmRing {
    _mmap: MmapFile,
    header: *const RingHeader,
    view: RingView,
}

// SAFETY: the mapping outlives `header`/`view` (both point into `_mmap`,
// which this struct owns), and every access goes through an atomic load or
// `RingView`'s volatile reads.
unsafe impl Send for ShmRing {}
unsafe impl Sync for ShmRing {}

impl ShmRing {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShmRingError> {
        let mmap = MmapFile::open_ro(path)?;
        let header_ptr = mmap.as_ptr() as *const RingHeader;
        let header = unsafe { &*header_ptr };
        header.validate().map_err(ShmRingError::InvalidHeader)?;

        let expected = bytes_for_ring(header.capacity);
        if mmap.len() as u64 != expected {
            return Err(ShmRingError::SizeMismatch { expected, actual: mmap.len() as u64 });
        }

        let records_ptr = unsafe { mmap.as_ptr().add(size_of::<RingHeader>()) as *const Record };
        let view = unsafe { RingView::from_raw_parts(records_ptr, header.capacity) };

        Ok(Self { _mmap: mmap, header: header_ptr, view })
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        unsafe { &*self.header }
    }
}

impl Ring for ShmRing {
    fn committed_counter(&self) -> u64 {
        self.header().committed_counter.load(Ordering::Acquire)
    }
    fn view(&self) -> &RingView {
        &self.view
    }
    fn producer_pid(&self) -> u32 {
        self.header().producer_pid
    }
    fn severity_tag(&self) -> u8 {
        self.header().severity_tag
    }
}

/// Writer-side double standing in for a real producer. Creates the mapping,
/// publishes records, and bumps `committed_counter` — used by integration
/// tests and the demo binary, never by the dumper itself.
pub struct ShmRingWriter {
    mmap: MmapFileMut,
    capacity: u64,
}

impl ShmRingWriter {
    pub fn create(path: impl AsRef<Path>, capacity: u64, producer_pid: u32, severity_tag: u8) -> Result<Self, ShmRingError> {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        let total = bytes_for_ring(capacity);
        let mut mmap = MmapFileMut::create_rw(path, total)?;

        let header = RingHeader::new(capacity, producer_pid, severity_tag);
        unsafe { std::ptr::write(mmap.as_mut_ptr() as *mut RingHeader, header) };

        Ok(Self { mmap, capacity })
    }

    fn records_ptr(&mut self) -> *mut Record {
        unsafe { self.mmap.as_mut_ptr().add(size_of::<RingHeader>()) as *mut Record }
    }

    fn header_ptr(&mut self) -> *const RingHeader {
        self.mmap.as_ptr() as *const RingHeader
    }

    /// Writes `rec` into the next slot and publishes it by bumping
    /// `committed_counter`, mirroring the producer's claim-then-commit
    /// protocol.
    pub fn publish(&mut self, rec: Record) {
        let header = self.header_ptr();
        let next = unsafe { (*header).committed_counter.load(Ordering::Relaxed).wrapping_add(1) };
        let idx = (next & (self.capacity - 1)) as usize;
        let records = self.records_ptr();
        unsafe { std::ptr::write(records.add(idx), rec) };
        unsafe { (*header).committed_counter.store(next, Ordering::Release) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracedump_wire::{RecordType, Severity, Termination};

    fn typed(ts: u64) -> Record {
        let mut rec = Record::dump_header(ts, 0, 0);
        rec.rec_type = RecordType::Typed;
        rec.severity = Severity::Info;
        rec.termination = Termination::FIRST | Termination::LAST;
        rec
    }

    #[test]
    fn writer_and_reader_see_the_same_published_records() {
        let ts = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let path = format!("/tmp/tracedump_shm_ring_test_{ts}");

        let mut writer = ShmRingWriter::create(&path, 8, 4242, 0).unwrap();
        writer.publish(typed(1));
        writer.publish(typed(2));
        writer.publish(typed(3));

        let ring = ShmRing::open(&path).unwrap();
        assert_eq!(ring.committed_counter(), 2);
        assert_eq!(ring.producer_pid(), 4242);
        assert_eq!(ring.read(0).ts, 1);
        assert_eq!(ring.read(2).ts, 3);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_wrong_size() {
        let ts = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let path = format!("/tmp/tracedump_shm_ring_badsize_{ts}");
        MmapFileMut::create_rw(&path, 16).unwrap();
        let err = ShmRing::open(&path).unwrap_err();
        assert!(matches!(err, ShmRingError::InvalidHeader(_)));
        let _ = std::fs::remove_file(&path);
    }
}
