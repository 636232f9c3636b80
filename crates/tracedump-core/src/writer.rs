use std::io::IoSlice;

/// The external collaborator boundary: whatever actually performs the
/// vectored write and owns the output file's running counters. The core
/// never implements this itself — only the trait, so tests can supply an
/// in-memory double and production code can back it with a real file
/// descriptor.
pub trait Writer {
    fn append_iovec(&mut self, iov: &[IoSlice<'_>]) -> Result<usize, WriterError>;

    /// Total records written to the output file so far, across all rings.
    fn records_written(&self) -> u64;
    /// Byte offset of the most recent dump header, used to link the next
    /// one via `previous_dump_offset`.
    fn last_flush_offset(&self) -> u64;
    /// Cumulative records discarded at the file level before they ever
    /// reached a ring (e.g. by an upstream filter). Carried into the dump
    /// header unchanged.
    fn records_discarded(&self) -> u64;
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("failed to write trace iovec")]
    Io(#[from] std::io::Error),
}
