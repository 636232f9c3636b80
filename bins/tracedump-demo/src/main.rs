use std::fs::{File, OpenOptions};
use std::io::{IoSlice, Write};
use std::time::Duration;

use anyhow::Context;
use tracedump_clock::SystemClock;
use tracedump_config::DumperConfig;
use tracedump_core::{Diagnostics, FlushOrchestrator, NullDiagnostics, ThreadSleeper, TracingDiagnostics, Writer, WriterError};
use tracedump_mmap::{ShmRing, ShmRingWriter};
use tracedump_wire::{Record, RecordType, Severity, Termination};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Writes flush iovecs to a plain file, tracking the counters
/// `FlushOrchestrator` reads back when framing the next dump header.
struct FileWriter {
    file: File,
    records_written: u64,
    last_flush_offset: u64,
    records_discarded: u64,
}

impl FileWriter {
    fn create(path: &str) -> anyhow::Result<Self> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(Self { file, records_written: 0, last_flush_offset: 0, records_discarded: 0 })
    }
}

impl Writer for FileWriter {
    fn append_iovec(&mut self, iov: &[IoSlice<'_>]) -> Result<usize, WriterError> {
        Ok(self.file.write_vectored(iov)?)
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

/// Synthesizes a single-record trace, alternating severities so the
/// notification stream has something to coalesce.
fn synthetic_record(ts: u64, tid: u64) -> Record {
    let severity = if ts % 5 == 0 { Severity::Error } else { Severity::Info };
    let mut rec = Record::dump_header(ts, 0, 0);
    rec.rec_type = RecordType::Typed;
    rec.tid = tid;
    rec.severity = severity;
    rec.termination = Termination::FIRST | Termination::LAST;
    rec
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let shm_path = std::env::var("TRACEDUMP_SHM_PATH").unwrap_or_else(|_| "/tmp/tracedump_demo_ring".into());
    let out_path = std::env::var("TRACEDUMP_OUT_PATH").unwrap_or_else(|_| "/tmp/tracedump_demo.trace".into());
    let capacity: u64 = std::env::var("TRACEDUMP_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(1024);

    let mut producer = ShmRingWriter::create(&shm_path, capacity, std::process::id(), Severity::Info as u8)
        .context("failed to create shared-memory ring")?;
    for i in 0..16u64 {
        producer.publish(synthetic_record(i, 1));
    }
    // Keep the mapping (and the file behind it) alive for the dumper thread
    // by leaking the writer handle: this demo is a single process standing
    // in for both sides of the ring.
    std::mem::forget(producer);

    let config = DumperConfig::default();
    let diagnostics: Box<dyn Diagnostics> = if std::env::var("TRACEDUMP_QUIET").is_ok() {
        Box::new(NullDiagnostics)
    } else {
        Box::new(TracingDiagnostics)
    };
    let mut orchestrator = FlushOrchestrator::new(config, Box::new(SystemClock), diagnostics, Box::new(ThreadSleeper));

    let ring = ShmRing::open(&shm_path).context("failed to attach to shared-memory ring")?;
    orchestrator.attach(Box::new(ring));

    let mut writer = FileWriter::create(&out_path)?;

    info!(shm_path, out_path, capacity, "tracedump-demo starting flush loop");

    for tick in 0..5u32 {
        let (iovecs, pending) = orchestrator.flush_tick(&writer);
        let notifications_found = iovecs.notifications.len();
        let written = writer.append_iovec(&iovecs.main);
        match written {
            Ok(_) => {
                writer.records_written += pending.records_in_tick();
                writer.last_flush_offset = writer.records_written;
                orchestrator.commit(pending);
            }
            Err(err) => {
                tracing::error!(%err, tick, "writer failed, leaving ring cursors untouched");
            }
        }
        let metrics = orchestrator.metrics();
        info!(tick, notifications_found, ?metrics, "flush tick complete");
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(())
}
