//! Background log writer
//!
//! Producers format nothing and touch no file: a [`Logger`] builds a
//! [`LogRecord`] and enqueues it on the SPSC ring. One dedicated thread owns
//! the file, drains the ring, and sleeps when it is empty. Shutdown drains
//! everything still queued before the file is closed.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use super::{LogConfig, LogLevel, LogRecord};
use crate::core::{Consumer, Producer, RingBuffer};
use crate::error::{LogError, LogResult};

/// Cells in the log queue; at most `LOG_QUEUE_SLOTS - 1` records wait at once.
pub const LOG_QUEUE_SLOTS: usize = 1024;

const STARTED_MARKER: &str = "----- Logger Started -----";
const DRAINING_MARKER: &str = "Logger stopping, flushing remaining log entries...";
const STOPPED_MARKER: &str = "----- Logger Stopped -----";

/// Admission gate between the logger and the writer thread.
///
/// The high bit marks the writer as closed; the low bits count producers
/// currently inside `submit`. Closing sets the bit and waits for the count to
/// reach zero, so after [`close`](Self::close) returns no record can be
/// enqueued that the final drain would miss.
struct WriterGate(AtomicUsize);

impl WriterGate {
    const CLOSED: usize = 1 << (usize::BITS - 1);

    fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Register a producer. `false` once the writer is closed.
    #[inline(always)]
    fn enter(&self) -> bool {
        let prev = self.0.fetch_add(1, Ordering::AcqRel);
        if prev & Self::CLOSED != 0 {
            self.0.fetch_sub(1, Ordering::Release);
            return false;
        }
        true
    }

    #[inline(always)]
    fn leave(&self) {
        self.0.fetch_sub(1, Ordering::Release);
    }

    /// Refuse new records and wait out any producer mid-enqueue.
    fn close(&self) {
        self.0.fetch_or(Self::CLOSED, Ordering::AcqRel);
        while self.0.load(Ordering::Acquire) & !Self::CLOSED != 0 {
            std::hint::spin_loop();
        }
    }

    fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire) & Self::CLOSED != 0
    }
}

/// Closes the gate when the writer thread leaves `drain_loop`, however it
/// leaves.
struct CloseOnExit<'a>(&'a WriterGate);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Producer side of the log pipeline.
///
/// Level filtering is a plain comparison done before the record (and its
/// message) is built. A full queue never blocks: the record is dropped,
/// counted, and reported as [`LogError::QueueFull`]. Once the writer thread
/// has stopped, records are refused with [`LogError::WriterStopped`].
pub struct Logger {
    producer: Producer<LogRecord, LOG_QUEUE_SLOTS>,
    gate: Arc<WriterGate>,
    min_level: LogLevel,
    dropped: u64,
}

impl Logger {
    /// Fast-path check callers can use before doing expensive work.
    #[inline(always)]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records dropped because the queue was full or the writer had stopped.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// True once the writer thread no longer accepts records.
    pub fn writer_stopped(&self) -> bool {
        self.gate.is_closed()
    }

    /// Log a message. Below the threshold this is a no-op returning `Ok`.
    #[track_caller]
    #[inline]
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) -> LogResult<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.submit(level, message.into(), Location::caller())
    }

    /// Log a lazily built message; `build` only runs when `level` passes.
    #[track_caller]
    #[inline]
    pub fn log_with<F>(&mut self, level: LogLevel, build: F) -> LogResult<()>
    where
        F: FnOnce() -> String,
    {
        if !self.enabled(level) {
            return Ok(());
        }
        self.submit(level, build(), Location::caller())
    }

    fn submit(
        &mut self,
        level: LogLevel,
        message: String,
        location: &'static Location<'static>,
    ) -> LogResult<()> {
        if !self.gate.enter() {
            self.dropped += 1;
            return Err(LogError::WriterStopped);
        }

        let record = LogRecord::new(level, message, location);
        let result = self.producer.enqueue(record);
        self.gate.leave();

        result.map_err(|_full| {
            self.dropped += 1;
            LogError::QueueFull
        })
    }

    #[track_caller]
    pub fn trace(&mut self, message: impl Into<String>) -> LogResult<()> {
        self.log(LogLevel::Trace, message)
    }

    #[track_caller]
    pub fn debug(&mut self, message: impl Into<String>) -> LogResult<()> {
        self.log(LogLevel::Debug, message)
    }

    #[track_caller]
    pub fn info(&mut self, message: impl Into<String>) -> LogResult<()> {
        self.log(LogLevel::Info, message)
    }

    #[track_caller]
    pub fn warn(&mut self, message: impl Into<String>) -> LogResult<()> {
        self.log(LogLevel::Warn, message)
    }

    #[track_caller]
    pub fn error(&mut self, message: impl Into<String>) -> LogResult<()> {
        self.log(LogLevel::Error, message)
    }
}

/// Summary returned by [`LogWriter::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterStats {
    pub records_written: u64,
    pub path: PathBuf,
}

/// Handle to the writer thread. Dropping it stops the thread after draining.
pub struct LogWriter {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<io::Result<u64>>>,
    path: PathBuf,
}

impl LogWriter {
    /// Prepare the log directory, open the file and start the writer thread.
    pub fn spawn(config: LogConfig) -> LogResult<(Logger, LogWriter)> {
        let path = config.prepare()?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (producer, consumer) = RingBuffer::<LogRecord, LOG_QUEUE_SLOTS>::new().split();
        let stop = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(WriterGate::new());

        let thread = {
            let stop = Arc::clone(&stop);
            let gate = Arc::clone(&gate);
            let idle = config.idle_interval;
            thread::Builder::new()
                .name("hotpath-log-writer".to_string())
                .spawn(move || drain_loop(consumer, BufWriter::new(file), &stop, &gate, idle))?
        };

        info!(path = %path.display(), level = %config.min_level, "log writer started");

        let logger = Logger {
            producer,
            gate,
            min_level: config.min_level,
            dropped: 0,
        };
        let writer = LogWriter {
            stop,
            thread: Some(thread),
            path,
        };
        Ok((logger, writer))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the thread, wait until every queued record is written, and
    /// report how many records reached the file.
    pub fn shutdown(mut self) -> LogResult<WriterStats> {
        let records_written = self.stop_and_join()?;
        Ok(WriterStats {
            records_written,
            path: self.path.clone(),
        })
    }

    fn stop_and_join(&mut self) -> LogResult<u64> {
        let Some(thread) = self.thread.take() else {
            return Ok(0);
        };

        self.stop.store(true, Ordering::Release);
        match thread.join() {
            Ok(Ok(written)) => {
                info!(path = %self.path.display(), written, "log writer stopped");
                Ok(written)
            }
            Ok(Err(e)) => {
                error!(path = %self.path.display(), error = %e, "log writer failed");
                Err(LogError::Io(e))
            }
            Err(_) => Err(LogError::WriterPanicked),
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            error!(error = %e, "log writer did not shut down cleanly");
        }
    }
}

fn write_record(out: &mut impl Write, record: &LogRecord) -> io::Result<()> {
    writeln!(out, "{record}")
}

/// Writer thread body. Returns the number of records written.
///
/// The gate is closed on every exit path, including I/O errors, so the
/// logger stops accepting records nobody will drain.
fn drain_loop<W: Write>(
    mut consumer: Consumer<LogRecord, LOG_QUEUE_SLOTS>,
    mut out: W,
    stop: &AtomicBool,
    gate: &WriterGate,
    idle: Duration,
) -> io::Result<u64> {
    let _close = CloseOnExit(gate);

    writeln!(out, "{STARTED_MARKER}")?;
    out.flush()?;

    let mut written = 0u64;
    while !stop.load(Ordering::Acquire) {
        match consumer.dequeue() {
            Ok(record) => {
                write_record(&mut out, &record)?;
                written += 1;
            }
            Err(_empty) => {
                // Queue ran dry: make what we have visible, then idle
                out.flush()?;
                thread::sleep(idle);
            }
        }
    }

    // No producer can slip a record in behind the final drain
    gate.close();

    writeln!(out, "{DRAINING_MARKER}")?;
    while let Ok(record) = consumer.dequeue() {
        write_record(&mut out, &record)?;
        written += 1;
    }

    writeln!(out, "{STOPPED_MARKER}")?;
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hotpath-{}-{}", name, std::process::id()))
    }

    /// Sink whose every write fails, like a full disk.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_failure_closes_logger() {
        let (producer, consumer) = RingBuffer::<LogRecord, LOG_QUEUE_SLOTS>::new().split();
        let stop = AtomicBool::new(false);
        let gate = Arc::new(WriterGate::new());
        let mut logger = Logger {
            producer,
            gate: Arc::clone(&gate),
            min_level: LogLevel::Info,
            dropped: 0,
        };

        let result = drain_loop(consumer, BrokenSink, &stop, &gate, Duration::from_millis(1));
        assert!(result.is_err());
        assert!(logger.writer_stopped());

        assert!(matches!(logger.info("into the void"), Err(LogError::WriterStopped)));
        assert_eq!(logger.dropped(), 1);
    }

    #[test]
    fn test_gate_close_waits_for_producer() {
        let gate = Arc::new(WriterGate::new());
        assert!(gate.enter());

        let closer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.close())
        };
        while !gate.is_closed() {
            thread::yield_now();
        }
        // Closed but still waiting on the producer inside
        thread::sleep(Duration::from_millis(20));
        assert!(!closer.is_finished());

        gate.leave();
        closer.join().unwrap();
        assert!(!gate.enter());
    }

    #[test]
    fn test_filtered_levels_never_reach_queue() {
        let dir = scratch_dir("filter");
        let (mut logger, writer) =
            LogWriter::spawn(LogConfig::new(&dir).min_level(LogLevel::Warn)).unwrap();

        let mut built = false;
        logger
            .log_with(LogLevel::Debug, || {
                built = true;
                "expensive".to_string()
            })
            .unwrap();
        assert!(!built);
        logger.warn("kept").unwrap();

        let stats = writer.shutdown().unwrap();
        assert_eq!(stats.records_written, 1);

        let contents = fs::read_to_string(&stats.path).unwrap();
        assert!(contents.contains("[WARN]"));
        assert!(!contents.contains("expensive"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let dir = scratch_dir("full");
        // Idle long enough that the writer cannot keep up with the burst
        let config = LogConfig::new(&dir)
            .min_level(LogLevel::Trace)
            .idle_interval(Duration::from_secs(2));
        let (mut logger, writer) = LogWriter::spawn(config).unwrap();

        // Let the writer find the queue empty and go to sleep
        thread::sleep(Duration::from_millis(100));

        let mut accepted = 0u64;
        for i in 0..LOG_QUEUE_SLOTS * 2 {
            if logger.info(format!("burst {i}")).is_ok() {
                accepted += 1;
            }
        }
        assert!(logger.dropped() > 0);
        assert_eq!(accepted + logger.dropped(), (LOG_QUEUE_SLOTS * 2) as u64);

        let stats = writer.shutdown().unwrap();
        assert_eq!(stats.records_written, accepted);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_set_level_at_runtime() {
        let dir = scratch_dir("runtime-level");
        let (mut logger, writer) = LogWriter::spawn(LogConfig::new(&dir)).unwrap();

        assert!(!logger.enabled(LogLevel::Debug));
        logger.set_level(LogLevel::Debug);
        assert!(logger.enabled(LogLevel::Debug));
        logger.debug("now visible").unwrap();

        let stats = writer.shutdown().unwrap();
        assert_eq!(stats.records_written, 1);
        fs::remove_dir_all(&dir).ok();
    }
}
