//! Bounded async buffer with a dedicated consumer thread
//!
//! State machine: `Stopped -> Running -> Draining -> Closed`.
//!
//! Producers never block on the queue. When it is full the producer takes the
//! batch lock, drains the queued backlog and writes it together with its own
//! entry through the same sink the consumer uses. Entries are only taken off
//! the queue while holding the batch lock, which keeps a single producer's
//! entries in order across both paths.

use super::config::AsyncConfig;
use super::error::{LoggerError, Result};
use super::log_entry::LogEntry;
use super::metrics::MetricsCollector;
use crossbeam_channel::{bounded, tick, Receiver, Select, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Final stage of the write path
pub trait EntrySink: Send + Sync {
    /// Write one entry; failures are absorbed and counted by the sink
    fn write_entry(&self, entry: &LogEntry);
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Stopped,
    Running,
    Draining,
    Closed,
}

impl WriterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WriterState::Stopped,
            1 => WriterState::Running,
            2 => WriterState::Draining,
            _ => WriterState::Closed,
        }
    }
}

/// What happened to an offered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Queued,
    /// Queue was full; the entry was written synchronously
    Overflow,
    /// Writer is draining or closed
    Rejected,
}

struct Shared {
    sink: Arc<dyn EntrySink>,
    sender: Sender<LogEntry>,
    receiver: Receiver<LogEntry>,
    batch: Mutex<Vec<LogEntry>>,
    state: AtomicU8,
    inflight: AtomicUsize,
    batch_size: usize,
    metrics: Arc<MetricsCollector>,
}

impl Shared {
    fn state(&self) -> WriterState {
        WriterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: WriterState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn offer(&self, entry: LogEntry) -> WriteOutcome {
        if matches!(self.state(), WriterState::Draining | WriterState::Closed) {
            self.metrics.record_rejected();
            return WriteOutcome::Rejected;
        }

        match self.sender.try_send(entry) {
            Ok(()) => {
                self.metrics.set_buffer_occupancy(self.sender.len());
                WriteOutcome::Queued
            }
            Err(TrySendError::Full(entry)) => {
                self.write_through(entry);
                WriteOutcome::Overflow
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.record_rejected();
                WriteOutcome::Rejected
            }
        }
    }

    /// Overflow fallback: backlog first, then the caller's entry
    fn write_through(&self, entry: LogEntry) {
        let mut batch = self.batch.lock();
        batch.extend(self.receiver.try_iter());
        let backlog = batch.len();
        batch.push(entry);
        self.write_batch(&mut batch);

        self.metrics.record_written(backlog as u64);
        self.metrics.record_overflow();
        self.metrics.set_buffer_occupancy(self.receiver.len());
        self.flush_sink();
    }

    /// Write and clear the batch; the caller holds the batch lock
    fn write_batch(&self, batch: &mut Vec<LogEntry>) {
        for entry in batch.drain(..) {
            let result = catch_unwind(AssertUnwindSafe(|| self.sink.write_entry(&entry)));
            if let Err(panic_info) = result {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                self.metrics.record_write_error();
                eprintln!("[LOGGER CRITICAL] Log sink panicked: {}", panic_msg);
            }
        }
    }

    /// Write a full batch as one unit and count it
    fn commit(&self, batch: &mut Vec<LogEntry>) {
        let count = batch.len() as u64;
        self.write_batch(batch);
        self.metrics.record_written(count);
        self.metrics.set_buffer_occupancy(self.receiver.len());
    }

    fn flush_sink(&self) {
        match catch_unwind(AssertUnwindSafe(|| self.sink.flush())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("[LOGGER ERROR] Flush failed: {}", e),
            Err(_) => {
                self.metrics.record_write_error();
                eprintln!("[LOGGER CRITICAL] Log sink panicked during flush");
            }
        }
    }

    /// Drain the queue until it is empty or the deadline passes
    ///
    /// Whatever is still queued at the deadline is discarded and counted.
    fn drain_until(&self, deadline: Instant) {
        let mut batch = self.batch.lock();
        if !batch.is_empty() {
            self.commit(&mut batch);
        }

        while Instant::now() < deadline {
            batch.extend(self.receiver.try_iter().take(self.batch_size));
            if batch.is_empty() {
                break;
            }
            self.commit(&mut batch);
        }

        let discarded = self.receiver.try_iter().count() as u64;
        if discarded > 0 {
            self.metrics.record_dropped(discarded);
            eprintln!(
                "[LOGGER WARNING] Shutdown timeout reached, discarded {} queued entries",
                discarded
            );
        }
        self.metrics.set_buffer_occupancy(0);
        self.flush_sink();
    }
}

pub struct AsyncWriter {
    shared: Arc<Shared>,
    capacity: usize,
    flush_interval: Duration,
    flush_timeout: Duration,
    shutdown_timeout: Duration,
    shutdown_tx: Sender<Instant>,
    shutdown_rx: Receiver<Instant>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncWriter {
    /// Create a stopped writer; entries offered before [`start`](Self::start) are queued
    pub fn new(sink: Arc<dyn EntrySink>, config: &AsyncConfig, metrics: Arc<MetricsCollector>) -> Self {
        let capacity = config.buffer_size.max(1);
        let (sender, receiver) = bounded(capacity);
        let (shutdown_tx, shutdown_rx) = bounded(1);
        metrics.set_buffer_capacity(capacity);

        Self {
            shared: Arc::new(Shared {
                sink,
                sender,
                receiver,
                batch: Mutex::new(Vec::with_capacity(config.batch_size.max(1))),
                state: AtomicU8::new(WriterState::Stopped as u8),
                inflight: AtomicUsize::new(0),
                batch_size: config.batch_size.max(1),
                metrics,
            }),
            capacity,
            flush_interval: config.flush_interval,
            flush_timeout: config.flush_timeout,
            shutdown_timeout: config.shutdown_timeout,
            shutdown_tx,
            shutdown_rx,
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WriterState {
        self.shared.state()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries waiting in the queue
    pub fn queued(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Spawn the consumer thread
    pub fn start(&self) -> Result<()> {
        let swapped = self.shared.state.compare_exchange(
            WriterState::Stopped as u8,
            WriterState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if swapped.is_err() {
            return Err(LoggerError::other(format!(
                "async writer cannot start from state {:?}",
                self.state()
            )));
        }

        let shared = Arc::clone(&self.shared);
        let shutdown_rx = self.shutdown_rx.clone();
        let flush_interval = self.flush_interval;
        let handle = thread::Builder::new()
            .name("log-writer".into())
            .spawn(move || consume(shared, shutdown_rx, flush_interval))
            .map_err(|e| {
                self.shared.set_state(WriterState::Stopped);
                LoggerError::io_operation("spawn", "failed to start log writer thread", e)
            })?;
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Offer an entry; never blocks beyond one synchronous batch write
    pub fn write(&self, entry: LogEntry) -> WriteOutcome {
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        let outcome = self.shared.offer(entry);
        self.shared.inflight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    /// Write everything queued or batched so far, then flush the sink
    ///
    /// Fails with [`LoggerError::Timeout`] when the consumer holds the batch
    /// for longer than the configured flush timeout.
    pub fn flush(&self) -> Result<()> {
        let Some(mut batch) = self.shared.batch.try_lock_for(self.flush_timeout) else {
            return Err(LoggerError::timeout("flushing the async buffer", self.flush_timeout));
        };
        batch.extend(self.shared.receiver.try_iter());
        if !batch.is_empty() {
            self.shared.commit(&mut batch);
        }
        drop(batch);
        self.shared.sink.flush()
    }

    /// Drain and stop; entries still queued after `timeout` are dropped and counted
    ///
    /// Always succeeds. Calling it again is a no-op.
    pub fn close(&self, timeout: Duration) -> Result<()> {
        let previous = self.shared.state();
        if matches!(previous, WriterState::Draining | WriterState::Closed) {
            return Ok(());
        }
        self.shared.set_state(WriterState::Draining);

        let start = Instant::now();
        let deadline = start + timeout;

        // Producers that saw Running finish their offer before draining starts
        while self.shared.inflight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::yield_now();
        }

        match self.handle.lock().take() {
            Some(handle) => {
                let _ = self.shutdown_tx.try_send(deadline);
                let grace = deadline + self.flush_timeout;
                loop {
                    if handle.is_finished() {
                        if let Err(e) = handle.join() {
                            eprintln!(
                                "[LOGGER ERROR] Async writer thread panicked during shutdown: {:?}",
                                e
                            );
                        }
                        break;
                    }
                    if Instant::now() >= grace {
                        eprintln!(
                            "[LOGGER WARNING] Async writer thread did not finish within {:?}. \
                             Some logs may be lost.",
                            timeout
                        );
                        break;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
            None => self.shared.drain_until(deadline),
        }

        self.shared.set_state(WriterState::Closed);
        Ok(())
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        if self.state() != WriterState::Closed {
            let _ = self.close(self.shutdown_timeout);
        }
    }
}

fn consume(shared: Arc<Shared>, shutdown_rx: Receiver<Instant>, flush_interval: Duration) {
    let ticker = tick(flush_interval);
    let mut select = Select::new();
    let entries_op = select.recv(&shared.receiver);
    let tick_op = select.recv(&ticker);
    let shutdown_op = select.recv(&shutdown_rx);

    loop {
        let ready = select.ready();

        if ready == entries_op {
            let mut batch = shared.batch.lock();
            let room = shared.batch_size.saturating_sub(batch.len()).max(1);
            batch.extend(shared.receiver.try_iter().take(room));
            shared.metrics.set_buffer_occupancy(shared.receiver.len());
            if batch.len() >= shared.batch_size {
                shared.commit(&mut batch);
                drop(batch);
                shared.flush_sink();
            }
        } else if ready == tick_op {
            let _ = ticker.try_recv();
            let mut batch = shared.batch.lock();
            if !batch.is_empty() {
                shared.commit(&mut batch);
                drop(batch);
                shared.flush_sink();
            }
        } else if ready == shutdown_op {
            let deadline = shutdown_rx.try_recv().unwrap_or_else(|_| Instant::now());
            shared.drain_until(deadline);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    #[derive(Default)]
    struct CollectingSink {
        written: Mutex<Vec<String>>,
        flushes: AtomicUsize,
        delay: Option<Duration>,
    }

    impl EntrySink for CollectingSink {
        fn write_entry(&self, entry: &LogEntry) {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if entry.message == "explode" {
                panic!("sink exploded");
            }
            self.written.lock().push(entry.message.clone());
        }

        fn flush(&self) -> Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(buffer_size: usize, batch_size: usize) -> AsyncConfig {
        AsyncConfig {
            buffer_size,
            batch_size,
            flush_interval: Duration::from_millis(20),
            ..AsyncConfig::default()
        }
    }

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, message)
    }

    #[test]
    fn test_overflow_keeps_producer_order() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(1, 8), Arc::clone(&metrics));

        assert_eq!(writer.write(entry("first")), WriteOutcome::Queued);
        assert_eq!(writer.write(entry("second")), WriteOutcome::Overflow);

        assert_eq!(*sink.written.lock(), vec!["first", "second"]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.overflow_count, 1);
        assert_eq!(snapshot.entries_written, 1);
        assert_eq!(snapshot.buffer_capacity, 1);
        writer.close(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_consumer_drains_queue() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(1024, 16), Arc::clone(&metrics));
        writer.start().unwrap();
        assert_eq!(writer.state(), WriterState::Running);

        for i in 0..100 {
            assert_eq!(writer.write(entry(&format!("entry-{i}"))), WriteOutcome::Queued);
        }
        writer.close(Duration::from_secs(5)).unwrap();

        let written = sink.written.lock();
        assert_eq!(written.len(), 100);
        assert_eq!(written[0], "entry-0");
        assert_eq!(written[99], "entry-99");
        assert_eq!(metrics.snapshot().entries_written, 100);
        assert!(sink.flushes.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_timer_flushes_partial_batch() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(64, 1000), metrics);
        writer.start().unwrap();

        writer.write(entry("lonely"));
        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.written.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*sink.written.lock(), vec!["lonely"]);
        writer.close(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_explicit_flush_writes_queued_entries() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(64, 1000), metrics);

        writer.write(entry("a"));
        writer.write(entry("b"));
        assert_eq!(writer.queued(), 2);
        writer.flush().unwrap();

        assert_eq!(*sink.written.lock(), vec!["a", "b"]);
        assert_eq!(writer.queued(), 0);
    }

    #[test]
    fn test_rejects_after_close() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(8, 4), Arc::clone(&metrics));
        writer.start().unwrap();
        writer.close(Duration::from_secs(1)).unwrap();

        assert_eq!(writer.state(), WriterState::Closed);
        assert_eq!(writer.write(entry("late")), WriteOutcome::Rejected);
        assert_eq!(metrics.snapshot().rejected_count, 1);
        assert!(writer.close(Duration::from_secs(1)).is_ok());
        assert!(writer.start().is_err());
    }

    #[test]
    fn test_shutdown_timeout_counts_dropped() {
        let sink = Arc::new(CollectingSink {
            delay: Some(Duration::from_millis(20)),
            ..CollectingSink::default()
        });
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(256, 4), Arc::clone(&metrics));

        for i in 0..200 {
            writer.write(entry(&format!("slow-{i}")));
        }
        writer.close(Duration::from_millis(50)).unwrap();

        let snapshot = metrics.snapshot();
        assert!(snapshot.dropped_count > 0);
        assert_eq!(snapshot.entries_written + snapshot.dropped_count, 200);
        assert_eq!(sink.written.lock().len() as u64, snapshot.entries_written);
    }

    #[test]
    fn test_sink_panic_is_isolated() {
        let sink = Arc::new(CollectingSink::default());
        let metrics = Arc::new(MetricsCollector::new(true));
        let writer = AsyncWriter::new(sink.clone(), &config(16, 4), Arc::clone(&metrics));

        writer.write(entry("before"));
        writer.write(entry("explode"));
        writer.write(entry("after"));
        writer.flush().unwrap();

        assert_eq!(*sink.written.lock(), vec!["before", "after"]);
        assert_eq!(metrics.snapshot().write_error_count, 1);
    }
}
