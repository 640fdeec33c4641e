//! Batch writer: the buffer plus its persistence path
//!
//! Enqueue-triggered and timer-triggered drains both go through
//! [`BatchWriter::drain`], whose capture-and-clear runs under the buffer
//! lock. Persistence of a captured batch happens on a spawned task so
//! neither trigger waits on storage.
//!
//! Failed writes are logged and the batch is discarded. Nothing is retried
//! or re-enqueued.
//!
//! Spawned writes are counted so [`BatchWriter::close`] can wait for them.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use super::buffer::BatchBuffer;
use crate::store::TelemetryStore;
use crate::types::MetricPoint;

/// What caused a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    Size,
    Timer,
    Shutdown,
}

impl fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrainTrigger::Size => "size",
            DrainTrigger::Timer => "timer",
            DrainTrigger::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct WriterCounters {
    enqueued: AtomicU64,
    drains: AtomicU64,
    drained_points: AtomicU64,
    persisted: AtomicU64,
    failed_records: AtomicU64,
    failed_batches: AtomicU64,
}

/// Snapshot of writer counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterStats {
    pub batch_size: usize,
    pub max_buffer: usize,
    pub buffered: usize,
    pub in_flight: usize,
    pub enqueued: u64,
    pub drains: u64,
    pub drained_points: u64,
    pub persisted: u64,
    pub failed_records: u64,
    pub failed_batches: u64,
    pub dropped: u64,
}

/// Owns the pending batch and writes drained batches to the store
pub struct BatchWriter {
    buffer: Mutex<BatchBuffer>,
    store: Arc<dyn TelemetryStore>,
    counters: WriterCounters,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn TelemetryStore>, batch_size: usize, max_buffer: usize) -> Self {
        Self {
            buffer: Mutex::new(BatchBuffer::new(batch_size, max_buffer)),
            store,
            counters: WriterCounters::default(),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Queue a point; drains inline when the batch is full
    ///
    /// Must run inside a Tokio runtime: a size-triggered drain spawns its write.
    pub fn enqueue(self: &Arc<Self>, point: MetricPoint) {
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        let batch = self.buffer.lock().push(point);
        if let Some(batch) = batch {
            self.dispatch(batch, DrainTrigger::Size);
        }
    }

    /// Capture the buffer and persist it in the background
    ///
    /// Returns the number of points captured; zero when there was nothing to do.
    pub fn drain(self: &Arc<Self>, trigger: DrainTrigger) -> usize {
        let batch = self.buffer.lock().take();
        match batch {
            Some(batch) => {
                let len = batch.len();
                self.dispatch(batch, trigger);
                len
            }
            None => 0,
        }
    }

    /// Capture the buffer and wait for the write to finish
    pub async fn flush_now(&self, trigger: DrainTrigger) -> usize {
        let batch = self.buffer.lock().take();
        match batch {
            Some(batch) => {
                self.record_drain(batch.len());
                self.persist(batch, trigger).await
            }
            None => 0,
        }
    }

    fn dispatch(self: &Arc<Self>, batch: Vec<MetricPoint>, trigger: DrainTrigger) {
        self.record_drain(batch.len());
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let writer = Arc::clone(self);
        tokio::spawn(async move {
            writer.persist(batch, trigger).await;
            if writer.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                writer.idle.notify_waiters();
            }
        });
    }

    /// Wait until every spawned write has finished
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a concurrent notify is not missed
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Final drain: write what is buffered and wait for writes already running
    ///
    /// Returns how many records the final drain stored.
    pub async fn close(&self) -> usize {
        let written = self.flush_now(DrainTrigger::Shutdown).await;
        self.wait_idle().await;
        written
    }

    fn record_drain(&self, len: usize) {
        self.counters.drains.fetch_add(1, Ordering::Relaxed);
        self.counters
            .drained_points
            .fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Write one batch; returns how many records were stored
    async fn persist(&self, batch: Vec<MetricPoint>, trigger: DrainTrigger) -> usize {
        match self.store.insert_many(&batch).await {
            Ok(report) => {
                self.counters
                    .persisted
                    .fetch_add(report.inserted as u64, Ordering::Relaxed);
                if !report.is_complete() {
                    self.counters
                        .failed_records
                        .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
                    warn!(
                        %trigger,
                        inserted = report.inserted,
                        failed = report.failures.len(),
                        first_failure = %report.failures[0].reason,
                        "telemetry batch partially stored"
                    );
                } else {
                    debug!(%trigger, inserted = report.inserted, "telemetry batch stored");
                }
                report.inserted
            }
            Err(e) => {
                self.counters.failed_batches.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .failed_records
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                error!(%trigger, points = batch.len(), error = %e, "telemetry batch discarded");
                0
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn stats(&self) -> WriterStats {
        let (batch_size, max_buffer, buffered, dropped) = {
            let buffer = self.buffer.lock();
            (buffer.batch_size(), buffer.max_buffer(), buffer.len(), buffer.dropped())
        };
        WriterStats {
            batch_size,
            max_buffer,
            buffered,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            drains: self.counters.drains.load(Ordering::Relaxed),
            drained_points: self.counters.drained_points.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed_records: self.counters.failed_records.load(Ordering::Relaxed),
            failed_batches: self.counters.failed_batches.load(Ordering::Relaxed),
            dropped,
        }
    }
}
