//! Thread-safe record FIFO between a producing source task and the polling
//! consumer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::record::TelemetryRecord;

/// Bounded FIFO of decoded records, decoupling the producer's cadence from
/// the consumer's poll cadence.
///
/// The queue is the only state shared between producer and consumer tasks.
/// With a non-zero capacity, the oldest record is dropped on overflow.
/// Capacity 0 means unbounded. Handles are cheap clones sharing the same
/// queue.
#[derive(Debug, Clone)]
pub struct IngestionQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    records: Mutex<VecDeque<TelemetryRecord>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl IngestionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                records: Mutex::new(VecDeque::new()),
                capacity,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueues a record, evicting the oldest one first when full.
    pub fn push(&self, record: TelemetryRecord) {
        let mut records = self.lock();
        if self.inner.capacity > 0 && records.len() >= self.inner.capacity {
            records.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        records.push_back(record);
    }

    /// Non-blocking pop of the oldest queued record.
    pub fn pop(&self) -> Option<TelemetryRecord> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of records evicted by overflow since construction.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TelemetryRecord>> {
        // A poisoned lock only means a producer panicked mid-push; the
        // records themselves are still intact.
        self.inner
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
