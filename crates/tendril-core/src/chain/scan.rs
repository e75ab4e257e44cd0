//! Scan-record queue and best-candidate selection.
//!
//! The radio's promiscuous filter pushes a [`ScanRecord`] for every beacon
//! carrying the provisioning marker. The queue is small and lossy by design:
//! records describe a moment, not state, so when it overflows the oldest is
//! dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use tendril_radio::{MarkerSink, ScanRecord};

/// Queue depth; overflow drops the oldest record
const SCAN_QUEUE_CAPACITY: usize = 10;

struct Shared {
    records: Mutex<VecDeque<ScanRecord>>,
    notify: Notify,
}

/// Bounded queue between the radio's filter callback and the slave task.
#[derive(Clone)]
pub struct ScanQueue {
    shared: Arc<Shared>,
}

impl Default for ScanQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                records: Mutex::new(VecDeque::with_capacity(SCAN_QUEUE_CAPACITY)),
                notify: Notify::new(),
            }),
        }
    }

    /// A sink suitable for [`tendril_radio::Radio::install_marker_filter`].
    pub fn sink(&self) -> MarkerSink {
        let queue = self.clone();
        Arc::new(move |record| queue.push(record))
    }

    /// Push a record, dropping the oldest when full.
    pub fn push(&self, record: ScanRecord) {
        let mut records = self.shared.records.lock().unwrap();
        if records.len() == SCAN_QUEUE_CAPACITY {
            records.pop_front();
        }
        records.push_back(record);
        drop(records);

        self.shared.notify.notify_one();
    }

    /// Pop the next record, waiting up to `wait`.
    pub async fn recv(&self, wait: Duration) -> Option<ScanRecord> {
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.shared.notify.notified();

            if let Some(record) = self.shared.records.lock().unwrap().pop_front() {
                return Some(record);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    /// Wait up to `poll` for a first record, then keep draining for one more
    /// `poll` window and return the strongest candidate seen. Equal strength
    /// keeps the earlier record, so ties break in first-seen order.
    pub async fn best_candidate(&self, poll: Duration) -> Option<ScanRecord> {
        let mut best = self.recv(poll).await?;

        let deadline = Instant::now() + poll;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            match self.recv(deadline - now).await {
                Some(record) if record.rssi > best.rssi => best = record,
                Some(_) => {}
                None => break,
            }
        }

        Some(best)
    }
}
