//! Single-slot configuration handoff queue.
//!
//! The chain slave (or any other provisioning front-end) writes the assembled
//! [`NetworkConfig`] here; application code reads it out and brings the mesh
//! up. Exactly one record is buffered. A writer that still finds the slot
//! occupied when its wait expires replaces the stale unread record rather
//! than failing — provisioning always wants the *latest* credentials — and
//! the replacement is reported so callers can log it.
//!
//! Ownership transfers through the queue: the writer gives up its record, the
//! reader receives it outright, and neither side ever holds a reference into
//! the other's memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};

use crate::config::NetworkConfig;
use crate::error::QueueError;

/// What happened to a written record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Slot was free; record stored
    Stored,
    /// Wait expired with the slot still occupied; the stale record was
    /// discarded in favor of this one
    Replaced,
}

struct Shared {
    slot: Mutex<Option<NetworkConfig>>,
    readable: Notify,
    writable: Notify,
}

/// Cloneable handle to the single-slot queue.
#[derive(Clone)]
pub struct ConfigQueue {
    shared: Arc<Shared>,
}

impl Default for ConfigQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                readable: Notify::new(),
                writable: Notify::new(),
            }),
        }
    }

    /// Store a configuration, waiting up to `wait` for the slot to free.
    ///
    /// `None` waits indefinitely and always returns
    /// [`WriteOutcome::Stored`]; a bounded wait that expires replaces the
    /// stale record instead of failing.
    pub async fn write(&self, config: NetworkConfig, wait: Option<Duration>) -> WriteOutcome {
        let deadline = wait.map(|d| Instant::now() + d);
        let mut config = Some(config);

        loop {
            // Arm the notification before checking, so a release between the
            // check and the wait is not lost
            let notified = self.shared.writable.notified();

            {
                let mut slot = self.shared.slot.lock().await;
                if slot.is_none() {
                    *slot = config.take();
                    self.shared.readable.notify_one();
                    return WriteOutcome::Stored;
                }

                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        tracing::warn!("configuration slot still occupied, replacing stale record");
                        *slot = config.take();
                        self.shared.readable.notify_one();
                        return WriteOutcome::Replaced;
                    }
                }
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    let now = Instant::now();
                    let remaining = deadline.saturating_duration_since(now);
                    // Timeout here just re-enters the loop, which replaces
                    let _ = tokio::time::timeout(remaining, notified).await;
                }
            }
        }
    }

    /// Take the buffered configuration, waiting up to `wait` for one to
    /// arrive. `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// [`QueueError::Timeout`] if the wait expires with the slot empty.
    pub async fn read(&self, wait: Option<Duration>) -> Result<NetworkConfig, QueueError> {
        let deadline = wait.map(|d| Instant::now() + d);

        loop {
            let notified = self.shared.readable.notified();

            {
                let mut slot = self.shared.slot.lock().await;
                if let Some(config) = slot.take() {
                    self.shared.writable.notify_one();
                    return Ok(config);
                }
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::Timeout);
                    }
                    let _ = tokio::time::timeout(deadline - now, notified).await;
                }
            }
        }
    }
}
