//! Bounded dispatch queue.
//!
//! The frame loop pushes alerts without awaiting the network; a single
//! worker task drains the queue through an [`AlertDispatcher`]. When the
//! queue is full the oldest pending alert is dropped and counted.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sentinel_models::AlertEvent;

use crate::dispatcher::AlertDispatcher;
use crate::error::{DispatchError, DispatchResult};
use crate::metrics::{record_alert_dropped, record_dispatch};

/// Default number of pending alerts held before dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Counters exposed through pipeline status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub pending: usize,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct QueueInner {
    pending: Mutex<VecDeque<AlertEvent>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl QueueInner {
    fn pop(&self) -> Option<AlertEvent> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

/// Handle to the queue and its worker task.
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    /// Create the queue and spawn its worker on the current Tokio runtime.
    pub fn spawn(dispatcher: Arc<dyn AlertDispatcher>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let inner = Arc::new(QueueInner {
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = tokio::spawn(async move {
            Self::run_worker(worker_inner, dispatcher).await;
        });

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn run_worker(inner: Arc<QueueInner>, dispatcher: Arc<dyn AlertDispatcher>) {
        debug!(capacity = inner.capacity, "Dispatch worker started");
        loop {
            match inner.pop() {
                Some(event) => {
                    // A panicking dispatcher counts as a failed delivery
                    let send = AssertUnwindSafe(dispatcher.send(&event)).catch_unwind();
                    let delivered = match send.await {
                        Ok(delivered) => delivered,
                        Err(_) => {
                            error!(class_id = %event.class_id, "Alert dispatcher panicked");
                            false
                        }
                    };
                    record_dispatch(delivered);
                    if delivered {
                        inner.delivered.fetch_add(1, Ordering::Relaxed);
                    } else {
                        inner.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None if inner.closed.load(Ordering::Acquire) => break,
                None => inner.notify.notified().await,
            }
        }
        debug!("Dispatch worker stopped");
    }

    /// Enqueue an alert without waiting for delivery.
    ///
    /// Returns the alert evicted to make room, if the queue was full.
    pub fn push(&self, event: AlertEvent) -> DispatchResult<Option<AlertEvent>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }

        let evicted = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let evicted = if pending.len() >= self.inner.capacity {
                pending.pop_front()
            } else {
                None
            };
            pending.push_back(event);
            evicted
        };

        if let Some(old) = &evicted {
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            record_alert_dropped();
            warn!(
                class_id = %old.class_id,
                kind = %old.kind,
                dropped_total = dropped,
                "Dispatch queue full, dropped oldest alert"
            );
        }

        self.inner.notify.notify_one();
        Ok(evicted)
    }

    pub fn stats(&self) -> DispatchStats {
        let pending = self
            .inner
            .pending
            .lock()
            .map(|p| p.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        DispatchStats {
            pending,
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Stop accepting alerts, let the worker drain what is queued, and wait
    /// for it to exit. Later calls return immediately.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!("Dispatch worker ended abnormally: {}", e);
            }
            let stats = self.stats();
            info!(
                delivered = stats.delivered,
                failed = stats.failed,
                dropped = stats.dropped,
                "Dispatch queue shut down"
            );
        }
    }
}
