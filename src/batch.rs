//! Batch ingest front-end - lock-free queue adapter over the engine
//!
//! Optional amortization layer: producers enqueue events into a ring
//! buffer (crossbeam-queue::ArrayQueue) and one drain thread invokes the
//! synchronous engine per event. Adds no semantics; the engine behaves
//! exactly as if callers invoked it directly.
//!
//! ```text
//! producer threads ──▶ event_queue ──▶ drain thread ──▶ RiskEngine::on_*
//! ```
//!
//! Backpressure: submit spin-waits when the queue is full (prefer latency
//! over drops). Shutdown drains the queue before the thread exits.

use crate::engine::RiskEngine;
use crate::events::Event;
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Capacity for the event queue. Large enough to absorb bursts without
/// stalling producers.
pub const EVENT_QUEUE_CAPACITY: usize = 16384;

// ============================================================
// SHUTDOWN SIGNAL
// ============================================================

/// Cooperative shutdown flag shared between producers and the drain loop.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

// ============================================================
// BATCH STATISTICS
// ============================================================

/// Counters for the ingest adapter.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub events_ingested: AtomicU64,
    pub events_drained: AtomicU64,
    pub events_rejected: AtomicU64,
    pub backpressure_events: AtomicU64,
}

impl BatchStats {
    pub fn incr_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_drained(&self) {
        self.events_drained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================
// BATCH INGEST
// ============================================================

/// Queue front-end with one drain thread.
pub struct BatchIngest {
    queue: Arc<ArrayQueue<Event>>,
    stats: Arc<BatchStats>,
    shutdown: Arc<ShutdownSignal>,
    drain: Option<JoinHandle<()>>,
}

impl BatchIngest {
    /// Spawn the drain thread over `engine`.
    pub fn start(engine: Arc<RiskEngine>, capacity: usize) -> Self {
        let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
        let stats = Arc::new(BatchStats::default());
        let shutdown = Arc::new(ShutdownSignal::new());

        let drain_queue = Arc::clone(&queue);
        let drain_stats = Arc::clone(&stats);
        let drain_shutdown = Arc::clone(&shutdown);
        let drain: JoinHandle<()> = thread::spawn(move || {
            let mut spin_count = 0u32;

            loop {
                let mut did_work = false;

                if let Some(event) = drain_queue.pop() {
                    did_work = true;
                    let outcome = match &event {
                        Event::Order(order) => engine.on_order(order),
                        Event::Trade(trade) => engine.on_trade(trade),
                        Event::Cancel(cancel) => engine.on_cancel(cancel),
                    };
                    match outcome {
                        Ok(()) => drain_stats.incr_drained(),
                        Err(e) => {
                            // Malformed input: no retry, caller resubmits
                            drain_stats.incr_rejected();
                            warn!(%e, "rejected malformed event");
                        }
                    }
                }

                if drain_shutdown.is_shutdown_requested() && drain_queue.is_empty() {
                    break;
                }

                // Spin/yield if no work
                if !did_work {
                    spin_count += 1;
                    if spin_count > 100 {
                        thread::yield_now();
                        spin_count = 0;
                    } else {
                        std::hint::spin_loop();
                    }
                } else {
                    spin_count = 0;
                }
            }
        });

        Self {
            queue,
            stats,
            shutdown,
            drain: Some(drain),
        }
    }

    /// Enqueue, spin-waiting on a full queue (backpressure).
    pub fn submit(&self, event: Event) {
        let mut pending = event;
        loop {
            match self.queue.push(pending) {
                Ok(()) => break,
                Err(back) => {
                    self.stats.incr_backpressure();
                    pending = back;
                    std::hint::spin_loop();
                }
            }
        }
        self.stats.incr_ingested();
    }

    /// Non-blocking enqueue; hands the event back when the queue is full.
    pub fn try_submit(&self, event: Event) -> Result<(), Event> {
        match self.queue.push(event) {
            Ok(()) => {
                self.stats.incr_ingested();
                Ok(())
            }
            Err(back) => {
                self.stats.incr_backpressure();
                Err(back)
            }
        }
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Drain the queue and stop the worker.
    pub fn shutdown(mut self) {
        self.shutdown.request_shutdown();
        if let Some(handle) = self.drain.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BatchIngest {
    fn drop(&mut self) {
        self.shutdown.request_shutdown();
        if let Some(handle) = self.drain.take() {
            let _ = handle.join();
        }
    }
}
