//! Rolling window counter - fixed-bucket ring over a sliding time window
//!
//! B fixed-width buckets cover a window of width W nanoseconds. Each bucket
//! is a (start, count) pair in native-word atomics, so increments and sums
//! are lock-free.
//!
//! # Semantics
//!
//! - Bucket index `(ts / (W/B)) % B`, bucket start `(ts / (W/B)) * (W/B)`.
//! - A bucket whose stored start is older than the incoming start is
//!   recycled: start advances, count restarts at zero.
//! - Window sum at `t` = sum of counts of buckets whose start lies in
//!   `[t - W + 1, t]`; the approximation error is bounded by one bucket
//!   width.
//! - Events older than a slot's live start never rewind it; they count
//!   under the live start (the arrival-bucket approximation) and are never
//!   dropped. Strict ordering is outside this counter's contract.

use crate::core_types::Nanos;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default bucket count for rate-limit windows.
pub const DEFAULT_BUCKETS: usize = 128;

/// Bucket count bounds.
pub const MIN_BUCKETS: usize = 64;
pub const MAX_BUCKETS: usize = 1024;

#[derive(Debug, Default)]
struct Bucket {
    start: AtomicU64,
    count: AtomicU64,
}

/// Lock-free per-key event counter over a sliding window.
#[derive(Debug)]
pub struct RollingWindow {
    window_ns: u64,
    bucket_width: u64,
    buckets: Box<[Bucket]>,
}

impl RollingWindow {
    /// `window_ns / buckets` must be at least 1ns; validated at rule
    /// construction.
    pub fn new(window_ns: u64, buckets: usize) -> Self {
        debug_assert!(buckets > 0 && window_ns as u128 >= buckets as u128);
        Self {
            window_ns,
            bucket_width: window_ns / buckets as u64,
            buckets: (0..buckets).map(|_| Bucket::default()).collect(),
        }
    }

    pub fn window_ns(&self) -> u64 {
        self.window_ns
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Count one event at `ts` and return the current window sum.
    pub fn increment(&self, ts: Nanos) -> u64 {
        let slot = (ts / self.bucket_width) as usize % self.buckets.len();
        let start = (ts / self.bucket_width) * self.bucket_width;
        let bucket = &self.buckets[slot];

        let stored = bucket.start.load(Ordering::Acquire);
        if start > stored {
            // Recycle: only ever advance the start, so a stale event can
            // never wipe a live bucket.
            if bucket
                .start
                .compare_exchange(stored, start, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                bucket.count.store(0, Ordering::Release);
            }
        }
        bucket.count.fetch_add(1, Ordering::AcqRel);

        self.sum(ts)
    }

    /// Current window sum at `ts` without counting an event (tick path).
    pub fn sum(&self, ts: Nanos) -> u64 {
        let lo = (ts + 1).saturating_sub(self.window_ns);
        let mut total = 0u64;
        for bucket in &self.buckets {
            let start = bucket.start.load(Ordering::Acquire);
            if start >= lo && start <= ts {
                total += bucket.count.load(Ordering::Acquire);
            }
        }
        total
    }
}
