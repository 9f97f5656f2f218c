//! Sharded statistics map - the concurrent counter substrate
//!
//! A fixed power-of-two array of shards; a key routes to shard
//! `fnv1a(key) & (N - 1)`. Each shard guards its key map with a `RwLock`;
//! the per-key metric cell is a dense array of atomic scalars, so once a
//! key exists, accumulation never touches the shard lock.
//!
//! # Concurrency contract
//!
//! - Concurrent accumulates on disjoint keys do not serialize.
//! - Concurrent accumulates on the same (key, metric) linearize and each
//!   addition is applied exactly once (CAS loop on the scalar bits).
//! - Inserting a new key briefly takes the shard's write lock.

use crate::error::ConfigError;
use crate::metric::{METRIC_COUNT, Metric};
use fnv::FnvHasher;
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Default shard count - enough to keep ingest threads off each other's
/// locks at 10^6 events/sec.
pub const DEFAULT_SHARDS: usize = 64;

// ============================================================
// METRIC CELL
// ============================================================

/// Per-key accumulator block: one f64 scalar per metric kind, carried in
/// `AtomicU64` bit-casts. Zero bits are f64 0.0, so fresh cells need no
/// initialization pass.
#[derive(Debug, Default)]
pub struct MetricCell {
    slots: [AtomicU64; METRIC_COUNT],
}

impl MetricCell {
    /// Add `delta` to the scalar for `metric`, returning the post-add value.
    ///
    /// A CAS loop on the raw bits makes the addition a single atomic
    /// transition for this (key, metric) pair.
    pub fn add(&self, metric: Metric, delta: f64) -> f64 {
        let slot = &self.slots[metric.index()];
        let mut cur = slot.load(Ordering::Relaxed);
        loop {
            let next = f64::from_bits(cur) + delta;
            match slot.compare_exchange_weak(
                cur,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => cur = actual,
            }
        }
    }

    #[inline]
    pub fn get(&self, metric: Metric) -> f64 {
        f64::from_bits(self.slots[metric.index()].load(Ordering::Acquire))
    }

    /// Overwrite a scalar (restore path only; callers must have quiesced).
    pub fn set(&self, metric: Metric, value: f64) {
        self.slots[metric.index()].store(value.to_bits(), Ordering::Release);
    }
}

// ============================================================
// SHARDED MAP
// ============================================================

struct Shard<K> {
    cells: RwLock<FxHashMap<K, Arc<MetricCell>>>,
}

impl<K> Default for Shard<K> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(FxHashMap::default()),
        }
    }
}

/// Concurrent key -> metric-cell map partitioned into hash shards.
pub struct ShardedStats<K> {
    shards: Box<[Shard<K>]>,
    mask: u64,
}

impl<K: Hash + Eq + Clone> ShardedStats<K> {
    pub fn new(num_shards: usize) -> Result<Self, ConfigError> {
        if num_shards == 0 || !num_shards.is_power_of_two() {
            return Err(ConfigError::BadShardCount(num_shards));
        }
        let shards = (0..num_shards).map(|_| Shard::default()).collect();
        Ok(Self {
            shards,
            mask: (num_shards - 1) as u64,
        })
    }

    #[inline]
    fn shard(&self, key: &K) -> &Shard<K> {
        let mut hasher = FnvHasher::default();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() & self.mask) as usize]
    }

    /// Handle to the per-key metric cell, creating it on first access.
    pub fn cell(&self, key: &K) -> Arc<MetricCell> {
        let shard = self.shard(key);
        {
            let cells = shard.cells.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = cells.get(key) {
                return Arc::clone(cell);
            }
        }
        let mut cells = shard.cells.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(key.clone()).or_default())
    }

    /// Add `delta` at (key, metric), creating the key as needed; returns
    /// the post-increment value.
    pub fn accumulate(&self, key: &K, metric: Metric, delta: f64) -> f64 {
        self.cell(key).add(metric, delta)
    }

    /// Read-only: current value, or 0 for unknown keys.
    pub fn get(&self, key: &K, metric: Metric) -> f64 {
        let shard = self.shard(key);
        let cells = shard.cells.read().unwrap_or_else(|e| e.into_inner());
        cells.get(key).map(|c| c.get(metric)).unwrap_or(0.0)
    }

    /// Visit every (key, cell) pair. Takes each shard's read lock in turn;
    /// intended for snapshot export, not the hot path.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &MetricCell)) {
        for shard in &self.shards {
            let cells = shard.cells.read().unwrap_or_else(|e| e.into_inner());
            for (key, cell) in cells.iter() {
                visit(key, cell);
            }
        }
    }

    /// Drop every entry (restore path only).
    pub fn clear(&self) {
        for shard in &self.shards {
            shard
                .cells
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
        }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.cells.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
