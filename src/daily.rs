//! Daily multi-dimensional counter
//!
//! Per-day aggregates of (dimension key, metric) -> scalar, built on the
//! sharded substrate with composite key (dimension key, day id). Rollover
//! is implicit: a new UTC day routes to fresh zero-valued entries, and old
//! days simply stop being written.

use crate::core_types::{DayId, Nanos, day_of};
use crate::dimension::DimensionKey;
use crate::error::ConfigError;
use crate::metric::Metric;
use crate::sharded::ShardedStats;

/// One daily aggregate entry, as exported for snapshots.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DailyEntry {
    pub key: DimensionKey,
    pub day: DayId,
    pub metric: Metric,
    pub value: f64,
}

/// Daily statistics keyed by (dimension key, day id).
pub struct DailyStats {
    stats: ShardedStats<(DimensionKey, DayId)>,
}

impl DailyStats {
    pub fn new(num_shards: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            stats: ShardedStats::new(num_shards)?,
        })
    }

    /// Accumulate `value` into (key, metric) for the day `ts` falls in;
    /// returns the post-increment aggregate.
    #[inline]
    pub fn add(&self, key: &DimensionKey, metric: Metric, value: f64, ts: Nanos) -> f64 {
        self.stats
            .accumulate(&(key.clone(), day_of(ts)), metric, value)
    }

    /// Current aggregate for (key, metric) on the day `ts` falls in.
    #[inline]
    pub fn get(&self, key: &DimensionKey, metric: Metric, ts: Nanos) -> f64 {
        self.stats.get(&(key.clone(), day_of(ts)), metric)
    }

    /// Current aggregate for an explicit day id.
    #[inline]
    pub fn get_on_day(&self, key: &DimensionKey, metric: Metric, day: DayId) -> f64 {
        self.stats.get(&(key.clone(), day), metric)
    }

    /// Export all non-zero entries (snapshot path).
    pub fn export(&self) -> Vec<DailyEntry> {
        let mut out = Vec::new();
        self.stats.for_each(|(key, day), cell| {
            for metric in Metric::ALL {
                let value = cell.get(metric);
                if value != 0.0 {
                    out.push(DailyEntry {
                        key: key.clone(),
                        day: *day,
                        metric,
                        value,
                    });
                }
            }
        });
        out
    }

    /// Replace all entries (restore path; caller must have quiesced ingest).
    pub fn load(&self, entries: &[DailyEntry]) {
        self.stats.clear();
        for e in entries {
            let cell = self.stats.cell(&(e.key.clone(), e.day));
            cell.set(e.metric, e.value);
        }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::NS_PER_DAY;
    use crate::dimension::DimensionMask;

    fn account_key(account: &str) -> DimensionKey {
        DimensionKey {
            account_id: Some(account.to_string()),
            ..Default::default()
        }
        .masked(DimensionMask::account())
    }

    #[test]
    fn test_add_and_get_same_day() {
        let daily = DailyStats::new(8).unwrap();
        let key = account_key("A");
        let ts = 1_700_000_000_000_000_000;

        assert_eq!(daily.add(&key, Metric::TradeVolume, 150.0, ts), 150.0);
        assert_eq!(daily.add(&key, Metric::TradeVolume, 150.0, ts + 1), 300.0);
        assert_eq!(daily.get(&key, Metric::TradeVolume, ts), 300.0);
    }

    #[test]
    fn test_day_rollover_starts_fresh() {
        let daily = DailyStats::new(8).unwrap();
        let key = account_key("A");
        let just_before = 5 * NS_PER_DAY - 1;
        let just_after = 5 * NS_PER_DAY;

        assert_eq!(daily.add(&key, Metric::TradeVolume, 900.0, just_before), 900.0);
        // New day: aggregate restarts from zero without any reset call
        assert_eq!(daily.add(&key, Metric::TradeVolume, 200.0, just_after), 200.0);
        assert_eq!(daily.get(&key, Metric::TradeVolume, just_before), 900.0);
        assert_eq!(daily.get(&key, Metric::TradeVolume, just_after), 200.0);
    }

    #[test]
    fn test_export_load_roundtrip() {
        let daily = DailyStats::new(8).unwrap();
        let a = account_key("A");
        let b = account_key("B");
        daily.add(&a, Metric::TradeVolume, 100.0, 0);
        daily.add(&a, Metric::TradeNotional, 5000.0, 0);
        daily.add(&b, Metric::OrderCount, 3.0, NS_PER_DAY);

        let entries = daily.export();
        assert_eq!(entries.len(), 3);

        let restored = DailyStats::new(16).unwrap();
        restored.load(&entries);
        assert_eq!(restored.get_on_day(&a, Metric::TradeVolume, 0), 100.0);
        assert_eq!(restored.get_on_day(&a, Metric::TradeNotional, 0), 5000.0);
        assert_eq!(restored.get_on_day(&b, Metric::OrderCount, 1), 3.0);
    }
}
