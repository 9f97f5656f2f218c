//! Rate-limit rule - sliding-window order throttle with automatic resume
//!
//! One rolling-window counter plus one EXCEEDED latch per live key. The
//! latch flips to EXCEEDED when the window count goes strictly above the
//! threshold (suspend actions fire once), and back to ALLOWED on the first
//! event or tick whose observed window sum is at or below it (resume
//! actions fire once). Trades and cancels are ignored.

use super::RuleResult;
use crate::actions::ActionKind;
use crate::core_types::Nanos;
use crate::dimension::{DimensionKey, DimensionMask};
use crate::error::ConfigError;
use crate::events::Order;
use crate::window::{MAX_BUCKETS, MIN_BUCKETS, RollingWindow};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rate-limit rule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitParams {
    pub rule_id: String,
    /// Max events in the window; the count must go strictly above this to
    /// trip the latch.
    pub threshold: u64,
    /// Window width in nanoseconds.
    pub window_ns: u64,
    /// Ring bucket count (64..=1024).
    pub buckets: usize,
    /// Live dimension components; others collapse to absent.
    pub dimensions: DimensionMask,
    /// Emitted on the ALLOWED -> EXCEEDED transition.
    pub suspend_actions: Vec<ActionKind>,
    /// Emitted on the EXCEEDED -> ALLOWED transition.
    pub resume_actions: Vec<ActionKind>,
}

struct KeyWindow {
    window: RollingWindow,
    exceeded: AtomicBool,
}

/// Per-rule window state, shared so a parameter update that keeps the
/// window geometry can carry live counts across a rule-set swap.
#[derive(Default)]
pub struct RateLimitState {
    keys: DashMap<DimensionKey, Arc<KeyWindow>>,
}

#[derive(Clone)]
pub struct RateLimitRule {
    params: RateLimitParams,
    state: Arc<RateLimitState>,
}

impl RateLimitRule {
    pub fn new(params: RateLimitParams) -> Result<Self, ConfigError> {
        if params.threshold == 0 {
            return Err(ConfigError::NonPositiveThreshold {
                rule_id: params.rule_id.clone(),
                threshold: 0.0,
            });
        }
        if params.buckets < MIN_BUCKETS || params.buckets > MAX_BUCKETS {
            return Err(ConfigError::BadBucketCount {
                rule_id: params.rule_id.clone(),
                buckets: params.buckets,
            });
        }
        if (params.window_ns as u128) < params.buckets as u128 {
            return Err(ConfigError::WindowTooNarrow {
                rule_id: params.rule_id.clone(),
                window_ns: params.window_ns,
                buckets: params.buckets,
            });
        }
        Ok(Self {
            params,
            state: Arc::new(RateLimitState::default()),
        })
    }

    pub fn id(&self) -> &str {
        &self.params.rule_id
    }

    pub fn params(&self) -> &RateLimitParams {
        &self.params
    }

    /// Same ring geometry - live window counts may be carried over.
    pub fn same_geometry(&self, other: &RateLimitRule) -> bool {
        self.params.window_ns == other.params.window_ns
            && self.params.buckets == other.params.buckets
    }

    /// Adopt another rule's live window state (rule-set swap with matching
    /// id, kind, and geometry). The caller checks `same_geometry` first.
    pub fn adopt_state(&mut self, other: &RateLimitRule) {
        debug_assert!(self.same_geometry(other));
        self.state = Arc::clone(&other.state);
    }

    fn key_window(&self, key: &DimensionKey) -> Arc<KeyWindow> {
        if let Some(kw) = self.state.keys.get(key) {
            return Arc::clone(kw.value());
        }
        Arc::clone(
            self.state
                .keys
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(KeyWindow {
                        window: RollingWindow::new(self.params.window_ns, self.params.buckets),
                        exceeded: AtomicBool::new(false),
                    })
                })
                .value(),
        )
    }

    fn suspend_result(&self, key: DimensionKey, count: u64) -> RuleResult {
        RuleResult {
            actions: self.params.suspend_actions.clone(),
            reasons: vec![format!(
                "order rate {} exceeded threshold {} in {}ms window on dimensions {}",
                count,
                self.params.threshold,
                self.params.window_ns / 1_000_000,
                key
            )],
            key,
            ..Default::default()
        }
    }

    fn resume_result(&self, key: DimensionKey, count: u64) -> RuleResult {
        RuleResult {
            actions: self.params.resume_actions.clone(),
            reasons: vec![format!(
                "order rate {} back within threshold {} on dimensions {}",
                count, self.params.threshold, key
            )],
            key,
            ..Default::default()
        }
    }

    pub fn on_order(&self, order: &Order, full_key: &DimensionKey) -> Option<RuleResult> {
        let key = full_key.masked(self.params.dimensions);
        let kw = self.key_window(&key);
        let count = kw.window.increment(order.timestamp);

        if count > self.params.threshold {
            if kw
                .exceeded
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(self.suspend_result(key, count));
            }
        } else if kw
            .exceeded
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return Some(self.resume_result(key, count));
        }
        None
    }

    /// Re-check every latched key at `now` without counting an event.
    /// Idempotent: a second tick with no intervening events proposes
    /// nothing new.
    pub fn tick(&self, now: Nanos) -> Vec<RuleResult> {
        let mut results = Vec::new();
        for entry in self.state.keys.iter() {
            let kw = entry.value();
            if !kw.exceeded.load(Ordering::Acquire) {
                continue;
            }
            let count = kw.window.sum(now);
            if count <= self.params.threshold
                && kw
                    .exceeded
                    .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                results.push(self.resume_result(entry.key().clone(), count));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;

    const SEC: u64 = 1_000_000_000;

    fn rule(threshold: u64) -> RateLimitRule {
        RateLimitRule::new(RateLimitParams {
            rule_id: "rate".into(),
            threshold,
            window_ns: SEC,
            buckets: 128,
            dimensions: DimensionMask::account(),
            suspend_actions: vec![ActionKind::SuspendOrdering],
            resume_actions: vec![ActionKind::ResumeOrdering],
        })
        .unwrap()
    }

    fn order(account: &str, ts: u64) -> (Order, DimensionKey) {
        let order = Order::new(ts, account, "T2303", Direction::Bid, 100.0, 1, ts);
        let key = DimensionKey {
            account_id: Some(account.into()),
            contract_id: Some("T2303".into()),
            ..Default::default()
        };
        (order, key)
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            RateLimitRule::new(RateLimitParams {
                threshold: 0,
                ..rule(1).params.clone()
            }),
            Err(ConfigError::NonPositiveThreshold { .. })
        ));
        assert!(matches!(
            RateLimitRule::new(RateLimitParams {
                buckets: 32,
                ..rule(1).params.clone()
            }),
            Err(ConfigError::BadBucketCount { .. })
        ));
        assert!(matches!(
            RateLimitRule::new(RateLimitParams {
                window_ns: 100,
                ..rule(1).params.clone()
            }),
            Err(ConfigError::WindowTooNarrow { .. })
        ));
    }

    #[test]
    fn test_suspend_on_51st_order() {
        let rule = rule(50);
        let t0 = 100 * SEC;
        for i in 0..50 {
            let (o, k) = order("A", t0 + i * 10_000_000);
            assert!(rule.on_order(&o, &k).is_none(), "order {} fired early", i);
        }
        let (o, k) = order("A", t0 + 50 * 10_000_000);
        let result = rule.on_order(&o, &k).unwrap();
        assert_eq!(result.actions, vec![ActionKind::SuspendOrdering]);
        assert_eq!(result.key.account_id.as_deref(), Some("A"));
        // Latched: further orders in the window fire nothing
        let (o, k) = order("A", t0 + 51 * 10_000_000);
        assert!(rule.on_order(&o, &k).is_none());
    }

    #[test]
    fn test_tick_resumes_after_quiet_window() {
        let rule = rule(50);
        let t0 = 100 * SEC;
        for i in 0..60 {
            let (o, k) = order("A", t0 + i * 10_000_000);
            rule.on_order(&o, &k);
        }
        // Quiet for over a second, then tick
        let results = rule.tick(t0 + 2 * SEC);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].actions, vec![ActionKind::ResumeOrdering]);

        // Idempotent: second tick proposes nothing
        assert!(rule.tick(t0 + 2 * SEC).is_empty());
    }

    #[test]
    fn test_event_driven_resume() {
        let rule = rule(50);
        let t0 = 100 * SEC;
        for i in 0..60 {
            let (o, k) = order("A", t0 + i * 10_000_000);
            rule.on_order(&o, &k);
        }
        // Next order arrives after the burst has aged out: count is small,
        // so the same call resumes
        let (o, k) = order("A", t0 + 3 * SEC);
        let result = rule.on_order(&o, &k).unwrap();
        assert_eq!(result.actions, vec![ActionKind::ResumeOrdering]);
    }

    #[test]
    fn test_accounts_independent() {
        let rule = rule(5);
        let t0 = 100 * SEC;
        for i in 0..6 {
            let (o, k) = order("A", t0 + i);
            rule.on_order(&o, &k);
        }
        // A is latched; B's window is untouched
        let (o, k) = order("B", t0 + 10);
        assert!(rule.on_order(&o, &k).is_none());
    }

    #[test]
    fn test_state_adoption_preserves_counts() {
        let old = rule(50);
        let t0 = 100 * SEC;
        for i in 0..40 {
            let (o, k) = order("A", t0 + i * 10_000_000);
            old.on_order(&o, &k);
        }

        // Tighten the threshold, keep the geometry: counts carry over
        let mut tightened = RateLimitRule::new(RateLimitParams {
            threshold: 30,
            ..old.params.clone()
        })
        .unwrap();
        assert!(tightened.same_geometry(&old));
        tightened.adopt_state(&old);

        let (o, k) = order("A", t0 + 40 * 10_000_000);
        let result = tightened.on_order(&o, &k).unwrap();
        assert_eq!(result.actions, vec![ActionKind::SuspendOrdering]);
    }
}
