//! Engine core - the ordered path from event to emitted actions
//!
//! Orchestrates enrichment, rule dispatch, action deduplication, and sink
//! emission. Free-threaded: any number of ingest threads may call the
//! `on_*` entries concurrently.
//!
//! # Event Flow
//!
//! ```text
//! ingest ──▶ validate ──▶ enrich (order index + catalog) ──▶ rule dispatch
//!                                                                │
//!                         sink callback ◀── dedup latches ◀── proposed actions
//! ```
//!
//! # Rule-Set Snapshots
//!
//! The current rule set is an immutable vector behind an `ArcSwap`. Ingest
//! threads read the handle once per event and evaluate against the
//! snapshot they obtained; updaters build a new vector and swap. Events
//! already past the handle read complete against the old set.

use crate::actions::{ActionFamily, ActionKind, ActionSink, EmittedAction};
use crate::catalog::InstrumentCatalog;
use crate::config::EngineConfig;
use crate::core_types::Nanos;
use crate::daily::DailyStats;
use crate::dimension::DimensionKey;
use crate::error::{ConfigError, EventError, SnapshotError};
use crate::events::{Cancel, Event, Order, Trade};
use crate::latch::DedupLatches;
use crate::order_index::OrderIndex;
use crate::rules::{RateLimitParams, RateLimitRule, Rule, RuleCtx, RuleResult, ThresholdRule};
use crate::snapshot;
use arc_swap::ArcSwap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Rule id attached to engine-level diagnostics (fatal invariant alerts).
pub const ENGINE_RULE_ID: &str = "__engine__";

// ============================================================
// DIAGNOSTICS
// ============================================================

/// Engine diagnostic counters. Relaxed atomics; nothing in the core
/// depends on them.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub orders_processed: AtomicU64,
    pub trades_processed: AtomicU64,
    pub cancels_processed: AtomicU64,
    pub malformed_events: AtomicU64,
    pub actions_emitted: AtomicU64,
    pub actions_deduped: AtomicU64,
    pub actions_dropped_no_subject: AtomicU64,
    pub latch_transitions: AtomicU64,
    pub sink_errors: AtomicU64,
    pub rule_panics: AtomicU64,
    pub ticks: AtomicU64,
}

/// Plain-value copy of [`EngineStats`] for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsView {
    pub orders_processed: u64,
    pub trades_processed: u64,
    pub cancels_processed: u64,
    pub malformed_events: u64,
    pub actions_emitted: u64,
    pub actions_deduped: u64,
    pub actions_dropped_no_subject: u64,
    pub latch_transitions: u64,
    pub sink_errors: u64,
    pub rule_panics: u64,
    pub ticks: u64,
}

impl EngineStats {
    fn view(&self) -> EngineStatsView {
        EngineStatsView {
            orders_processed: self.orders_processed.load(Ordering::Relaxed),
            trades_processed: self.trades_processed.load(Ordering::Relaxed),
            cancels_processed: self.cancels_processed.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            actions_emitted: self.actions_emitted.load(Ordering::Relaxed),
            actions_deduped: self.actions_deduped.load(Ordering::Relaxed),
            actions_dropped_no_subject: self.actions_dropped_no_subject.load(Ordering::Relaxed),
            latch_transitions: self.latch_transitions.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            rule_panics: self.rule_panics.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================
// RISK ENGINE
// ============================================================

/// The in-process risk-control engine. Owns all statistics, latch, and
/// index state; multiple engines may coexist in one process.
pub struct RiskEngine {
    catalog: ArcSwap<InstrumentCatalog>,
    daily: DailyStats,
    order_index: OrderIndex,
    latches: DedupLatches,
    rules: ArcSwap<Vec<Rule>>,
    sink: Arc<dyn ActionSink>,
    stats: EngineStats,
    /// Serializes rule-set mutation; reads stay lock-free.
    rule_update_lock: Mutex<()>,
    default_buckets: usize,
}

impl RiskEngine {
    pub fn new(
        config: EngineConfig,
        catalog: InstrumentCatalog,
        sink: Arc<dyn ActionSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog: ArcSwap::from_pointee(catalog),
            daily: DailyStats::new(config.num_shards)?,
            order_index: OrderIndex::new(config.order_index_capacity),
            latches: DedupLatches::new(),
            rules: ArcSwap::from_pointee(Vec::new()),
            sink,
            stats: EngineStats::default(),
            rule_update_lock: Mutex::new(()),
            default_buckets: config.default_buckets,
        })
    }

    // ============================================================
    // EVENT ENTRIES
    // ============================================================

    pub fn on_order(&self, order: &Order) -> Result<(), EventError> {
        order.validate().inspect_err(|_| {
            EngineStats::incr(&self.stats.malformed_events);
        })?;
        EngineStats::incr(&self.stats.orders_processed);

        self.order_index
            .insert(order.order_id, &order.account_id, &order.contract_id);

        let full_key = self.catalog.load().resolve(
            Some(&order.account_id),
            Some(&order.contract_id),
            order.exchange_id.as_deref(),
            order.account_group_id.as_deref(),
        );

        let rules = self.rules.load();
        let ctx = RuleCtx { daily: &self.daily };
        for rule in rules.iter() {
            match catch_unwind(AssertUnwindSafe(|| rule.on_order(&ctx, order, &full_key))) {
                Ok(Some(result)) => {
                    self.dispatch(rule.id(), result, &full_key, Some(Event::Order(order.clone())));
                }
                Ok(None) => {}
                Err(_) => {
                    self.fatal_invariant(rule.id(), "rule panicked in on_order");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn on_trade(&self, trade: &Trade) -> Result<(), EventError> {
        trade.validate().inspect_err(|_| {
            EngineStats::incr(&self.stats.malformed_events);
        })?;
        EngineStats::incr(&self.stats.trades_processed);

        let enriched = self.enrich_trade(trade);
        let full_key = self.catalog.load().resolve(
            enriched.account_id.as_deref(),
            enriched.contract_id.as_deref(),
            enriched.exchange_id.as_deref(),
            enriched.account_group_id.as_deref(),
        );

        let rules = self.rules.load();
        let ctx = RuleCtx { daily: &self.daily };
        for rule in rules.iter() {
            match catch_unwind(AssertUnwindSafe(|| rule.on_trade(&ctx, &enriched, &full_key))) {
                Ok(Some(result)) => {
                    self.dispatch(
                        rule.id(),
                        result,
                        &full_key,
                        Some(Event::Trade(enriched.clone())),
                    );
                }
                Ok(None) => {}
                Err(_) => {
                    self.fatal_invariant(rule.id(), "rule panicked in on_trade");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn on_cancel(&self, cancel: &Cancel) -> Result<(), EventError> {
        cancel.validate().inspect_err(|_| {
            EngineStats::incr(&self.stats.malformed_events);
        })?;
        EngineStats::incr(&self.stats.cancels_processed);

        let enriched = self.enrich_cancel(cancel);
        let full_key = self.catalog.load().resolve(
            enriched.account_id.as_deref(),
            enriched.contract_id.as_deref(),
            enriched.exchange_id.as_deref(),
            enriched.account_group_id.as_deref(),
        );

        let rules = self.rules.load();
        let ctx = RuleCtx { daily: &self.daily };
        for rule in rules.iter() {
            match catch_unwind(AssertUnwindSafe(|| rule.on_cancel(&ctx, &enriched, &full_key))) {
                Ok(Some(result)) => {
                    self.dispatch(
                        rule.id(),
                        result,
                        &full_key,
                        Some(Event::Cancel(enriched.clone())),
                    );
                }
                Ok(None) => {}
                Err(_) => {
                    self.fatal_invariant(rule.id(), "rule panicked in on_cancel");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Re-evaluate rate-limit latches at `now_ns` in the absence of
    /// events. Idempotent.
    pub fn tick(&self, now_ns: Nanos) {
        EngineStats::incr(&self.stats.ticks);
        let rules = self.rules.load();
        for rule in rules.iter() {
            for result in rule.tick(now_ns) {
                let key = result.key.clone();
                self.dispatch(rule.id(), result, &key, None);
            }
        }
    }

    // ============================================================
    // ENRICHMENT
    // ============================================================

    /// Fill missing account/contract from the originating order. An oid
    /// that has aged out of the index leaves the event as-is.
    fn enrich_trade(&self, trade: &Trade) -> Trade {
        if trade.account_id.is_some() && trade.contract_id.is_some() {
            return trade.clone();
        }
        let mut enriched = trade.clone();
        if let Some(origin) = self.order_index.get(trade.order_id) {
            enriched
                .account_id
                .get_or_insert_with(|| origin.account_id.clone());
            enriched
                .contract_id
                .get_or_insert_with(|| origin.contract_id.clone());
        }
        enriched
    }

    fn enrich_cancel(&self, cancel: &Cancel) -> Cancel {
        if cancel.account_id.is_some() && cancel.contract_id.is_some() {
            return cancel.clone();
        }
        let mut enriched = cancel.clone();
        if let Some(origin) = self.order_index.get(cancel.order_id) {
            enriched
                .account_id
                .get_or_insert_with(|| origin.account_id.clone());
            enriched
                .contract_id
                .get_or_insert_with(|| origin.contract_id.clone());
        }
        enriched
    }

    // ============================================================
    // ACTION DISPATCH
    // ============================================================

    fn dispatch(
        &self,
        rule_id: &str,
        result: RuleResult,
        full_key: &DimensionKey,
        event: Option<Event>,
    ) {
        let reason = result.reasons.first().cloned();
        for kind in &result.actions {
            match kind.latch_edge() {
                None => {
                    // Pass-through kinds are always forwarded
                    self.emit(EmittedAction {
                        kind: *kind,
                        rule_id: rule_id.to_string(),
                        subject: None,
                        event: event.clone(),
                        reason: reason.clone(),
                    });
                }
                Some((family, edge)) => {
                    let Some(subject) = Self::subject_for(family, &result.key, full_key) else {
                        EngineStats::incr(&self.stats.actions_dropped_no_subject);
                        warn!(rule_id, action = %kind, "no subject for latched action; dropped");
                        continue;
                    };
                    if self.latches.propose(&subject, family, edge) {
                        EngineStats::incr(&self.stats.latch_transitions);
                        self.emit(EmittedAction {
                            kind: *kind,
                            rule_id: rule_id.to_string(),
                            subject: Some(subject),
                            event: event.clone(),
                            reason: reason.clone(),
                        });
                    } else {
                        EngineStats::incr(&self.stats.actions_deduped);
                    }
                }
            }
        }
    }

    /// Latch subject for an action family: the rule's fired key wins,
    /// falling back to the event's fully-resolved key.
    fn subject_for(
        family: ActionFamily,
        fired_key: &DimensionKey,
        full_key: &DimensionKey,
    ) -> Option<String> {
        let pick = |a: &Option<String>, b: &Option<String>| a.clone().or_else(|| b.clone());
        match family {
            ActionFamily::AccountTrading | ActionFamily::Ordering => {
                pick(&fired_key.account_id, &full_key.account_id)
            }
            ActionFamily::Contract => pick(&fired_key.contract_id, &full_key.contract_id),
            ActionFamily::Product => pick(&fired_key.product_id, &full_key.product_id),
        }
    }

    fn emit(&self, action: EmittedAction) {
        debug!(kind = %action.kind, rule_id = %action.rule_id, subject = ?action.subject, "emit action");
        match self.sink.emit(&action) {
            Ok(()) => {
                EngineStats::incr(&self.stats.actions_emitted);
            }
            Err(e) => {
                // State mutations already happened; record and move on
                EngineStats::incr(&self.stats.sink_errors);
                error!(kind = %action.kind, rule_id = %action.rule_id, %e, "action sink failed");
            }
        }
    }

    /// Fatal diagnostic path: alert through the sink with the engine rule
    /// id and stop processing the current event.
    fn fatal_invariant(&self, rule_id: &str, msg: &str) {
        EngineStats::incr(&self.stats.rule_panics);
        error!(rule_id, msg, "invariant violation");
        self.emit(EmittedAction {
            kind: ActionKind::Alert,
            rule_id: ENGINE_RULE_ID.to_string(),
            subject: None,
            event: None,
            reason: Some(format!("invariant violation in rule {}: {}", rule_id, msg)),
        });
    }

    // ============================================================
    // RULE MANAGEMENT
    // ============================================================

    pub fn add_rule(&self, rule: Rule) -> Result<(), ConfigError> {
        let _guard = self.rule_update_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.rules.load_full();
        if current.iter().any(|r| r.id() == rule.id()) {
            return Err(ConfigError::DuplicateRuleId(rule.id().to_string()));
        }
        let mut next = current.as_ref().clone();
        next.push(rule);
        self.rules.store(Arc::new(next));
        Ok(())
    }

    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let _guard = self.rule_update_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.rules.load_full();
        let next: Vec<Rule> = current
            .iter()
            .filter(|r| r.id() != rule_id)
            .cloned()
            .collect();
        let removed = next.len() != current.len();
        if removed {
            self.rules.store(Arc::new(next));
        }
        removed
    }

    /// Atomically replace the whole rule set. Rate-limit rules adopt the
    /// live window state of their predecessor when id, kind, and ring
    /// geometry all match; a geometry change resets the counts and is
    /// reported through the sink.
    pub fn replace_rules(&self, mut new_rules: Vec<Rule>) -> Result<(), ConfigError> {
        for (i, rule) in new_rules.iter().enumerate() {
            if new_rules[..i].iter().any(|r| r.id() == rule.id()) {
                return Err(ConfigError::DuplicateRuleId(rule.id().to_string()));
            }
        }
        let _guard = self.rule_update_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.rules.load_full();
        for rule in new_rules.iter_mut() {
            if let Rule::RateLimit(new_rl) = rule {
                let predecessor = current.iter().find_map(|r| match r {
                    Rule::RateLimit(old_rl) if old_rl.id() == new_rl.id() => Some(old_rl),
                    _ => None,
                });
                if let Some(old_rl) = predecessor {
                    if new_rl.same_geometry(old_rl) {
                        new_rl.adopt_state(old_rl);
                    } else {
                        self.emit(EmittedAction {
                            kind: ActionKind::Alert,
                            rule_id: new_rl.id().to_string(),
                            subject: None,
                            event: None,
                            reason: Some(
                                "rate-limit window reconfigured; live counts reset".to_string(),
                            ),
                        });
                    }
                }
            }
        }
        self.rules.store(Arc::new(new_rules));
        Ok(())
    }

    /// Convenience mutator: rebuild a rate-limit rule with a new threshold
    /// and/or window and swap it in.
    pub fn update_rate_limit(
        &self,
        rule_id: &str,
        threshold: Option<u64>,
        window_ns: Option<u64>,
    ) -> Result<(), ConfigError> {
        let current = self.rules.load_full();
        let old = current
            .iter()
            .find(|r| r.id() == rule_id)
            .ok_or_else(|| ConfigError::NoSuchRule(rule_id.to_string()))?;
        let Rule::RateLimit(old_rl) = old else {
            return Err(ConfigError::KindMismatch(rule_id.to_string()));
        };
        let params = RateLimitParams {
            threshold: threshold.unwrap_or(old_rl.params().threshold),
            window_ns: window_ns.unwrap_or(old_rl.params().window_ns),
            ..old_rl.params().clone()
        };
        let updated = RateLimitRule::new(params)?;

        let mut next = current.as_ref().clone();
        for rule in next.iter_mut() {
            if rule.id() == rule_id {
                *rule = Rule::RateLimit(updated);
                break;
            }
        }
        self.replace_rules(next)
    }

    /// Convenience mutator for threshold rules.
    pub fn update_volume_limit(
        &self,
        rule_id: &str,
        threshold: Option<f64>,
        dimensions: Option<crate::dimension::DimensionMask>,
    ) -> Result<(), ConfigError> {
        let current = self.rules.load_full();
        let old = current
            .iter()
            .find(|r| r.id() == rule_id)
            .ok_or_else(|| ConfigError::NoSuchRule(rule_id.to_string()))?;
        let Rule::Threshold(old_th) = old else {
            return Err(ConfigError::KindMismatch(rule_id.to_string()));
        };
        let mut params = old_th.params().clone();
        if let Some(t) = threshold {
            params.threshold = t;
        }
        if let Some(d) = dimensions {
            params.dimensions = d;
        }
        let updated = ThresholdRule::new(params)?;

        let mut next = current.as_ref().clone();
        for rule in next.iter_mut() {
            if rule.id() == rule_id {
                *rule = Rule::Threshold(updated);
                break;
            }
        }
        self.replace_rules(next)
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.rules
            .load()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    // ============================================================
    // SNAPSHOT / RESTORE
    // ============================================================

    /// Serialize catalog, daily counters, and dedup latches. Rolling
    /// windows are volatile and re-warm after restart.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        let catalog = self.catalog.load();
        snapshot::encode(&catalog, &self.daily.export(), &self.latches.export())
    }

    /// Atomic restore: the blob is fully decoded before any state is
    /// touched. Caller must have quiesced ingest.
    pub fn restore(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let decoded = snapshot::decode(bytes)?;
        if let Some((products, exchanges)) = decoded.catalog {
            self.catalog
                .store(Arc::new(InstrumentCatalog::new(products, exchanges)));
        }
        self.daily.load(&decoded.daily);
        self.latches.load(&decoded.latches);
        Ok(())
    }

    // ============================================================
    // INSPECTION
    // ============================================================

    pub fn stats(&self) -> EngineStatsView {
        self.stats.view()
    }

    pub fn daily_stats(&self) -> &DailyStats {
        &self.daily
    }

    pub fn latches(&self) -> &DedupLatches {
        &self.latches
    }

    pub fn default_buckets(&self) -> usize {
        self.default_buckets
    }
}
