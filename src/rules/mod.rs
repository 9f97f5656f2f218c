//! Rule interface and built-in rules
//!
//! Rules are values of a small tagged union so the engine can hold the
//! current set in an immutable, atomically-swapped vector. A rule is a
//! pure function of (context, event); the only rule-owned state is the
//! rate-limit rule's per-key window rings, which the rule guards with
//! per-key atomics.

pub mod rate_limit;
pub mod threshold;

pub use rate_limit::{RateLimitParams, RateLimitRule};
pub use threshold::{ThresholdParams, ThresholdRule};

use crate::core_types::Nanos;
use crate::daily::DailyStats;
use crate::dimension::DimensionKey;
use crate::events::{Cancel, Order, Trade};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Evaluation context handed to every rule entry point. The engine owns
/// the statistics substrate; rules only read and accumulate through it.
pub struct RuleCtx<'a> {
    pub daily: &'a DailyStats,
}

/// Outcome of one rule evaluation: the actions to propose, human-readable
/// reasons, free-form metadata, and the (masked) dimension key the rule
/// fired on - the engine derives action subjects from it.
#[derive(Debug, Clone, Default)]
pub struct RuleResult {
    pub actions: Vec<crate::actions::ActionKind>,
    pub reasons: Vec<String>,
    pub metadata: FxHashMap<String, String>,
    pub key: DimensionKey,
}

/// Capability seam for user-defined rules.
///
/// Default entry points return nothing, so a custom rule implements only
/// the events it cares about.
pub trait CustomRule: Send + Sync {
    fn id(&self) -> &str;

    fn on_order(&self, _ctx: &RuleCtx<'_>, _order: &Order, _key: &DimensionKey) -> Option<RuleResult> {
        None
    }

    fn on_trade(&self, _ctx: &RuleCtx<'_>, _trade: &Trade, _key: &DimensionKey) -> Option<RuleResult> {
        None
    }

    fn on_cancel(&self, _ctx: &RuleCtx<'_>, _cancel: &Cancel, _key: &DimensionKey) -> Option<RuleResult> {
        None
    }

    fn tick(&self, _now: Nanos) -> Vec<RuleResult> {
        Vec::new()
    }
}

/// Tagged rule variant held in the engine's rule-set snapshot.
#[derive(Clone)]
pub enum Rule {
    Threshold(ThresholdRule),
    RateLimit(RateLimitRule),
    Custom(Arc<dyn CustomRule>),
}

impl Rule {
    pub fn id(&self) -> &str {
        match self {
            Rule::Threshold(r) => r.id(),
            Rule::RateLimit(r) => r.id(),
            Rule::Custom(r) => r.id(),
        }
    }

    pub fn on_order(&self, ctx: &RuleCtx<'_>, order: &Order, key: &DimensionKey) -> Option<RuleResult> {
        match self {
            Rule::Threshold(r) => r.on_order(ctx, order, key),
            Rule::RateLimit(r) => r.on_order(order, key),
            Rule::Custom(r) => r.on_order(ctx, order, key),
        }
    }

    pub fn on_trade(&self, ctx: &RuleCtx<'_>, trade: &Trade, key: &DimensionKey) -> Option<RuleResult> {
        match self {
            Rule::Threshold(r) => r.on_trade(ctx, trade, key),
            // Rate limiting counts order flow only
            Rule::RateLimit(_) => None,
            Rule::Custom(r) => r.on_trade(ctx, trade, key),
        }
    }

    pub fn on_cancel(&self, ctx: &RuleCtx<'_>, cancel: &Cancel, key: &DimensionKey) -> Option<RuleResult> {
        match self {
            Rule::Threshold(r) => r.on_cancel(ctx, cancel, key),
            Rule::RateLimit(_) => None,
            Rule::Custom(r) => r.on_cancel(ctx, cancel, key),
        }
    }

    /// Re-evaluate time-driven state (rate-limit resumes) at `now`.
    pub fn tick(&self, now: Nanos) -> Vec<RuleResult> {
        match self {
            Rule::Threshold(_) => Vec::new(),
            Rule::RateLimit(r) => r.tick(now),
            Rule::Custom(r) => r.tick(now),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Threshold(r) => f.debug_tuple("Threshold").field(&r.id()).finish(),
            Rule::RateLimit(r) => f.debug_tuple("RateLimit").field(&r.id()).finish(),
            Rule::Custom(r) => f.debug_tuple("Custom").field(&r.id()).finish(),
        }
    }
}
