//! Threshold-limit rule - daily aggregate vs. fixed threshold
//!
//! Accumulates the event's contribution to one metric over the configured
//! live dimensions and proposes its action list when the aggregate goes
//! strictly above the threshold. Equality is not a breach.

use super::{RuleCtx, RuleResult};
use crate::actions::ActionKind;
use crate::dimension::{DimensionKey, DimensionMask};
use crate::error::ConfigError;
use crate::events::{Cancel, EventKind, Order, Trade};
use crate::metric::Metric;

/// Threshold rule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdParams {
    pub rule_id: String,
    pub metric: Metric,
    /// Breach requires aggregate > threshold (strict).
    pub threshold: f64,
    /// Actions proposed on breach, in order.
    pub actions: Vec<ActionKind>,
    /// Live dimension components; others collapse to absent.
    pub dimensions: DimensionMask,
    /// Event kinds this rule applies to.
    pub applies_to: Vec<EventKind>,
}

#[derive(Debug, Clone)]
pub struct ThresholdRule {
    params: ThresholdParams,
}

impl ThresholdRule {
    pub fn new(params: ThresholdParams) -> Result<Self, ConfigError> {
        if params.threshold <= 0.0 || !params.threshold.is_finite() {
            return Err(ConfigError::NonPositiveThreshold {
                rule_id: params.rule_id.clone(),
                threshold: params.threshold,
            });
        }
        Ok(Self { params })
    }

    pub fn id(&self) -> &str {
        &self.params.rule_id
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    fn evaluate(
        &self,
        ctx: &RuleCtx<'_>,
        kind: EventKind,
        contribution: Option<f64>,
        ts: u64,
        full_key: &DimensionKey,
    ) -> Option<RuleResult> {
        if !self.params.applies_to.contains(&kind) {
            return None;
        }
        // Metric not driven by this event kind: no accumulation, no check
        let contribution = contribution?;

        let key = full_key.masked(self.params.dimensions);
        let value = ctx.daily.add(&key, self.params.metric, contribution, ts);
        if value > self.params.threshold {
            let mut result = RuleResult {
                actions: self.params.actions.clone(),
                reasons: vec![format!(
                    "metric {} exceeded threshold {} on dimensions {} (value {})",
                    self.params.metric, self.params.threshold, key, value
                )],
                key,
                ..Default::default()
            };
            result
                .metadata
                .insert("value".to_string(), value.to_string());
            result
                .metadata
                .insert("threshold".to_string(), self.params.threshold.to_string());
            Some(result)
        } else {
            None
        }
    }

    pub fn on_order(&self, ctx: &RuleCtx<'_>, order: &Order, key: &DimensionKey) -> Option<RuleResult> {
        self.evaluate(
            ctx,
            EventKind::Order,
            self.params.metric.order_contribution(order),
            order.timestamp,
            key,
        )
    }

    pub fn on_trade(&self, ctx: &RuleCtx<'_>, trade: &Trade, key: &DimensionKey) -> Option<RuleResult> {
        self.evaluate(
            ctx,
            EventKind::Trade,
            self.params.metric.trade_contribution(trade),
            trade.timestamp,
            key,
        )
    }

    pub fn on_cancel(&self, ctx: &RuleCtx<'_>, cancel: &Cancel, key: &DimensionKey) -> Option<RuleResult> {
        self.evaluate(
            ctx,
            EventKind::Cancel,
            self.params.metric.cancel_contribution(cancel),
            cancel.timestamp,
            key,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::DailyStats;
    use crate::events::Direction;

    fn rule(threshold: f64) -> ThresholdRule {
        ThresholdRule::new(ThresholdParams {
            rule_id: "vol-limit".into(),
            metric: Metric::TradeVolume,
            threshold,
            actions: vec![ActionKind::SuspendAccountTrading],
            dimensions: DimensionMask::account_product(),
            applies_to: vec![EventKind::Trade],
        })
        .unwrap()
    }

    fn full_key(account: &str, product: &str) -> DimensionKey {
        DimensionKey {
            account_id: Some(account.into()),
            contract_id: Some("T2303".into()),
            product_id: Some(product.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        assert!(matches!(
            ThresholdRule::new(ThresholdParams {
                rule_id: "bad".into(),
                metric: Metric::TradeVolume,
                threshold: 0.0,
                actions: vec![],
                dimensions: DimensionMask::account(),
                applies_to: vec![EventKind::Trade],
            }),
            Err(ConfigError::NonPositiveThreshold { .. })
        ));
    }

    #[test]
    fn test_fires_only_above_threshold() {
        let daily = DailyStats::new(8).unwrap();
        let ctx = RuleCtx { daily: &daily };
        let rule = rule(1000.0);
        let key = full_key("A", "T10Y");

        // Six trades of 150: 900 cumulative, no breach
        for i in 0..6 {
            let trade = Trade::new(i, i, 100.0, 150, 1_000 + i);
            assert!(rule.on_trade(&ctx, &trade, &key).is_none());
        }
        // Seventh crosses: 1050 > 1000
        let trade = Trade::new(7, 7, 100.0, 150, 2_000);
        let result = rule.on_trade(&ctx, &trade, &key).unwrap();
        assert_eq!(result.actions, vec![ActionKind::SuspendAccountTrading]);
        assert_eq!(result.key.account_id.as_deref(), Some("A"));
        assert_eq!(result.key.product_id.as_deref(), Some("T10Y"));
        assert_eq!(result.key.contract_id, None);
        assert!(result.reasons[0].contains("trade-volume"));
        assert!(result.reasons[0].contains("1050"));
    }

    #[test]
    fn test_equality_is_not_a_breach() {
        let daily = DailyStats::new(8).unwrap();
        let ctx = RuleCtx { daily: &daily };
        let rule = rule(1000.0);
        let key = full_key("A", "T10Y");

        let trade = Trade::new(1, 1, 100.0, 1000, 1);
        assert!(rule.on_trade(&ctx, &trade, &key).is_none());
        // One more contract breaches
        let trade = Trade::new(2, 2, 100.0, 1, 2);
        assert!(rule.on_trade(&ctx, &trade, &key).is_some());
    }

    #[test]
    fn test_ignores_non_applicable_event_kinds() {
        let daily = DailyStats::new(8).unwrap();
        let ctx = RuleCtx { daily: &daily };
        let rule = rule(1.0);
        let key = full_key("A", "T10Y");

        let order = Order::new(1, "A", "T2303", Direction::Bid, 100.0, 10, 1);
        assert!(rule.on_order(&ctx, &order, &key).is_none());
        // And the non-event accumulated nothing
        let masked = key.masked(DimensionMask::account_product());
        assert_eq!(daily.get(&masked, Metric::TradeVolume, 1), 0.0);
    }

    #[test]
    fn test_metric_not_driven_by_event_is_noop() {
        // order-count metric applied to trades: trades contribute nothing
        let daily = DailyStats::new(8).unwrap();
        let ctx = RuleCtx { daily: &daily };
        let rule = ThresholdRule::new(ThresholdParams {
            rule_id: "oc".into(),
            metric: Metric::OrderCount,
            threshold: 1.0,
            actions: vec![ActionKind::Alert],
            dimensions: DimensionMask::account(),
            applies_to: vec![EventKind::Trade],
        })
        .unwrap();
        let trade = Trade::new(1, 1, 100.0, 10, 1);
        assert!(rule.on_trade(&ctx, &trade, &full_key("A", "P")).is_none());
    }

    #[test]
    fn test_accounts_independent() {
        let daily = DailyStats::new(8).unwrap();
        let ctx = RuleCtx { daily: &daily };
        let rule = rule(1000.0);

        let t_a = Trade::new(1, 1, 100.0, 1001, 1);
        assert!(rule.on_trade(&ctx, &t_a, &full_key("A", "P")).is_some());
        // B's aggregate is untouched by A's breach
        let t_b = Trade::new(2, 2, 100.0, 1000, 2);
        assert!(rule.on_trade(&ctx, &t_b, &full_key("B", "P")).is_none());
    }
}
