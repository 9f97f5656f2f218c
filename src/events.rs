//! Event model - immutable order / trade / cancel records
//!
//! These are the value types ingest threads hand to the engine. Trades and
//! cancels may omit dimension fields; the engine fills them from the order
//! index before rule dispatch.
//!
//! # Validation
//!
//! Malformed input (non-finite price, non-positive volume, empty required
//! identifiers) is rejected before any state mutation.

use crate::core_types::{CancelId, Nanos, OrderId, TradeId};
use crate::error::EventError;
use serde::{Deserialize, Serialize};

// ============================================================
// DIRECTION
// ============================================================

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bid,
    Ask,
}

// ============================================================
// EVENT RECORDS
// ============================================================

/// New-order event from the upstream gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: String,
    pub contract_id: String,
    pub direction: Direction,
    pub price: f64,
    pub volume: i32,
    /// Nanoseconds since Unix epoch
    pub timestamp: Nanos,
    pub exchange_id: Option<String>,
    pub account_group_id: Option<String>,
}

impl Order {
    pub fn new(
        order_id: OrderId,
        account_id: impl Into<String>,
        contract_id: impl Into<String>,
        direction: Direction,
        price: f64,
        volume: i32,
        timestamp: Nanos,
    ) -> Self {
        Self {
            order_id,
            account_id: account_id.into(),
            contract_id: contract_id.into(),
            direction,
            price,
            volume,
            timestamp,
            exchange_id: None,
            account_group_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if !self.price.is_finite() {
            return Err(EventError::NonFinitePrice(self.price));
        }
        if self.volume <= 0 {
            return Err(EventError::NonPositiveVolume(self.volume));
        }
        if self.account_id.is_empty() {
            return Err(EventError::MissingIdentifier("account_id"));
        }
        if self.contract_id.is_empty() {
            return Err(EventError::MissingIdentifier("contract_id"));
        }
        Ok(())
    }
}

/// Fill event. Dimension fields are optional; when absent they are
/// enriched from the originating order via the order index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub price: f64,
    pub volume: i32,
    pub timestamp: Nanos,
    pub account_id: Option<String>,
    pub contract_id: Option<String>,
    pub exchange_id: Option<String>,
    pub account_group_id: Option<String>,
}

impl Trade {
    pub fn new(trade_id: TradeId, order_id: OrderId, price: f64, volume: i32, timestamp: Nanos) -> Self {
        Self {
            trade_id,
            order_id,
            price,
            volume,
            timestamp,
            account_id: None,
            contract_id: None,
            exchange_id: None,
            account_group_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if !self.price.is_finite() {
            return Err(EventError::NonFinitePrice(self.price));
        }
        if self.volume <= 0 {
            return Err(EventError::NonPositiveVolume(self.volume));
        }
        Ok(())
    }

    /// Notional value (price * volume). Finite by validation.
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price * self.volume as f64
    }
}

/// Cancel event. Same enrichment rule as [`Trade`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancel {
    pub cancel_id: CancelId,
    pub order_id: OrderId,
    pub volume: i32,
    pub timestamp: Nanos,
    pub account_id: Option<String>,
    pub contract_id: Option<String>,
    pub exchange_id: Option<String>,
    pub account_group_id: Option<String>,
}

impl Cancel {
    pub fn new(cancel_id: CancelId, order_id: OrderId, volume: i32, timestamp: Nanos) -> Self {
        Self {
            cancel_id,
            order_id,
            volume,
            timestamp,
            account_id: None,
            contract_id: None,
            exchange_id: None,
            account_group_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.volume <= 0 {
            return Err(EventError::NonPositiveVolume(self.volume));
        }
        Ok(())
    }
}

// ============================================================
// UNIFIED EVENT
// ============================================================

/// Event kind tag, used by rules to declare which events they apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Order,
    Trade,
    Cancel,
}

/// Unified event wrapper for the batch front-end and action reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Order(Order),
    Trade(Trade),
    Cancel(Cancel),
}

impl Event {
    #[inline]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Order(_) => EventKind::Order,
            Event::Trade(_) => EventKind::Trade,
            Event::Cancel(_) => EventKind::Cancel,
        }
    }

    #[inline]
    pub fn timestamp(&self) -> Nanos {
        match self {
            Event::Order(o) => o.timestamp,
            Event::Trade(t) => t.timestamp,
            Event::Cancel(c) => c.timestamp,
        }
    }
}

impl From<Order> for Event {
    fn from(o: Order) -> Self {
        Event::Order(o)
    }
}

impl From<Trade> for Event {
    fn from(t: Trade) -> Self {
        Event::Trade(t)
    }
}

impl From<Cancel> for Event {
    fn from(c: Cancel) -> Self {
        Event::Cancel(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_validation() {
        let ok = Order::new(1, "A", "T2303", Direction::Bid, 100.0, 10, 1);
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.price = f64::NAN;
        assert!(matches!(bad.validate(), Err(EventError::NonFinitePrice(_))));

        let mut bad = ok.clone();
        bad.volume = 0;
        assert_eq!(bad.validate(), Err(EventError::NonPositiveVolume(0)));

        let mut bad = ok.clone();
        bad.account_id.clear();
        assert_eq!(
            bad.validate(),
            Err(EventError::MissingIdentifier("account_id"))
        );
    }

    #[test]
    fn test_trade_rejects_infinite_price() {
        let mut t = Trade::new(1, 1, f64::INFINITY, 5, 10);
        assert!(t.validate().is_err());
        t.price = 99.5;
        assert!(t.validate().is_ok());
        assert_eq!(t.notional(), 497.5);
    }

    #[test]
    fn test_event_kind_and_timestamp() {
        let e: Event = Order::new(1, "A", "C", Direction::Ask, 1.0, 1, 42).into();
        assert_eq!(e.kind(), EventKind::Order);
        assert_eq!(e.timestamp(), 42);
    }
}
