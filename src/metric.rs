//! Metric kinds - closed enumeration of accumulated quantities
//!
//! Each kind has one scalar accumulator per (dimension key, day). The enum
//! doubles as a dense array index into a per-key metric cell, which keeps
//! the hot-path accumulate free of any inner map lookup.

use crate::error::ConfigError;
use crate::events::{Cancel, Order, Trade};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accumulated metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// Sum of traded volume
    TradeVolume,
    /// Sum of price * volume
    TradeNotional,
    /// Count of order events
    OrderCount,
    /// Count of cancel events
    CancelCount,
    /// Count of trade events
    TradeCount,
}

/// Number of metric kinds - the width of a per-key metric cell.
pub const METRIC_COUNT: usize = 5;

impl Metric {
    /// Dense index into a metric cell.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::TradeVolume,
        Metric::TradeNotional,
        Metric::OrderCount,
        Metric::CancelCount,
        Metric::TradeCount,
    ];

    pub fn from_index(i: usize) -> Option<Metric> {
        Metric::ALL.get(i).copied()
    }

    pub fn parse(s: &str) -> Result<Metric, ConfigError> {
        match s {
            "trade-volume" => Ok(Metric::TradeVolume),
            "trade-notional" => Ok(Metric::TradeNotional),
            "order-count" => Ok(Metric::OrderCount),
            "cancel-count" => Ok(Metric::CancelCount),
            "trade-count" => Ok(Metric::TradeCount),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }

    /// Contribution of an order event to this metric, if any.
    #[inline]
    pub fn order_contribution(self, _order: &Order) -> Option<f64> {
        match self {
            Metric::OrderCount => Some(1.0),
            _ => None,
        }
    }

    /// Contribution of a trade event to this metric, if any.
    #[inline]
    pub fn trade_contribution(self, trade: &Trade) -> Option<f64> {
        match self {
            Metric::TradeVolume => Some(trade.volume as f64),
            Metric::TradeNotional => Some(trade.notional()),
            Metric::TradeCount => Some(1.0),
            _ => None,
        }
    }

    /// Contribution of a cancel event to this metric, if any.
    #[inline]
    pub fn cancel_contribution(self, _cancel: &Cancel) -> Option<f64> {
        match self {
            Metric::CancelCount => Some(1.0),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::TradeVolume => "trade-volume",
            Metric::TradeNotional => "trade-notional",
            Metric::OrderCount => "order-count",
            Metric::CancelCount => "cancel-count",
            Metric::TradeCount => "trade-count",
        };
        f.write_str(s)
    }
}
