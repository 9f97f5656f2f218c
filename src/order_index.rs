//! Order index - short-lived oid -> (account, contract) mapping
//!
//! Trades and cancels often arrive without dimension fields; this index
//! lets the engine fill them from the originating order. Capacity is
//! bounded: a FIFO ring evicts the oldest entry on overflow. A trade or
//! cancel whose oid has been evicted is still processed with only the
//! fields it carries.

use crate::core_types::OrderId;
use crossbeam_queue::ArrayQueue;
use dashmap::DashMap;

/// Default index capacity.
pub const DEFAULT_ORDER_INDEX_CAPACITY: usize = 1 << 20;

/// Dimension fields captured from an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOrigin {
    pub account_id: String,
    pub contract_id: String,
}

/// Bounded concurrent oid -> origin map with FIFO eviction.
pub struct OrderIndex {
    map: DashMap<OrderId, OrderOrigin>,
    fifo: ArrayQueue<OrderId>,
}

impl OrderIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity(capacity),
            fifo: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Record an order's dimension fields. Re-inserting an oid refreshes
    /// the fields without consuming another ring slot.
    pub fn insert(&self, oid: OrderId, account_id: &str, contract_id: &str) {
        let prev = self.map.insert(
            oid,
            OrderOrigin {
                account_id: account_id.to_string(),
                contract_id: contract_id.to_string(),
            },
        );
        if prev.is_some() {
            return;
        }
        let mut evict = oid;
        loop {
            match self.fifo.push(evict) {
                Ok(()) => break,
                Err(back) => {
                    // Ring full: evict the oldest entry and retry.
                    if let Some(oldest) = self.fifo.pop() {
                        self.map.remove(&oldest);
                    }
                    evict = back;
                }
            }
        }
    }

    pub fn get(&self, oid: OrderId) -> Option<OrderOrigin> {
        self.map.get(&oid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
