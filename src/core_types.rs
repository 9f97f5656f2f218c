//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Order ID - unique within the system, assigned by the upstream gateway.
pub type OrderId = u64;

/// Trade ID - unique within the system
pub type TradeId = u64;

/// Cancel ID - unique within the system
pub type CancelId = u64;

/// Timestamp - nanoseconds since Unix epoch (UTC).
///
/// # Constraints:
/// - Monotonically non-decreasing per source
/// - NOT globally ordered across ingest threads
pub type Nanos = u64;

/// Nanoseconds per UTC day.
pub const NS_PER_DAY: u64 = 86_400_000_000_000;

/// Day ID - the UTC day an event belongs to.
///
/// Computed as `timestamp_ns / NS_PER_DAY`. Daily aggregates key on
/// `(dimension key, day id)`, so a new day starts from fresh zero-valued
/// entries with no explicit reset step.
pub type DayId = u32;

/// Day id for a timestamp.
#[inline]
pub fn day_of(ts_ns: Nanos) -> DayId {
    (ts_ns / NS_PER_DAY) as DayId
}

/// Render a day id as a UTC calendar date (diagnostics only).
pub fn day_to_date(day: DayId) -> chrono::NaiveDate {
    chrono::DateTime::from_timestamp((day as i64) * 86_400, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or(chrono::NaiveDate::MIN)
}
