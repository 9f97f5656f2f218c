//! riskgate - In-Process Real-Time Risk-Control Engine
//!
//! Consumes order / trade / cancel streams, maintains multi-dimensional
//! daily aggregates and sliding-window counters, evaluates a hot-swappable
//! rule set per event, and emits deduplicated processing directives
//! (suspend / resume / block / alert) to a synchronous action sink.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (OrderId, DayId, etc.)
//! - [`events`] - Order / Trade / Cancel value types and validation
//! - [`catalog`] - Instrument catalog (contract -> product / exchange)
//! - [`dimension`] - Dimension keys and live-dimension masks
//! - [`metric`] - Metric kinds and per-event contributions
//! - [`sharded`] - Sharded concurrent statistics substrate
//! - [`daily`] - Daily multi-dimensional counters
//! - [`window`] - Rolling window counters
//! - [`order_index`] - Bounded oid -> origin enrichment index
//! - [`rules`] - Rule interface plus threshold / rate-limit built-ins
//! - [`actions`] - Action kinds and the sink seam
//! - [`latch`] - Suspend/resume dedup latches
//! - [`engine`] - The engine core
//! - [`snapshot`] - Snapshot codec (restart state)
//! - [`batch`] - Optional queue-based ingest front-end
//! - [`config`] - Engine/log configuration and YAML rule specs
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error taxonomy

// Core types - must be first!
pub mod core_types;

// Configuration
pub mod config;

// Engine components
pub mod actions;
pub mod batch;
pub mod catalog;
pub mod daily;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod events;
pub mod latch;
pub mod logging;
pub mod metric;
pub mod order_index;
pub mod rules;
pub mod sharded;
pub mod snapshot;
pub mod window;

// Convenient re-exports at crate root
pub use actions::{ActionKind, ActionSink, EmittedAction, VecSink};
pub use catalog::InstrumentCatalog;
pub use config::{EngineConfig, LogConfig, RuleSpec, RulesFile};
pub use core_types::{CancelId, DayId, Nanos, OrderId, TradeId};
pub use dimension::{DimensionKey, DimensionMask};
pub use engine::{RiskEngine, EngineStatsView};
pub use error::{ConfigError, EventError, RiskError, SinkError, SnapshotError};
pub use events::{Cancel, Direction, Event, EventKind, Order, Trade};
pub use metric::Metric;
pub use rules::{CustomRule, RateLimitParams, RateLimitRule, Rule, RuleCtx, RuleResult, ThresholdParams, ThresholdRule};
