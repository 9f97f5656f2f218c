//! Error taxonomy
//!
//! Three synchronous failure classes (malformed event, configuration error,
//! snapshot error) surface to the caller; sink and invariant failures are
//! surfaced out-of-band through [`crate::engine::EngineStats`] counters.

use thiserror::Error;

/// Malformed input - fails the single call, no state mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("non-finite price: {0}")]
    NonFinitePrice(f64),

    #[error("non-positive volume: {0}")]
    NonPositiveVolume(i32),

    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),
}

/// Configuration error - the engine keeps the previous rule set intact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown rule kind: {0}")]
    UnknownRuleKind(String),

    #[error("rule {rule_id}: threshold must be positive, got {threshold}")]
    NonPositiveThreshold { rule_id: String, threshold: f64 },

    #[error("rule {rule_id}: window {window_ns}ns must cover at least 1ns per bucket ({buckets} buckets)")]
    WindowTooNarrow {
        rule_id: String,
        window_ns: u64,
        buckets: usize,
    },

    #[error("rule {rule_id}: bucket count {buckets} outside [64, 1024]")]
    BadBucketCount { rule_id: String, buckets: usize },

    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(String),

    #[error("no such rule: {0}")]
    NoSuchRule(String),

    #[error("rule {0}: update does not apply to this rule kind")]
    KindMismatch(String),

    #[error("shard count {0} is not a power of two")]
    BadShardCount(usize),

    #[error("rules file parse error: {0}")]
    Parse(String),

    #[error("logging init error: {0}")]
    Logging(String),
}

/// Snapshot codec error - restore is atomic (fully restored or untouched).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("bad magic")]
    BadMagic,

    #[error("unsupported snapshot version: {0}")]
    BadVersion(u32),

    #[error("truncated snapshot: needed {needed} bytes, had {remaining}")]
    Truncated { needed: usize, remaining: usize },

    #[error("checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("unknown required section tag: {0}")]
    UnknownRequiredTag(u16),

    #[error("section {tag} decode error: {msg}")]
    Decode { tag: u16, msg: String },

    #[error("section {tag} encode error: {msg}")]
    Encode { tag: u16, msg: String },
}

/// Umbrella error for callers that funnel all engine failures together.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Action sink callback failure. Recorded in diagnostics; never rolls back
/// the event's state mutations.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("action sink failure: {0}")]
pub struct SinkError(pub String);
