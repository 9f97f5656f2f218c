//! Actions - directives emitted to downstream matching/gateway components
//!
//! Suspend/resume kinds come in per-family pairs and pass through the
//! dedup latch; the rest (alert, block, position directives) are always
//! forwarded.

use crate::error::{ConfigError, SinkError};
use crate::events::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

// ============================================================
// ACTION KINDS
// ============================================================

/// Closed (extensible) enumeration of processing directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    SuspendAccountTrading,
    ResumeAccountTrading,
    SuspendOrdering,
    ResumeOrdering,
    SuspendContract,
    ResumeContract,
    SuspendProduct,
    ResumeProduct,
    BlockOrder,
    BlockCancel,
    Alert,
    ReducePosition,
    IncreaseMargin,
}

/// Suspend/resume action family - the unit the dedup latch keys on,
/// together with the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionFamily {
    AccountTrading,
    Ordering,
    Contract,
    Product,
}

/// Direction of a latched transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchEdge {
    Suspend,
    Resume,
}

impl ActionKind {
    /// The (family, edge) pair for latched kinds; `None` for pass-through
    /// kinds.
    pub fn latch_edge(self) -> Option<(ActionFamily, LatchEdge)> {
        use ActionKind::*;
        match self {
            SuspendAccountTrading => Some((ActionFamily::AccountTrading, LatchEdge::Suspend)),
            ResumeAccountTrading => Some((ActionFamily::AccountTrading, LatchEdge::Resume)),
            SuspendOrdering => Some((ActionFamily::Ordering, LatchEdge::Suspend)),
            ResumeOrdering => Some((ActionFamily::Ordering, LatchEdge::Resume)),
            SuspendContract => Some((ActionFamily::Contract, LatchEdge::Suspend)),
            ResumeContract => Some((ActionFamily::Contract, LatchEdge::Resume)),
            SuspendProduct => Some((ActionFamily::Product, LatchEdge::Suspend)),
            ResumeProduct => Some((ActionFamily::Product, LatchEdge::Resume)),
            BlockOrder | BlockCancel | Alert | ReducePosition | IncreaseMargin => None,
        }
    }

    pub fn parse(s: &str) -> Result<ActionKind, ConfigError> {
        use ActionKind::*;
        match s {
            "suspend-account-trading" => Ok(SuspendAccountTrading),
            "resume-account-trading" => Ok(ResumeAccountTrading),
            "suspend-ordering" => Ok(SuspendOrdering),
            "resume-ordering" => Ok(ResumeOrdering),
            "suspend-contract" => Ok(SuspendContract),
            "resume-contract" => Ok(ResumeContract),
            "suspend-product" => Ok(SuspendProduct),
            "resume-product" => Ok(ResumeProduct),
            "block-order" => Ok(BlockOrder),
            "block-cancel" => Ok(BlockCancel),
            "alert" => Ok(Alert),
            "reduce-position" => Ok(ReducePosition),
            "increase-margin" => Ok(IncreaseMargin),
            other => Err(ConfigError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ActionKind::*;
        let s = match self {
            SuspendAccountTrading => "suspend-account-trading",
            ResumeAccountTrading => "resume-account-trading",
            SuspendOrdering => "suspend-ordering",
            ResumeOrdering => "resume-ordering",
            SuspendContract => "suspend-contract",
            ResumeContract => "resume-contract",
            SuspendProduct => "suspend-product",
            ResumeProduct => "resume-product",
            BlockOrder => "block-order",
            BlockCancel => "block-cancel",
            Alert => "alert",
            ReducePosition => "reduce-position",
            IncreaseMargin => "increase-margin",
        };
        f.write_str(s)
    }
}

// ============================================================
// EMITTED ACTION + SINK
// ============================================================

/// A directive as delivered to the external callback.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedAction {
    pub kind: ActionKind,
    /// Originating rule id ("__engine__" for engine-level diagnostics).
    pub rule_id: String,
    /// Target subject for latched kinds (account/contract/product id).
    pub subject: Option<String>,
    /// Originating event; `None` for tick-driven resumes.
    pub event: Option<Event>,
    /// Human-readable reason from the rule, when it gave one.
    pub reason: Option<String>,
}

/// External action callback.
///
/// Invoked synchronously on the ingest thread; the callee is free to
/// enqueue for asynchronous downstream handling, but MUST NOT re-enter the
/// engine with a new event in the same call.
pub trait ActionSink: Send + Sync {
    fn emit(&self, action: &EmittedAction) -> Result<(), SinkError>;
}

/// Sink that stores every action in a vector (tests, audits).
#[derive(Default)]
pub struct VecSink {
    pub actions: Mutex<Vec<EmittedAction>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EmittedAction> {
        std::mem::take(&mut *self.actions.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|a| a.kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActionSink for VecSink {
    fn emit(&self, action: &EmittedAction) -> Result<(), SinkError> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action.clone());
        Ok(())
    }
}
