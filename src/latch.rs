//! Dedup latch - at-most-once delivery per suspend/resume transition
//!
//! One two-state latch per (subject, action family):
//!
//! ```text
//!  +---------+   suspend-proposed    +-----------+
//!  | ALLOWED | --------------------> | SUSPENDED |
//!  |         | <-------------------- |           |
//!  +---------+    resume-proposed    +-----------+
//! ```
//!
//! The winning CAS decides which proposal is forwarded; redundant
//! proposals in the same state are dropped. This is at-most-once per state
//! transition, not per rule firing.

use crate::actions::{ActionFamily, LatchEdge};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Latch state per (subject, family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatchState {
    Allowed,
    Suspended,
}

const ALLOWED: u8 = 0;
const SUSPENDED: u8 = 1;

/// One latch entry, as exported for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatchEntry {
    pub subject: String,
    pub family: ActionFamily,
    pub state: LatchState,
}

/// Concurrent (subject, family) -> latch map.
#[derive(Default)]
pub struct DedupLatches {
    latches: DashMap<(String, ActionFamily), AtomicU8>,
}

impl DedupLatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a proposed transition. Returns `true` iff this proposal won
    /// the state change and must be forwarded to the sink.
    pub fn propose(&self, subject: &str, family: ActionFamily, edge: LatchEdge) -> bool {
        let (from, to) = match edge {
            LatchEdge::Suspend => (ALLOWED, SUSPENDED),
            LatchEdge::Resume => (SUSPENDED, ALLOWED),
        };
        // Resume against an unknown subject is a no-op: absent == ALLOWED.
        if edge == LatchEdge::Resume && !self.latches.contains_key(&(subject.to_string(), family)) {
            return false;
        }
        let entry = self
            .latches
            .entry((subject.to_string(), family))
            .or_insert_with(|| AtomicU8::new(ALLOWED));
        entry
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current state; absent latches read as ALLOWED.
    pub fn state(&self, subject: &str, family: ActionFamily) -> LatchState {
        match self.latches.get(&(subject.to_string(), family)) {
            Some(entry) if entry.load(Ordering::Acquire) == SUSPENDED => LatchState::Suspended,
            _ => LatchState::Allowed,
        }
    }

    /// Export non-default (SUSPENDED) latches, sorted (snapshot path).
    pub fn export(&self) -> Vec<LatchEntry> {
        let mut out: Vec<LatchEntry> = self
            .latches
            .iter()
            .filter(|e| e.value().load(Ordering::Acquire) == SUSPENDED)
            .map(|e| LatchEntry {
                subject: e.key().0.clone(),
                family: e.key().1,
                state: LatchState::Suspended,
            })
            .collect();
        out.sort_by(|a, b| {
            a.subject
                .cmp(&b.subject)
                .then((a.family as u8).cmp(&(b.family as u8)))
        });
        out
    }

    /// Replace all latches (restore path; caller must have quiesced).
    pub fn load(&self, entries: &[LatchEntry]) {
        self.latches.clear();
        for e in entries {
            let state = match e.state {
                LatchState::Allowed => ALLOWED,
                LatchState::Suspended => SUSPENDED,
            };
            self.latches
                .insert((e.subject.clone(), e.family), AtomicU8::new(state));
        }
    }

    pub fn len(&self) -> usize {
        self.latches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspend_once_then_drop_redundant() {
        let latches = DedupLatches::new();
        assert!(latches.propose("A", ActionFamily::AccountTrading, LatchEdge::Suspend));
        assert!(!latches.propose("A", ActionFamily::AccountTrading, LatchEdge::Suspend));
        assert_eq!(
            latches.state("A", ActionFamily::AccountTrading),
            LatchState::Suspended
        );
    }

    #[test]
    fn test_resume_cycle() {
        let latches = DedupLatches::new();
        assert!(latches.propose("A", ActionFamily::Ordering, LatchEdge::Suspend));
        assert!(latches.propose("A", ActionFamily::Ordering, LatchEdge::Resume));
        assert!(!latches.propose("A", ActionFamily::Ordering, LatchEdge::Resume));
        // A fresh cycle emits again
        assert!(latches.propose("A", ActionFamily::Ordering, LatchEdge::Suspend));
    }

    #[test]
    fn test_resume_without_suspend_is_noop() {
        let latches = DedupLatches::new();
        assert!(!latches.propose("A", ActionFamily::Ordering, LatchEdge::Resume));
        assert!(latches.is_empty());
    }

    #[test]
    fn test_families_and_subjects_independent() {
        let latches = DedupLatches::new();
        assert!(latches.propose("A", ActionFamily::Ordering, LatchEdge::Suspend));
        assert!(latches.propose("A", ActionFamily::AccountTrading, LatchEdge::Suspend));
        assert!(latches.propose("B", ActionFamily::Ordering, LatchEdge::Suspend));
    }

    #[test]
    fn test_concurrent_suspend_exactly_one_winner() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
        use std::thread;

        let latches = Arc::new(DedupLatches::new());
        let wins = Arc::new(AtomicU64::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latches = Arc::clone(&latches);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    if latches.propose("A", ActionFamily::Ordering, LatchEdge::Suspend) {
                        wins.fetch_add(1, AtomicOrdering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(wins.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_export_load_roundtrip() {
        let latches = DedupLatches::new();
        latches.propose("B", ActionFamily::Ordering, LatchEdge::Suspend);
        latches.propose("A", ActionFamily::AccountTrading, LatchEdge::Suspend);
        // A full cycle leaves an ALLOWED latch that is not exported
        latches.propose("C", ActionFamily::Ordering, LatchEdge::Suspend);
        latches.propose("C", ActionFamily::Ordering, LatchEdge::Resume);

        let entries = latches.export();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject, "A");

        let restored = DedupLatches::new();
        restored.load(&entries);
        assert_eq!(
            restored.state("B", ActionFamily::Ordering),
            LatchState::Suspended
        );
        // Restored SUSPENDED latch dedups further suspends
        assert!(!restored.propose("B", ActionFamily::Ordering, LatchEdge::Suspend));
        assert!(restored.propose("B", ActionFamily::Ordering, LatchEdge::Resume));
    }
}
