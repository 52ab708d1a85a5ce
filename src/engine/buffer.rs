//! Entry buffer and history window.
//!
//! The buffer collects operator-entered outcomes until the trigger
//! threshold is reached, then folds them into the bounded history window
//! that is handed to the predictor.

use std::collections::VecDeque;
use tracing::debug;

use crate::types::{BufferPolicy, Outcome};

// ---------------------------------------------------------------------------
// History window
// ---------------------------------------------------------------------------

/// Most-recent-first, capacity-bounded sequence of outcomes.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    entries: VecDeque<Outcome>,
    cap: usize,
}

impl HistoryWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Push one outcome at the head, dropping tail entries beyond the cap.
    pub fn push_front(&mut self, outcome: Outcome) {
        self.entries.push_front(outcome);
        self.entries.truncate(self.cap);
    }

    /// Merge a batch given in entry order (oldest first). The last entered
    /// outcome ends up at index 0.
    pub fn prepend_batch(&mut self, batch: &[Outcome]) {
        for outcome in batch {
            self.entries.push_front(*outcome);
        }
        self.entries.truncate(self.cap);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// The most recently entered outcome, if any.
    pub fn latest(&self) -> Option<&Outcome> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Outcome> {
        self.entries.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Vec<Outcome>> for HistoryWindow {
    /// Window sized exactly to an already ordered list, most recent first.
    fn from(entries: Vec<Outcome>) -> Self {
        let cap = entries.len().max(1);
        Self {
            entries: entries.into(),
            cap,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry buffer
// ---------------------------------------------------------------------------

/// Result of pushing one outcome into the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferState {
    /// Stored; `count` entries are now waiting toward the threshold.
    Buffered { count: usize },
    /// The threshold was reached and the history window was updated.
    Triggered,
}

/// Accumulates entries between prediction cycles.
///
/// Gating on session phase is the controller's job; the buffer only
/// implements the folding policy.
#[derive(Debug, Clone)]
pub struct EntryBuffer {
    policy: BufferPolicy,
    threshold: usize,
    pending: Vec<Outcome>,
}

impl EntryBuffer {
    pub fn new(policy: BufferPolicy, threshold: usize) -> Self {
        Self {
            policy,
            threshold,
            pending: Vec::with_capacity(threshold),
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Entries accepted since the last trigger, in entry order.
    pub fn pending(&self) -> &[Outcome] {
        &self.pending
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    /// Accept one outcome and apply the folding policy to `history`.
    pub fn push(&mut self, outcome: Outcome, history: &mut HistoryWindow) -> BufferState {
        match self.policy {
            BufferPolicy::FixedThreshold => {
                self.pending.push(outcome);
                if self.pending.len() < self.threshold {
                    debug!(count = self.pending.len(), %outcome, "Entry buffered");
                    return BufferState::Buffered {
                        count: self.pending.len(),
                    };
                }
                history.prepend_batch(&self.pending);
                self.pending.clear();
                BufferState::Triggered
            }
            BufferPolicy::RollingWindow => {
                history.push_front(outcome);
                if history.len() < self.threshold {
                    debug!(count = history.len(), %outcome, "Entry folded into window");
                    return BufferState::Buffered {
                        count: history.len(),
                    };
                }
                BufferState::Triggered
            }
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
