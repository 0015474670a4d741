#![forbid(unsafe_code)]

//! Key-hold debounce gated on observed value change.
//!
//! Holding a hotkey makes the hook emit a burst of auto-repeat presses. Each
//! accepted press writes a cell, and the workbook may take a while to show
//! the effect. If every repeat were accepted the controller would race far
//! ahead of the visible value. [`KeyHoldTracker`] accepts at most one press
//! per observed change of the row's value pair instead.
//!
//! # State Machine (per key)
//!
//! ```text
//!             press / allow
//!   Unknown ───────────────▶ Pending ◀──────────────┐
//!                             │  ▲                   │ press / allow
//!      press, pair unchanged  │  │ press, pair       │ (fresh snapshot)
//!      / deny ◀───────────────┘  │ changed / allow   │
//!                                │                   │
//!                             release ──────────▶ Released
//! ```
//!
//! The gate is a function of what the workbook reports, not of wall-clock
//! time, so it adapts to however slow the workbook happens to be.
//!
//! Entries are never removed. The key set is the small fixed hotkey table.

use std::collections::HashMap;

use crate::event::KeyId;
use crate::value::OddsPair;

/// Outcome of [`KeyHoldTracker::on_press`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldDecision {
    Allow,
    Deny,
}

impl HoldDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Hold state of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyHoldState {
    /// Row pair observed when the last press was accepted.
    pub last_snapshot: OddsPair,
    /// True while waiting for the last accepted press to show an effect.
    pub pending: bool,
}

/// Per-key debounce engine.
#[derive(Debug, Clone, Default)]
pub struct KeyHoldTracker {
    keys: HashMap<KeyId, KeyHoldState>,
}

impl KeyHoldTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a press of `key` may mutate, given the current pair.
    pub fn on_press(&mut self, key: KeyId, current: &OddsPair) -> HoldDecision {
        let Some(state) = self.keys.get_mut(&key) else {
            tracing::trace!(%key, "first press");
            self.keys.insert(
                key,
                KeyHoldState {
                    last_snapshot: current.clone(),
                    pending: true,
                },
            );
            return HoldDecision::Allow;
        };

        if !state.pending {
            tracing::trace!(%key, "fresh press after release");
            state.last_snapshot = current.clone();
            state.pending = true;
            return HoldDecision::Allow;
        }

        if state.last_snapshot == *current {
            tracing::trace!(%key, "held, value unchanged");
            return HoldDecision::Deny;
        }

        tracing::trace!(%key, "held, value moved");
        state.last_snapshot = current.clone();
        HoldDecision::Allow
    }

    /// Record that `key` went up. Unknown keys are ignored.
    pub fn on_release(&mut self, key: KeyId) {
        if let Some(state) = self.keys.get_mut(&key) {
            state.pending = false;
        }
    }

    #[must_use]
    pub fn state(&self, key: KeyId) -> Option<&KeyHoldState> {
        self.keys.get(&key)
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }
}
