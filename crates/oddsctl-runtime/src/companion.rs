#![forbid(unsafe_code)]

//! Health of the input hook, as reported to the UI.
//!
//! The hook runs on its own thread and updates a [`SharedCompanionStatus`];
//! the state watcher copies it into every published document and publishes
//! again whenever it changes.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Snapshot of the hook's health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionStatus {
    pub running: bool,
    pub error: Option<String>,
    pub pid: Option<u32>,
    pub managed: bool,
}

impl CompanionStatus {
    /// A healthy hook owned by this process.
    #[must_use]
    pub fn running_here() -> Self {
        Self {
            running: true,
            error: None,
            pid: Some(std::process::id()),
            managed: true,
        }
    }

    /// A hook that stopped with an error.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            running: false,
            error: Some(error.into()),
            pid: None,
            managed: true,
        }
    }
}

/// Thread-safe cell holding the current [`CompanionStatus`].
#[derive(Debug, Clone, Default)]
pub struct SharedCompanionStatus {
    inner: Arc<Mutex<CompanionStatus>>,
}

impl SharedCompanionStatus {
    #[must_use]
    pub fn new(initial: CompanionStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Current status. A poisoned lock still yields the last value.
    #[must_use]
    pub fn get(&self) -> CompanionStatus {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, status: CompanionStatus) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let status = SharedCompanionStatus::default();
        let hook_side = status.clone();
        assert!(!status.get().running);

        hook_side.set(CompanionStatus::running_here());
        assert!(status.get().running);
        assert_eq!(status.get().pid, Some(std::process::id()));

        hook_side.set(CompanionStatus::failed("raw mode refused"));
        let seen = status.get();
        assert!(!seen.running);
        assert_eq!(seen.error.as_deref(), Some("raw mode refused"));
    }
}
