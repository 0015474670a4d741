#![forbid(unsafe_code)]

//! Ordered odds ladder and neighbour stepping.
//!
//! The workbook defines the legal odds as an ordered named range. Hotkeys
//! never compute odds arithmetically; they move the current value one rung
//! up or down this ladder.
//!
//! # Lookup
//!
//! [`OddsLadder::index_of`] tries an exact match first, then (numbers only)
//! the first rung within [`NUMERIC_TOLERANCE`]. Earlier rungs win ties.
//!
//! # Boundaries
//!
//! Stepping off either end is rejected, never clamped or wrapped. Stepping
//! onto a sentinel rung (`WIN`/`LOSE`) is rejected as manual-only.

use std::fmt;

use crate::guard::is_sentinel;
use crate::value::CellValue;

/// Absolute tolerance for numeric rung matching.
pub const NUMERIC_TOLERANCE: f64 = 0.001;

/// Direction of a ladder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards index 0.
    Prev,
    /// Towards the last index.
    Next,
}

impl Direction {
    /// Word used in "already at ..." messages.
    #[must_use]
    pub const fn extreme(self) -> &'static str {
        match self {
            Self::Prev => "minimum",
            Self::Next => "maximum",
        }
    }
}

/// A successful step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTarget {
    pub from_index: usize,
    pub to_index: usize,
    pub value: CellValue,
}

/// Why a step was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    /// The current value is not on the ladder.
    NotFound(CellValue),
    /// The current value is already the first or last rung.
    AtBoundary {
        direction: Direction,
        value: CellValue,
    },
    /// The neighbouring rung is a sentinel; only a manual edit may set it.
    ManualOnly(CellValue),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NotFound(v) => write!(f, "value {v} not found in ladder"),
            StepError::AtBoundary { direction, value } => {
                write!(f, "already at {} ({value})", direction.extreme())
            }
            StepError::ManualOnly(v) => write!(f, "cannot set {v} via hotkey (manual only)"),
        }
    }
}

impl std::error::Error for StepError {}

/// Immutable ordered reference table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OddsLadder {
    rungs: Vec<CellValue>,
}

impl OddsLadder {
    /// Build a ladder, dropping blank cells.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = CellValue>) -> Self {
        Self {
            rungs: values.into_iter().filter(|v| !v.is_empty()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.rungs.get(index)
    }

    /// Position of `value` on the ladder.
    #[must_use]
    pub fn index_of(&self, value: &CellValue) -> Option<usize> {
        if let Some(i) = self.rungs.iter().position(|r| r == value) {
            return Some(i);
        }
        let needle = value.as_f64()?;
        self.rungs.iter().position(|r| {
            r.as_f64()
                .is_some_and(|n| (n - needle).abs() < NUMERIC_TOLERANCE)
        })
    }

    /// The neighbouring rung of `value` in `direction`.
    pub fn step(&self, value: &CellValue, direction: Direction) -> Result<StepTarget, StepError> {
        let from_index = self
            .index_of(value)
            .ok_or_else(|| StepError::NotFound(value.clone()))?;

        let to_index = match direction {
            Direction::Prev => from_index.checked_sub(1),
            Direction::Next => Some(from_index + 1).filter(|&i| i < self.rungs.len()),
        }
        .ok_or_else(|| StepError::AtBoundary {
            direction,
            value: value.clone(),
        })?;

        let target = self.rungs[to_index].clone();
        if is_sentinel(&target) {
            return Err(StepError::ManualOnly(target));
        }

        Ok(StepTarget {
            from_index,
            to_index,
            value: target,
        })
    }
}
