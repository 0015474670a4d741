#![forbid(unsafe_code)]

//! Sentinel lock detection.
//!
//! Once a map is settled the operator types `WIN` or `LOSE` into one side of
//! its pair. From then on the pair is frozen against hotkey edits; only a
//! manual edit in the workbook can unfreeze it.

use crate::value::{CellValue, OddsPair};

/// Normalized sentinel markers.
pub const SENTINELS: [&str; 2] = ["WIN", "LOSE"];

/// Whether a single value is a sentinel marker (case-insensitive, trimmed).
#[must_use]
pub fn is_sentinel(value: &CellValue) -> bool {
    let normalized = value.normalized();
    SENTINELS.contains(&normalized.as_str())
}

/// Whether a pair is write-protected: true if either side is a sentinel.
#[must_use]
pub fn is_locked(pair: &OddsPair) -> bool {
    is_sentinel(&pair.home) || is_sentinel(&pair.away)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_truth_table() {
        let cases = [
            (OddsPair::new("WIN", 2.1), true),
            (OddsPair::new(1.6, "lose"), true),
            (OddsPair::new(" Win ", "LOSE"), true),
            (OddsPair::new(1.6, 2.1), false),
            (OddsPair::new("winner", 2.1), false),
            (OddsPair::unread(), false),
        ];
        for (pair, expected) in cases {
            assert_eq!(is_locked(&pair), expected, "{pair}");
        }
    }

    #[test]
    fn booleans_are_not_sentinels() {
        assert!(!is_sentinel(&CellValue::Bool(true)));
    }
}
