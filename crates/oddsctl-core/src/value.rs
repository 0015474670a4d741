#![forbid(unsafe_code)]

//! Spreadsheet cell values.
//!
//! Cells hold numbers, text, booleans or nothing. [`CellValue`] serializes to
//! the plain JSON scalar (`null`, `true`, `1.6`, `"WIN"`) so published
//! documents stay readable by consumers that know nothing about this crate.
//!
//! Equality is strict: `1.6` and `1.6000001` differ, and `Empty` differs from
//! every value. Change detection relies on this; tolerant matching lives in
//! [`crate::ladder`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell value as read from the workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank cell, or a cell that could not be read.
    #[default]
    Empty,
    /// Boolean cell.
    Bool(bool),
    /// Numeric cell.
    Number(f64),
    /// Text cell.
    Text(String),
}

impl CellValue {
    /// Numeric payload, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for [`CellValue::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Trimmed, uppercased text form. Blank cells normalize to `""`.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Empty => String::new(),
            other => other.to_string().trim().to_uppercase(),
        }
    }

    /// Trimmed text form, or `None` when the cell is blank.
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        let text = self.to_string();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// The (home, away) value pair of one map row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsPair {
    pub home: CellValue,
    pub away: CellValue,
}

impl OddsPair {
    #[must_use]
    pub fn new(home: impl Into<CellValue>, away: impl Into<CellValue>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
        }
    }

    /// Pair recorded when the row could not be read.
    #[must_use]
    pub fn unread() -> Self {
        Self::default()
    }
}

impl fmt::Display for OddsPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Home={}, Away={}", self.home, self.away)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_scalars_round_trip() {
        let values: Vec<CellValue> =
            serde_json::from_str(r#"[null, true, 1.6, 2, "WIN"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                CellValue::Empty,
                CellValue::Bool(true),
                CellValue::Number(1.6),
                CellValue::Number(2.0),
                CellValue::Text("WIN".into()),
            ]
        );
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"[null,true,1.6,2.0,"WIN"]"#
        );
    }

    #[test]
    fn normalized_trims_and_uppercases() {
        assert_eq!(CellValue::from("  lose ").normalized(), "LOSE");
        assert_eq!(CellValue::Empty.normalized(), "");
        assert_eq!(CellValue::from(1.5).normalized(), "1.5");
    }

    #[test]
    fn strict_equality() {
        assert_ne!(CellValue::from(1.6), CellValue::from(1.600_000_1));
        assert_ne!(CellValue::Empty, CellValue::from(""));
        assert_eq!(OddsPair::new(1.6, 2.0), OddsPair::new(1.6, 2.0));
    }

    #[test]
    fn display_text_skips_blank() {
        assert_eq!(CellValue::from("   ").display_text(), None);
        assert_eq!(CellValue::Empty.display_text(), None);
        assert_eq!(
            CellValue::from(" LoL Bo3 ").display_text().as_deref(),
            Some("LoL Bo3")
        );
    }
}
