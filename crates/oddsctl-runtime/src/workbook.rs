#![forbid(unsafe_code)]

//! Workbook automation capability.
//!
//! The controller never talks to a spreadsheet application directly. It goes
//! through the [`Workbook`] trait, whose implementations own the actual
//! automation channel:
//!
//! - [`MemoryWorkbook`]: in-memory (testing, dry runs). Records every write,
//!   control invocation and click.
//! - [`crate::file_workbook::FileWorkbook`]: a JSON document on disk, kept in
//!   sync with the real spreadsheet by a bridge process.
//!
//! # Threading Contract
//!
//! Automation handles are only valid on the thread that created them. A
//! workbook is therefore owned by exactly one context (the program loop) and
//! the trait takes `&mut self` even for reads.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `Connection` | Workbook not open / not reachable | Fatal at startup |
//! | `UnknownCell` / `UnknownRange` / `UnknownControl` | Template mismatch | Command rejected |
//! | `WindowNotFound` | Add-in panel closed | Action reported, loop continues |
//! | `Io` / `Malformed` | Backing store trouble | Command rejected, loop continues |

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use oddsctl_core::{CellValue, MapRow, OddsPair};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors reported by a workbook.
#[derive(Debug)]
pub enum WorkbookError {
    /// The workbook could not be reached at all.
    Connection(String),
    /// I/O error in the backing store.
    Io(std::io::Error),
    /// The backing store holds something unreadable.
    Malformed(String),
    /// A cell id the workbook does not know or cannot read.
    UnknownCell(String),
    /// A named range that does not exist.
    UnknownRange(String),
    /// A named control that does not exist.
    UnknownControl(String),
    /// No window title contains the requested fragment.
    WindowNotFound(String),
}

impl fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkbookError::Connection(msg) => write!(f, "workbook unavailable: {msg}"),
            WorkbookError::Io(e) => write!(f, "I/O error: {e}"),
            WorkbookError::Malformed(msg) => write!(f, "malformed workbook: {msg}"),
            WorkbookError::UnknownCell(id) => write!(f, "could not read cell {id}"),
            WorkbookError::UnknownRange(name) => write!(f, "named range {name} not found"),
            WorkbookError::UnknownControl(name) => write!(f, "control {name} not found"),
            WorkbookError::WindowNotFound(fragment) => {
                write!(f, "no window titled like {fragment:?}")
            }
        }
    }
}

impl std::error::Error for WorkbookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkbookError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WorkbookError {
    fn from(e: std::io::Error) -> Self {
        WorkbookError::Io(e)
    }
}

/// Result type for workbook operations.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Opaque handle to a UI window found by [`Workbook::find_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

// ─────────────────────────────────────────────────────────────────────────────
// Capability Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The external spreadsheet automation capability.
pub trait Workbook {
    /// Human-readable workbook name (for logs).
    fn name(&self) -> &str;

    /// Read one cell by A1 id.
    fn read_cell(&mut self, id: &str) -> WorkbookResult<CellValue>;

    /// Write one cell by A1 id.
    fn write_cell(&mut self, id: &str, value: CellValue) -> WorkbookResult<()>;

    /// Values of a workbook-level named range, in sheet order.
    fn read_named_range(&mut self, name: &str) -> WorkbookResult<Vec<CellValue>>;

    /// Activate a named sheet control (a toggle acts as one click).
    fn invoke_named_control(&mut self, name: &str) -> WorkbookResult<()>;

    /// Find a child window of the application by title fragment.
    fn find_window(&mut self, title_fragment: &str) -> WorkbookResult<WindowHandle>;

    /// Post a left click at window-relative coordinates without moving the cursor.
    fn post_ui_click(&mut self, window: WindowHandle, x: i32, y: i32) -> WorkbookResult<()>;

    /// Undo any global UI state the automation changed (interactivity,
    /// screen updating). Called once on shutdown.
    fn restore_interactivity(&mut self) -> WorkbookResult<()> {
        Ok(())
    }

    /// Read many cells as one logical batch. Unreadable cells come back
    /// [`CellValue::Empty`].
    fn read_cells(&mut self, ids: &[String]) -> BTreeMap<String, CellValue> {
        ids.iter()
            .map(|id| (id.clone(), self.read_cell(id).unwrap_or_default()))
            .collect()
    }

    /// Read a map row's (home, away) pair. Unreadable sides are `Empty`.
    fn read_pair(&mut self, row: &MapRow) -> OddsPair {
        OddsPair {
            home: self.read_cell(&row.home_cell).unwrap_or_default(),
            away: self.read_cell(&row.away_cell).unwrap_or_default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Workbook
// ─────────────────────────────────────────────────────────────────────────────

/// A recorded click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub window: WindowHandle,
    pub x: i32,
    pub y: i32,
}

/// In-memory workbook for tests and dry runs.
///
/// Every cell id is readable (unset cells read as `Empty`) unless marked
/// unreadable with [`MemoryWorkbook::with_unreadable`].
#[derive(Debug, Clone)]
pub struct MemoryWorkbook {
    name: String,
    cells: HashMap<String, CellValue>,
    ranges: HashMap<String, Vec<CellValue>>,
    controls: HashMap<String, bool>,
    windows: Vec<String>,
    unreadable: HashSet<String>,
    interactive: bool,
    writes: Vec<(String, CellValue)>,
    invocations: Vec<String>,
    clicks: Vec<Click>,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryWorkbook {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
            ranges: HashMap::new(),
            controls: HashMap::new(),
            windows: Vec::new(),
            unreadable: HashSet::new(),
            interactive: false,
            writes: Vec::new(),
            invocations: Vec::new(),
            clicks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cell(mut self, id: &str, value: impl Into<CellValue>) -> Self {
        self.set_cell(id, value);
        self
    }

    #[must_use]
    pub fn with_range(mut self, name: &str, values: impl IntoIterator<Item = CellValue>) -> Self {
        self.ranges.insert(name.to_string(), values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_control(mut self, name: &str, value: bool) -> Self {
        self.controls.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_window(mut self, title: &str) -> Self {
        self.windows.push(title.to_string());
        self
    }

    #[must_use]
    pub fn with_unreadable(mut self, id: &str) -> Self {
        self.unreadable.insert(id.to_string());
        self
    }

    /// Change a cell as if someone edited the sheet. Not recorded as a write.
    pub fn set_cell(&mut self, id: &str, value: impl Into<CellValue>) {
        self.cells.insert(id.to_string(), value.into());
    }

    /// Current value of a cell (unset cells are `Empty`).
    #[must_use]
    pub fn cell(&self, id: &str) -> CellValue {
        self.cells.get(id).cloned().unwrap_or_default()
    }

    /// Cell writes made through the trait, oldest first.
    #[must_use]
    pub fn writes(&self) -> &[(String, CellValue)] {
        &self.writes
    }

    /// Controls invoked through the trait, oldest first.
    #[must_use]
    pub fn invocations(&self) -> &[String] {
        &self.invocations
    }

    #[must_use]
    pub fn clicks(&self) -> &[Click] {
        &self.clicks
    }

    #[must_use]
    pub fn control(&self, name: &str) -> Option<bool> {
        self.controls.get(name).copied()
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}

impl Workbook for MemoryWorkbook {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_cell(&mut self, id: &str) -> WorkbookResult<CellValue> {
        if self.unreadable.contains(id) {
            return Err(WorkbookError::UnknownCell(id.to_string()));
        }
        Ok(self.cell(id))
    }

    fn write_cell(&mut self, id: &str, value: CellValue) -> WorkbookResult<()> {
        if self.unreadable.contains(id) {
            return Err(WorkbookError::UnknownCell(id.to_string()));
        }
        self.cells.insert(id.to_string(), value.clone());
        self.writes.push((id.to_string(), value));
        Ok(())
    }

    fn read_named_range(&mut self, name: &str) -> WorkbookResult<Vec<CellValue>> {
        self.ranges
            .get(name)
            .cloned()
            .ok_or_else(|| WorkbookError::UnknownRange(name.to_string()))
    }

    fn invoke_named_control(&mut self, name: &str) -> WorkbookResult<()> {
        let state = self
            .controls
            .get_mut(name)
            .ok_or_else(|| WorkbookError::UnknownControl(name.to_string()))?;
        *state = !*state;
        self.invocations.push(name.to_string());
        Ok(())
    }

    fn find_window(&mut self, title_fragment: &str) -> WorkbookResult<WindowHandle> {
        self.windows
            .iter()
            .position(|title| title.contains(title_fragment))
            .map(|i| WindowHandle(i as u64 + 1))
            .ok_or_else(|| WorkbookError::WindowNotFound(title_fragment.to_string()))
    }

    fn post_ui_click(&mut self, window: WindowHandle, x: i32, y: i32) -> WorkbookResult<()> {
        self.clicks.push(Click { window, x, y });
        Ok(())
    }

    fn restore_interactivity(&mut self) -> WorkbookResult<()> {
        self.interactive = true;
        Ok(())
    }
}
